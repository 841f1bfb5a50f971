//! Everything one evaluation needs, built per request.

use std::sync::Arc;

use crate::ast::FilterQuery;
use crate::convert::Converters;
use crate::error::Result;
use crate::expression::ExpressionResolver;
use crate::filters::{FilterOperator, FilterRef, FilterRegistry};
use crate::schema::Entity;

#[derive(Debug)]
pub struct QueryConfig<'a> {
    pub query: &'a FilterQuery,
    pub converters: Converters,
    pub filters: FilterRegistry,
    pub expressions: ExpressionResolver<'a>,
}

impl<'a> QueryConfig<'a> {
    /// Uses the built-in converters and filters.
    pub fn new(query: &'a FilterQuery, expressions: ExpressionResolver<'a>) -> Self {
        Self {
            query,
            converters: Converters::default(),
            filters: FilterRegistry::default(),
            expressions,
        }
    }

    /// `None` keeps the built-in table.
    pub fn with_converters(mut self, converters: Option<Converters>) -> Self {
        self.converters = converters.unwrap_or_default();
        self
    }

    pub fn with_filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    pub fn model(&self) -> &'a Entity {
        self.expressions.model()
    }

    pub fn filter_for<'f>(&self, filter: impl Into<FilterRef<'f>>) -> Result<Arc<dyn FilterOperator>> {
        self.filters.get(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::expression::Bindings;
    use crate::schema::{Schema, SqlType};
    use crate::convert::default_converters;

    fn schema() -> Schema {
        Schema::new().with(Entity::new("User", "users").column("id", SqlType::Integer))
    }

    #[test]
    fn test_use_default_filters() {
        let schema = schema();
        let bindings = Bindings::new();
        let query = FilterQuery::default();
        let config = QueryConfig::new(
            &query,
            ExpressionResolver::new(&schema, schema.get("User").unwrap(), &bindings),
        );

        assert_eq!(
            config.filters.names(),
            vec!["eq", "neq", "lt", "lte", "gt", "gte", "like", "ilike"]
        );
        assert_eq!(config.converters.len(), default_converters().len());
        assert_eq!(config.model().name, "User");
    }

    #[test]
    fn test_set_filters_and_converters() {
        let schema = schema();
        let bindings = Bindings::new();
        let query = FilterQuery::default();
        let converters = Converters::new().register(SqlType::Integer, |_| Ok(1i64.into()));
        let config = QueryConfig::new(
            &query,
            ExpressionResolver::new(&schema, schema.get("User").unwrap(), &bindings),
        )
        .with_filters(FilterRegistry::default().subset(&["eq"]).unwrap())
        .with_converters(Some(converters));

        assert_eq!(config.filters.names(), vec!["eq"]);
        assert_eq!(config.converters.len(), 1);
    }

    #[test]
    fn test_not_existent_filter() {
        let schema = schema();
        let bindings = Bindings::new();
        let query = FilterQuery::default();
        let config = QueryConfig::new(
            &query,
            ExpressionResolver::new(&schema, schema.get("User").unwrap(), &bindings),
        );

        assert_eq!(
            config.filter_for("not_existing").unwrap_err(),
            Error::UnknownFilter("not_existing".to_string())
        );
    }
}
