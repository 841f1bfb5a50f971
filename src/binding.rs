//! Binding configuration: which entity a filter endpoint queries, how its
//! logical names map onto the schema and where base queries come from.
//!
//! Configurations compose explicitly: a shared base config can be refined by
//! [`BindingConfig::overlay`] instead of being inherited.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use sea_query::{
    Asterisk, MysqlQueryBuilder, PostgresQueryBuilder, SelectStatement, SqliteQueryBuilder,
};
use serde::{Deserialize, Serialize};

use crate::ast::FilterQuery;
use crate::convert::Converters;
use crate::error::{Error, Result};
use crate::evaluation::Evaluation;
use crate::expression::{BindingEntry, Bindings, ExpressionResolver, TableIden};
use crate::filters::FilterRegistry;
use crate::query_config::QueryConfig;
use crate::schema::{Entity, Schema};

/// SQL dialect a session renders queries in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Postgres,
    Sqlite,
    Mysql,
}

impl Backend {
    pub fn render(self, select: &SelectStatement) -> String {
        match self {
            Backend::Postgres => select.to_string(PostgresQueryBuilder),
            Backend::Sqlite => select.to_string(SqliteQueryBuilder),
            Backend::Mysql => select.to_string(MysqlQueryBuilder),
        }
    }
}

/// Source of base queries for a root entity.
pub trait SessionProvider: fmt::Debug + Send + Sync {
    fn backend(&self) -> Backend;

    /// Selects every column of every row of `model`.
    fn query(&self, model: &Entity) -> SelectStatement {
        let mut select = SelectStatement::new();
        select
            .column((TableIden(model.table.clone()), Asterisk))
            .from(TableIden(model.table.clone()));
        select
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableSession {
    pub backend: Backend,
}

impl TableSession {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

impl SessionProvider for TableSession {
    fn backend(&self) -> Backend {
        self.backend
    }
}

/// Raw request parameters, e.g. `filter[name][eq] = user`.
pub type Params = BTreeMap<String, String>;

/// Turns request parameters into a filter tree.
pub trait ParamsParser {
    type Error: fmt::Display;

    fn parse(
        &self,
        params: &Params,
        filter_names: &[&str],
        default_filter: &str,
    ) -> std::result::Result<FilterQuery, Self::Error>;
}

#[derive(Debug, Clone, Default)]
pub struct BindingConfig {
    /// Name of the root entity.
    pub model: Option<String>,
    pub binding: Bindings,
    pub converters: Option<Converters>,
    pub filters: Option<FilterRegistry>,
    pub default_filter: Option<String>,
    pub session: Option<Arc<dyn SessionProvider>>,
}

impl BindingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn bind(mut self, name: &str, entry: BindingEntry) -> Self {
        self.binding.insert(name.to_string(), entry);
        self
    }

    pub fn with_converters(mut self, converters: Converters) -> Self {
        self.converters = Some(converters);
        self
    }

    pub fn with_filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_default_filter(mut self, name: &str) -> Self {
        self.default_filter = Some(name.to_string());
        self
    }

    pub fn with_session(mut self, session: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(session);
        self
    }

    /// Layers `child` over `self`. Values set in `child` win; binding maps
    /// are merged with `child` entries replacing same-named ones.
    pub fn overlay(self, child: BindingConfig) -> BindingConfig {
        let mut binding = self.binding;
        binding.extend(child.binding);
        BindingConfig {
            model: child.model.or(self.model),
            binding,
            converters: child.converters.or(self.converters),
            filters: child.filters.or(self.filters),
            default_filter: child.default_filter.or(self.default_filter),
            session: child.session.or(self.session),
        }
    }
}

/// A binding configuration attached to a schema, ready to evaluate requests.
#[derive(Debug)]
pub struct QueryBinding<'s> {
    schema: &'s Schema,
    config: BindingConfig,
    session: Option<Arc<dyn SessionProvider>>,
}

impl<'s> QueryBinding<'s> {
    pub fn new(schema: &'s Schema, config: BindingConfig) -> Self {
        Self {
            schema,
            config,
            session: None,
        }
    }

    /// Takes precedence over the configured session.
    pub fn with_session(mut self, session: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    pub fn model(&self) -> Result<&'s Entity> {
        let name = self
            .config
            .model
            .as_deref()
            .ok_or_else(|| Error::MissingModel("no model configured".to_string()))?;
        self.schema
            .get(name)
            .ok_or_else(|| Error::MissingModel(format!("'{}' is not part of the schema", name)))
    }

    pub fn session(&self) -> Result<&Arc<dyn SessionProvider>> {
        match self.session.as_ref().or(self.config.session.as_ref()) {
            Some(session) => Ok(session),
            None => Err(Error::MissingSession(self.model()?.name.clone())),
        }
    }

    pub fn filters(&self) -> Result<FilterRegistry> {
        let registry = self.config.filters.clone().unwrap_or_default();
        match &self.config.default_filter {
            Some(name) => registry.with_default(name),
            None => Ok(registry),
        }
    }

    pub fn config_with<'q>(&'q self, query: &'q FilterQuery) -> Result<QueryConfig<'q>> {
        let resolver = ExpressionResolver::new(self.schema, self.model()?, &self.config.binding);
        Ok(QueryConfig::new(query, resolver)
            .with_converters(self.config.converters.clone())
            .with_filters(self.filters()?))
    }

    pub fn evaluate(&self, query: &FilterQuery) -> Result<SelectStatement> {
        let model = self.model()?;
        let base = self.session()?.query(model);
        Evaluation::new(self.config_with(query)?).evaluate(base)
    }

    pub fn evaluate_params<P: ParamsParser>(
        &self,
        parser: &P,
        params: &Params,
    ) -> Result<SelectStatement> {
        let filters = self.filters()?;
        let query = parser
            .parse(params, &filters.names(), filters.default_filter())
            .map_err(|e| Error::InvalidParams(e.to_string()))?;
        self.evaluate(&query)
    }

    /// Renders `select` in the session's dialect.
    pub fn to_sql(&self, select: &SelectStatement) -> Result<String> {
        Ok(self.session()?.backend().render(select))
    }
}
