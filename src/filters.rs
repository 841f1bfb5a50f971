//! Named filter operators and the registry they are looked up in.

use std::fmt;
use std::sync::Arc;

use sea_query::{BinOper, Expr, Func, SimpleExpr, Value};

use crate::convert::{convert, ConversionError, Converters, ParamValue};
use crate::error::{Error, Result};
use crate::expression::FieldExpression;

/// Name of the operator used when a leaf names none.
pub const DEFAULT_FILTER: &str = "eq";

/// Turns a field expression and a raw value into a predicate.
///
/// Operators are identified by [`name`](FilterOperator::name) alone; two
/// operators with the same name are interchangeable for lookup purposes.
pub trait FilterOperator: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Rejects fields this operator can't be applied to. Runs before the
    /// value is converted.
    fn check(&self, _field: &FieldExpression) -> Result<()> {
        Ok(())
    }

    /// `value` is `None` when the raw value was null.
    fn build(&self, field: &FieldExpression, value: Option<Value>) -> Result<SimpleExpr>;

    fn apply(
        &self,
        field: &FieldExpression,
        value: &ParamValue,
        converters: Option<&Converters>,
    ) -> Result<SimpleExpr> {
        self.check(field)?;
        let native = if value.is_null() {
            None
        } else {
            Some(convert(value, &field.sql_type, converters)?)
        };
        let predicate = self.build(field, native)?;
        tracing::trace!(filter = self.name(), field = %field, "built predicate");
        Ok(predicate)
    }
}

/// The built-in comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    ILike,
}

impl Comparison {
    pub const ALL: [Comparison; 8] = [
        Comparison::Eq,
        Comparison::Neq,
        Comparison::Lt,
        Comparison::Lte,
        Comparison::Gt,
        Comparison::Gte,
        Comparison::Like,
        Comparison::ILike,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Eq => "eq",
            Comparison::Neq => "neq",
            Comparison::Lt => "lt",
            Comparison::Lte => "lte",
            Comparison::Gt => "gt",
            Comparison::Gte => "gte",
            Comparison::Like => "like",
            Comparison::ILike => "ilike",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    fn is_pattern(self) -> bool {
        matches!(self, Comparison::Like | Comparison::ILike)
    }
}

impl FilterOperator for Comparison {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn check(&self, field: &FieldExpression) -> Result<()> {
        if self.is_pattern() && !field.sql_type.is_string_like() {
            return Err(Error::TypeMismatch {
                filter: self.as_str().to_string(),
                sql_type: field.sql_type.clone(),
            });
        }
        Ok(())
    }

    fn build(&self, field: &FieldExpression, value: Option<Value>) -> Result<SimpleExpr> {
        let column = Expr::expr(field.expr.clone());
        let expr = match (self, value) {
            (Comparison::Eq, None) => column.is_null(),
            (Comparison::Neq, None) => column.is_not_null(),
            (Comparison::Eq, Some(v)) => column.eq(v),
            (Comparison::Neq, Some(v)) => column.ne(v),
            (Comparison::Lt, v) => column.lt(v.unwrap_or(Value::String(None))),
            (Comparison::Lte, v) => column.lte(v.unwrap_or(Value::String(None))),
            (Comparison::Gt, v) => column.gt(v.unwrap_or(Value::String(None))),
            (Comparison::Gte, v) => column.gte(v.unwrap_or(Value::String(None))),
            (Comparison::Like, v) => column.like(pattern(field, v)?),
            // both sides fold in SQL so they agree on what LOWER covers
            (Comparison::ILike, v) => Expr::expr(Func::lower(field.expr.clone())).binary(
                BinOper::Like,
                Func::lower(Expr::val(pattern(field, v)?)),
            ),
        };
        Ok(expr)
    }
}

fn pattern(field: &FieldExpression, value: Option<Value>) -> Result<String> {
    match value {
        Some(Value::String(Some(s))) => Ok(*s),
        other => Err(ConversionError {
            value: format!("{:?}", other),
            target: field.sql_type.clone(),
            reason: "a pattern must be a non-null string".to_string(),
        }
        .into()),
    }
}

/// How a caller refers to an operator at a lookup site.
#[derive(Debug, Clone, Copy)]
pub enum FilterRef<'a> {
    Name(&'a str),
    Operator(&'a dyn FilterOperator),
    /// The registry's default operator.
    Default,
}

impl FilterRef<'_> {
    fn name<'r>(&'r self, registry: &'r FilterRegistry) -> &'r str {
        match self {
            FilterRef::Name(name) => *name,
            FilterRef::Operator(op) => op.name(),
            FilterRef::Default => registry.default_filter(),
        }
    }

    /// Name equality, the only identity operators have. `Default` stands
    /// for whatever `registry` has as its default.
    pub fn matches(&self, op: &dyn FilterOperator, registry: &FilterRegistry) -> bool {
        op.name() == self.name(registry)
    }
}

impl<'a> From<&'a str> for FilterRef<'a> {
    fn from(name: &'a str) -> Self {
        FilterRef::Name(name)
    }
}

impl<'a> From<Option<&'a str>> for FilterRef<'a> {
    fn from(name: Option<&'a str>) -> Self {
        name.map(FilterRef::Name).unwrap_or(FilterRef::Default)
    }
}

/// Operators available to a query, keyed by name.
#[derive(Debug, Clone)]
pub struct FilterRegistry {
    filters: Vec<Arc<dyn FilterOperator>>,
    default_filter: String,
}

impl FilterRegistry {
    /// An empty registry. Lookups fail until operators are registered.
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }

    /// Adds an operator, replacing any registered under the same name.
    pub fn register(mut self, op: Arc<dyn FilterOperator>) -> Self {
        let existing = self.filters.iter().position(|f| f.name() == op.name());
        match existing {
            Some(idx) => self.filters[idx] = op,
            None => self.filters.push(op),
        }
        self
    }

    pub fn with_default(mut self, name: &str) -> Result<Self> {
        if !self.contains(name) {
            return Err(Error::UnknownFilter(name.to_string()));
        }
        self.default_filter = name.to_string();
        Ok(self)
    }

    /// Keeps only the named operators. The default must survive the cut.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut filters = Vec::with_capacity(names.len());
        for name in names {
            let op = self.get(FilterRef::Name(name.as_ref()))?;
            filters.push(op);
        }
        let subset = Self {
            filters,
            default_filter: self.default_filter.clone(),
        };
        if !subset.contains(&subset.default_filter) {
            return Err(Error::InvalidConfig(format!(
                "default filter '{}' is not part of the filter subset",
                subset.default_filter
            )));
        }
        Ok(subset)
    }

    pub fn get<'a>(&self, filter: impl Into<FilterRef<'a>>) -> Result<Arc<dyn FilterOperator>> {
        let filter = filter.into();
        let name = filter.name(self);
        self.filters
            .iter()
            .find(|f| f.name() == name)
            .cloned()
            .ok_or_else(|| Error::UnknownFilter(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.iter().any(|f| f.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn default_filter(&self) -> &str {
        &self.default_filter
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for FilterRegistry {
    /// All built-in comparisons with `eq` as default.
    fn default() -> Self {
        Comparison::ALL
            .into_iter()
            .fold(Self::new(), |registry, c| registry.register(Arc::new(c)))
    }
}
