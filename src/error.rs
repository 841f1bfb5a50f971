//! Error types for query evaluation.

use thiserror::Error;

use crate::convert::ConversionError;
use crate::schema::SqlType;

pub type Result<T> = std::result::Result<T, Error>;

/// Misconfiguration of the logical-name bindings or the schema behind them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("no binding configured for field '{0}'")]
    UnknownField(String),

    /// A join path segment names something other than a relationship with a
    /// resolvable target entity.
    #[error("the join path from entity '{entity}' has a segment '{segment}' which is not a relationship")]
    NotARelationship { segment: String, entity: String },

    #[error("entity '{entity}' has no column '{attribute}'")]
    UnknownAttribute { attribute: String, entity: String },

    #[error("unknown entity '{0}'")]
    UnknownEntity(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The filter tree contains a node the evaluator cannot combine.
    #[error("unresolved filter node: {0}")]
    UnresolvedNode(String),

    #[error("filter '{0}' not found")]
    UnknownFilter(String),

    #[error("filter '{filter}' cannot be applied to a column of type {sql_type}")]
    TypeMismatch { filter: String, sql_type: SqlType },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("could not determine model for query binding configuration: {0}")]
    MissingModel(String),

    #[error("could not access a session for model '{0}', provide one when constructing the binding")]
    MissingSession(String),

    #[error("request parameters could not be parsed: {0}")]
    InvalidParams(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
