//! Turns parsed filter-parameter trees into SQL `SELECT` statements over a
//! relational schema.
//!
//! A [`QueryBinding`] ties a [`Schema`] to a [`BindingConfig`]. Evaluating a
//! [`FilterQuery`] resolves each logical field name to a column (adding inner
//! joins along relationship paths), converts the raw parameter value to the
//! column's type and applies the requested comparison.

pub mod ast;
pub mod binding;
pub mod config;
pub mod convert;
pub mod error;
pub mod evaluation;
pub mod expression;
pub mod filters;
pub mod query_config;
pub mod schema;

pub use ast::{Direction, FilterNode, FilterQuery, OrderSpec, Parameter};
pub use binding::{
    Backend, BindingConfig, Params, ParamsParser, QueryBinding, SessionProvider, TableSession,
};
pub use convert::{Converters, ParamValue};
pub use error::{BindingError, Error, Result};
pub use evaluation::Evaluation;
pub use expression::{BindingEntry, Bindings, ExpressionResolver};
pub use filters::{Comparison, FilterOperator, FilterRegistry};
pub use query_config::QueryConfig;
pub use schema::{Entity, Relationship, Schema, SqlType};
