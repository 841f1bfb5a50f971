//! Filter tree and ordering handed over by the parameter parser.

use serde::{Deserialize, Serialize};

use crate::convert::ParamValue;

/// A parsed request: an optional filter tree plus ordering directives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterQuery {
    #[serde(default)]
    pub filter: Option<FilterNode>,
    #[serde(default)]
    pub orders: Vec<OrderSpec>,
}

impl FilterQuery {
    pub fn new(filter: FilterNode) -> Self {
        Self {
            filter: Some(filter),
            orders: Vec::new(),
        }
    }

    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.orders.push(order);
        self
    }
}

/// A single comparison, e.g. `name eq "user"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Logical field name.
    pub name: String,
    /// Operator name, the registry default when absent.
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub value: ParamValue,
}

/// Boolean filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterNode {
    Param(Parameter),
    And {
        left: Box<FilterNode>,
        right: Box<FilterNode>,
    },
    Or {
        left: Box<FilterNode>,
        right: Box<FilterNode>,
    },
    Not {
        inner: Box<FilterNode>,
    },
    /// A binary operator the parser knows but the evaluator may not.
    Binding {
        operator: String,
        left: Box<FilterNode>,
        right: Box<FilterNode>,
    },
}

impl FilterNode {
    pub fn param(name: &str, filter: &str, value: impl Into<ParamValue>) -> Self {
        FilterNode::Param(Parameter {
            name: name.to_string(),
            filter: Some(filter.to_string()),
            value: value.into(),
        })
    }

    pub fn and(left: FilterNode, right: FilterNode) -> Self {
        FilterNode::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: FilterNode, right: FilterNode) -> Self {
        FilterNode::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: FilterNode) -> Self {
        FilterNode::Not {
            inner: Box::new(inner),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub name: String,
    #[serde(default)]
    pub direction: Direction,
}

impl OrderSpec {
    pub fn asc(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: Direction::Desc,
        }
    }
}
