//! Evaluates a filter tree and ordering into a `SelectStatement`.
//!
//! ```text
//! evaluate()
//!   ├─ check()            validates the whole tree before the query is touched
//!   ├─ apply_filter()
//!   │    └─ process()     recursive, left before right
//!   │         ├─ Param    resolve field -> build predicate -> commit joins
//!   │         ├─ Not      NOT inner
//!   │         ├─ And/Or   left AND/OR right
//!   │         └─ Binding  rejected
//!   └─ apply_orders()     resolves each order field, ORDER BY in listed order
//! ```

use sea_query::{Order, SelectStatement, SimpleExpr};

use crate::ast::{Direction, FilterNode, Parameter};
use crate::error::{Error, Result};
use crate::query_config::QueryConfig;

pub struct Evaluation<'a> {
    config: QueryConfig<'a>,
}

impl<'a> Evaluation<'a> {
    pub fn new(config: QueryConfig<'a>) -> Self {
        Self { config }
    }

    /// Applies the filter and ordering of the configured query to `select`.
    ///
    /// Joins introduced on the way are shared across all fields of this
    /// evaluation. On error `select` is dropped, so no partial result escapes.
    pub fn evaluate(mut self, mut select: SelectStatement) -> Result<SelectStatement> {
        let query = self.config.query;
        tracing::debug!(
            model = %self.config.model().name,
            filtered = query.filter.is_some(),
            orders = query.orders.len(),
            "evaluating query"
        );

        if let Some(node) = &query.filter {
            self.check(node)?;
        }
        self.apply_filter(&mut select)?;
        self.apply_orders(&mut select)?;
        Ok(select)
    }

    /// Rejects unknown node kinds and unknown operators up front.
    fn check(&self, node: &FilterNode) -> Result<()> {
        match node {
            FilterNode::Param(param) => self
                .config
                .filter_for(param.filter.as_deref())
                .map(|_| ()),
            FilterNode::Not { inner } => self.check(inner),
            FilterNode::And { left, right } | FilterNode::Or { left, right } => {
                self.check(left)?;
                self.check(right)
            }
            FilterNode::Binding { operator, .. } => Err(unresolved(operator)),
        }
    }

    fn apply_filter(&mut self, select: &mut SelectStatement) -> Result<()> {
        let query = self.config.query;
        if let Some(node) = &query.filter {
            let predicate = self.process(node, select)?;
            select.and_where(predicate);
        }
        Ok(())
    }

    fn process(&mut self, node: &FilterNode, select: &mut SelectStatement) -> Result<SimpleExpr> {
        match node {
            FilterNode::Param(param) => self.process_parameter(param, select),
            FilterNode::Not { inner } => Ok(self.process(inner, select)?.not()),
            FilterNode::And { left, right } => {
                let left = self.process(left, select)?;
                let right = self.process(right, select)?;
                Ok(left.and(right))
            }
            FilterNode::Or { left, right } => {
                let left = self.process(left, select)?;
                let right = self.process(right, select)?;
                Ok(left.or(right))
            }
            FilterNode::Binding { operator, .. } => Err(unresolved(operator)),
        }
    }

    fn process_parameter(
        &mut self,
        param: &Parameter,
        select: &mut SelectStatement,
    ) -> Result<SimpleExpr> {
        let filter = self.config.filter_for(param.filter.as_deref())?;
        let resolution = self.config.expressions.resolve(&param.name)?;
        let predicate = filter.apply(
            &resolution.field,
            &param.value,
            Some(&self.config.converters),
        )?;
        self.config.expressions.commit(select, resolution);
        Ok(predicate)
    }

    fn apply_orders(&mut self, select: &mut SelectStatement) -> Result<()> {
        let query = self.config.query;
        for order in &query.orders {
            let field = self.config.expressions.apply(select, &order.name)?;
            let direction = match order.direction {
                Direction::Asc => Order::Asc,
                Direction::Desc => Order::Desc,
            };
            select.order_by_expr(field.expr, direction);
        }
        Ok(())
    }
}

fn unresolved(operator: &str) -> Error {
    Error::UnresolvedNode(format!("unknown binding operator '{}'", operator))
}
