//! Per-query filter descriptors.

use crate::expr::{Condition, OperatorExpr};
use sqlgate_core::Value;

/// One-level has-many join: rows of the base entity that own at least one
/// row of `model_name` whose `foreign_key` points back at them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    /// Model name of the related entity
    pub model_name: String,
    /// Column on the related table that references the base `id`
    pub foreign_key: String,
}

impl JoinSpec {
    pub fn new(model_name: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            foreign_key: foreign_key.into(),
        }
    }
}

/// Where/order/limit/offset/join for a single `all` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Column → condition, in insertion order
    pub conditions: Vec<(String, Condition)>,
    /// Ordering expressions, emitted verbatim
    pub order: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub join: Option<JoinSpec>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `column = value` (or `IS NULL` when the value is NULL).
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(column, Condition::from(value.into()))
    }

    /// Add `column IS NULL`.
    pub fn where_null(self, column: impl Into<String>) -> Self {
        self.condition(column, Condition::Null)
    }

    /// Add an operator comparison.
    pub fn where_op(self, column: impl Into<String>, op: OperatorExpr) -> Self {
        self.condition(column, Condition::Op(op))
    }

    /// Set the condition for a column, replacing an earlier one.
    pub fn condition(mut self, column: impl Into<String>, condition: Condition) -> Self {
        let column = column.into();
        if let Some(slot) = self.conditions.iter_mut().find(|(c, _)| *c == column) {
            slot.1 = condition;
        } else {
            self.conditions.push((column, condition));
        }
        self
    }

    /// Append one ordering expression, e.g. `"title DESC"`.
    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order.push(order.into());
        self
    }

    /// Replace the ordering with a sequence of expressions.
    pub fn order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn join(mut self, join: JoinSpec) -> Self {
        self.join = Some(join);
        self
    }

    /// The first plain equality condition, used as the join key filter.
    pub fn first_equality(&self) -> Option<(&str, &Value)> {
        self.conditions.iter().find_map(|(column, condition)| match condition {
            Condition::Eq(v) => Some((column.as_str(), v)),
            _ => None,
        })
    }
}
