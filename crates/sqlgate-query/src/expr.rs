//! Filter conditions.
//!
//! A condition is classified once, when the filter is built: a bare NULL
//! becomes [`Condition::Null`], a scalar becomes [`Condition::Eq`] and a
//! structured comparison becomes [`Condition::Op`]. Downstream code never
//! re-inspects the value's shape.

use sqlgate_core::{Error, PropertyDescriptor, Result, Value, encode_literal, encode_param};

/// A structured (non-scalar) filter value.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorExpr {
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    /// Inclusive range; exactly two operands
    Between(Value, Value),
    /// Set membership; at least one value
    Inq(Vec<Value>),
    /// Set exclusion; at least one value
    Nin(Vec<Value>),
    Neq(Value),
}

impl OperatorExpr {
    pub fn gt(v: impl Into<Value>) -> Self {
        OperatorExpr::Gt(v.into())
    }

    pub fn gte(v: impl Into<Value>) -> Self {
        OperatorExpr::Gte(v.into())
    }

    pub fn lt(v: impl Into<Value>) -> Self {
        OperatorExpr::Lt(v.into())
    }

    pub fn lte(v: impl Into<Value>) -> Self {
        OperatorExpr::Lte(v.into())
    }

    pub fn between(lo: impl Into<Value>, hi: impl Into<Value>) -> Self {
        OperatorExpr::Between(lo.into(), hi.into())
    }

    pub fn inq<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        OperatorExpr::Inq(values.into_iter().map(Into::into).collect())
    }

    pub fn nin<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        OperatorExpr::Nin(values.into_iter().map(Into::into).collect())
    }

    pub fn neq(v: impl Into<Value>) -> Self {
        OperatorExpr::Neq(v.into())
    }

    /// Comparator token placed between the column and the placeholder.
    pub const fn comparator(&self) -> &'static str {
        match self {
            OperatorExpr::Gt(_) => ">",
            OperatorExpr::Gte(_) => ">=",
            OperatorExpr::Lt(_) => "<",
            OperatorExpr::Lte(_) => "<=",
            OperatorExpr::Between(_, _) => "BETWEEN",
            OperatorExpr::Inq(_) => "IN",
            OperatorExpr::Nin(_) => "NOT IN",
            OperatorExpr::Neq(_) => "!=",
        }
    }

    /// Placeholder text; set operators wrap theirs in parentheses.
    pub const fn placeholder(&self) -> &'static str {
        match self {
            OperatorExpr::Inq(_) | OperatorExpr::Nin(_) => "(?)",
            _ => "?",
        }
    }

    /// Encode the operand(s) as one bound parameter.
    ///
    /// `BETWEEN` renders both operands as inline literals joined by `AND`
    /// into a single text parameter. Set operators bind a `Value::Array` of
    /// encoded members for the driver to expand.
    #[allow(clippy::result_large_err)]
    pub fn encode(
        &self,
        prop: &PropertyDescriptor,
        escape: &dyn Fn(&str) -> String,
    ) -> Result<Value> {
        match self {
            OperatorExpr::Gt(v)
            | OperatorExpr::Gte(v)
            | OperatorExpr::Lt(v)
            | OperatorExpr::Lte(v)
            | OperatorExpr::Neq(v) => encode_param(prop, v),
            OperatorExpr::Between(lo, hi) => range_text(prop, lo, hi, escape).map(Value::Text),
            OperatorExpr::Inq(values) | OperatorExpr::Nin(values) => {
                if values.is_empty() {
                    return Err(Error::invalid_filter(format!(
                        "`{}` on column '{}' needs at least one value",
                        self.comparator(),
                        prop.name
                    )));
                }
                values
                    .iter()
                    .map(|v| encode_param(prop, v))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array)
            }
        }
    }
}

#[allow(clippy::result_large_err)]
fn range_text(
    prop: &PropertyDescriptor,
    lo: &Value,
    hi: &Value,
    escape: &dyn Fn(&str) -> String,
) -> Result<String> {
    Ok(format!(
        "{} AND {}",
        encode_literal(prop, lo, escape)?,
        encode_literal(prop, hi, escape)?
    ))
}

/// The value side of one `column → condition` filter entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `col IS NULL`
    Null,
    /// `col = ?`
    Eq(Value),
    /// `col <op> ?`
    Op(OperatorExpr),
}

impl From<Value> for Condition {
    fn from(value: Value) -> Self {
        if value.is_null() {
            Condition::Null
        } else {
            Condition::Eq(value)
        }
    }
}

impl From<OperatorExpr> for Condition {
    fn from(op: OperatorExpr) -> Self {
        Condition::Op(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgate_core::{LogicalType, escape_string};

    fn number() -> PropertyDescriptor {
        PropertyDescriptor::new("age", LogicalType::Number)
    }

    fn string() -> PropertyDescriptor {
        PropertyDescriptor::new("name", LogicalType::String)
    }

    #[test]
    fn test_between_encodes_single_text_param() {
        let op = OperatorExpr::between(10, 20);
        assert_eq!(
            op.encode(&number(), &escape_string).unwrap(),
            Value::Text("10 AND 20".into())
        );
    }

    #[test]
    fn test_between_escapes_string_operands() {
        let op = OperatorExpr::between("a", "m'z");
        assert_eq!(
            op.encode(&string(), &escape_string).unwrap(),
            Value::Text("'a' AND 'm''z'".into())
        );
    }

    #[test]
    fn test_inq_binds_array() {
        let op = OperatorExpr::inq([1, 2, 3]);
        assert_eq!(op.placeholder(), "(?)");
        assert_eq!(
            op.encode(&number(), &escape_string).unwrap(),
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_empty_set_rejected() {
        let err = OperatorExpr::nin(Vec::<i32>::new())
            .encode(&number(), &escape_string)
            .unwrap_err();
        assert!(err.is_programming_error());
    }

    #[test]
    fn test_comparators() {
        assert_eq!(OperatorExpr::gt(1).comparator(), ">");
        assert_eq!(OperatorExpr::gte(1).comparator(), ">=");
        assert_eq!(OperatorExpr::lt(1).comparator(), "<");
        assert_eq!(OperatorExpr::lte(1).comparator(), "<=");
        assert_eq!(OperatorExpr::neq(1).comparator(), "!=");
        assert_eq!(OperatorExpr::nin([1]).comparator(), "NOT IN");
    }

    #[test]
    fn test_condition_classification() {
        assert_eq!(Condition::from(Value::Null), Condition::Null);
        assert_eq!(Condition::from(Value::Int(1)), Condition::Eq(Value::Int(1)));
        assert!(matches!(
            Condition::from(OperatorExpr::gt(5)),
            Condition::Op(OperatorExpr::Gt(_))
        ));
    }
}
