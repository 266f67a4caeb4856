//! SQL clause fragments (WHERE, ORDER BY, LIMIT, JOIN).

use crate::expr::Condition;
use sqlgate_core::{
    EntityDescriptor, ID_COLUMN, Result, Value, encode_param, quote_ident_mysql, quote_qualified,
};

/// SQL text plus the parameters its placeholders bind, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Build `WHERE c1 AND c2 ...` for the entity's declared columns.
///
/// Keys the entity does not declare never reach the SQL. An empty or
/// fully ignored condition set yields an empty fragment, not a bare `WHERE`.
#[allow(clippy::result_large_err)]
pub fn build_where(
    entity: &EntityDescriptor,
    conditions: &[(String, Condition)],
    escape: &dyn Fn(&str) -> String,
) -> Result<Fragment> {
    let mut clauses = Vec::with_capacity(conditions.len());
    let mut params = Vec::with_capacity(conditions.len());

    for (column, condition) in conditions {
        let Some(prop) = entity.get_property(column) else {
            tracing::trace!(
                table = entity.table_name(),
                column = %column,
                "ignoring filter on undeclared column"
            );
            continue;
        };
        let quoted = quote_qualified(column);
        match condition {
            Condition::Null => clauses.push(format!("{} IS NULL", quoted)),
            Condition::Eq(value) => {
                clauses.push(format!("{} = ?", quoted));
                params.push(encode_param(prop, value)?);
            }
            Condition::Op(op) => {
                clauses.push(format!(
                    "{} {} {}",
                    quoted,
                    op.comparator(),
                    op.placeholder()
                ));
                params.push(op.encode(prop, escape)?);
            }
        }
    }

    if clauses.is_empty() {
        return Ok(Fragment::default());
    }
    Ok(Fragment {
        sql: format!("WHERE {}", clauses.join(" AND ")),
        params,
    })
}

/// `ORDER BY a, b`; ordering text is passed through unvalidated.
pub fn build_order_by(order: &[String]) -> String {
    if order.is_empty() {
        String::new()
    } else {
        format!("ORDER BY {}", order.join(", "))
    }
}

/// `LIMIT n` or `LIMIT offset, n`; nothing without a limit.
pub fn build_limit(limit: Option<u64>, offset: Option<u64>) -> String {
    match (limit, offset) {
        (Some(limit), Some(offset)) if offset > 0 => format!("LIMIT {}, {}", offset, limit),
        (Some(limit), _) => format!("LIMIT {}", limit),
        (None, _) => String::new(),
    }
}

/// `INNER JOIN related ON related.fk = base.id`.
pub fn build_join(base: &EntityDescriptor, related: &EntityDescriptor, foreign_key: &str) -> String {
    let related_table = quote_ident_mysql(related.table_name());
    format!(
        "INNER JOIN {} ON {}.{} = {}.{}",
        related_table,
        related_table,
        quote_ident_mysql(foreign_key),
        quote_ident_mysql(base.table_name()),
        quote_ident_mysql(ID_COLUMN)
    )
}
