//! Statement builders for the adapter's CRUD surface.
//!
//! Every builder returns a [`Statement`] using MySQL `?` placeholders.
//! Record columns are written in declaration order; columns the entity does
//! not declare are skipped.

use crate::clause::{Fragment, build_join, build_limit, build_order_by, build_where};
use crate::filter::Filter;
use sqlgate_core::{
    EntityDescriptor, Error, ID_COLUMN, Record, Result, ValidationError, Value, encode_param,
    quote_ident_mysql,
};

/// SQL text plus bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

fn table(entity: &EntityDescriptor) -> String {
    quote_ident_mysql(entity.table_name())
}

/// Declared, present, non-key columns of a record with their encoded values.
#[allow(clippy::result_large_err)]
fn encoded_columns(entity: &EntityDescriptor, record: &Record) -> Result<Vec<(String, Value)>> {
    let mut columns = Vec::new();
    for prop in entity.properties() {
        if let Some(value) = record.get(&prop.name) {
            columns.push((quote_ident_mysql(&prop.name), encode_param(prop, value)?));
        }
    }
    Ok(columns)
}

#[allow(clippy::result_large_err)]
fn encoded_id(entity: &EntityDescriptor, id: &Value) -> Result<Value> {
    match entity.get_property(ID_COLUMN) {
        Some(prop) => encode_param(prop, id),
        None => Ok(id.clone()),
    }
}

/// `SELECT * FROM t [WHERE] [ORDER BY] [LIMIT]`, or the join form.
///
/// With a join, the only filter applied is the first plain equality
/// condition, tested against the related table; other conditions are not
/// combined with it.
#[allow(clippy::result_large_err)]
pub fn select(
    entity: &EntityDescriptor,
    filter: &Filter,
    related: Option<&EntityDescriptor>,
    escape: &dyn Fn(&str) -> String,
) -> Result<Statement> {
    let base = table(entity);
    let mut parts = Vec::new();
    let mut params = Vec::new();

    match (&filter.join, related) {
        (Some(join), Some(related)) => {
            parts.push(format!("SELECT {}.* FROM {}", base, base));
            parts.push(build_join(entity, related, &join.foreign_key));
            if let Some((column, value)) = filter.first_equality() {
                if let Some(prop) = related.get_property(column) {
                    parts.push(format!(
                        "WHERE {}.{} = ?",
                        quote_ident_mysql(related.table_name()),
                        quote_ident_mysql(column)
                    ));
                    params.push(encode_param(prop, value)?);
                }
            }
        }
        (Some(join), None) => {
            return Err(Error::invalid_filter(format!(
                "join target '{}' is not defined",
                join.model_name
            )));
        }
        (None, _) => {
            parts.push(format!("SELECT * FROM {}", base));
            let Fragment {
                sql,
                params: mut where_params,
            } = build_where(entity, &filter.conditions, escape)?;
            if !sql.is_empty() {
                parts.push(sql);
                params.append(&mut where_params);
            }
        }
    }

    let order = build_order_by(&filter.order);
    if !order.is_empty() {
        parts.push(order);
    }
    let limit = build_limit(filter.limit, filter.offset);
    if !limit.is_empty() {
        parts.push(limit);
    }

    Ok(Statement::new(parts.join(" "), params))
}

/// `INSERT INTO t SET a = ?, b = ?`, or `INSERT INTO t VALUES ()` when no
/// declared column is present.
#[allow(clippy::result_large_err)]
pub fn insert(entity: &EntityDescriptor, record: &Record) -> Result<Statement> {
    let columns = encoded_columns(entity, record)?;
    if columns.is_empty() {
        return Ok(Statement::new(
            format!("INSERT INTO {} VALUES ()", table(entity)),
            Vec::new(),
        ));
    }
    let (names, params): (Vec<_>, Vec<_>) = columns.into_iter().unzip();
    let set = names
        .iter()
        .map(|n| format!("{} = ?", n))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(Statement::new(
        format!("INSERT INTO {} SET {}", table(entity), set),
        params,
    ))
}

/// `UPDATE t SET a = ?, ... WHERE id = ?`. The record must carry an `id`.
#[allow(clippy::result_large_err)]
pub fn update(entity: &EntityDescriptor, record: &Record) -> Result<Statement> {
    let Some(id) = record.id() else {
        let mut err = ValidationError::new();
        err.add_required(ID_COLUMN);
        return Err(Error::Validation(err));
    };
    let columns = encoded_columns(entity, record)?;
    if columns.is_empty() {
        let mut err = ValidationError::new();
        err.add_custom(
            entity.table_name(),
            "record has no declared columns to update",
        );
        return Err(Error::Validation(err));
    }
    let (names, mut params): (Vec<_>, Vec<_>) = columns.into_iter().unzip();
    let set = names
        .iter()
        .map(|n| format!("{} = ?", n))
        .collect::<Vec<_>>()
        .join(", ");
    params.push(encoded_id(entity, id)?);
    Ok(Statement::new(
        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            table(entity),
            set,
            quote_ident_mysql(ID_COLUMN)
        ),
        params,
    ))
}

/// `DELETE FROM t WHERE id = ?`.
#[allow(clippy::result_large_err)]
pub fn delete(entity: &EntityDescriptor, id: &Value) -> Result<Statement> {
    Ok(Statement::new(
        format!(
            "DELETE FROM {} WHERE {} = ?",
            table(entity),
            quote_ident_mysql(ID_COLUMN)
        ),
        vec![encoded_id(entity, id)?],
    ))
}

/// `SELECT * FROM t WHERE id = ? LIMIT 1`.
#[allow(clippy::result_large_err)]
pub fn find(entity: &EntityDescriptor, id: &Value) -> Result<Statement> {
    Ok(Statement::new(
        format!(
            "SELECT * FROM {} WHERE {} = ? LIMIT 1",
            table(entity),
            quote_ident_mysql(ID_COLUMN)
        ),
        vec![encoded_id(entity, id)?],
    ))
}

/// `SELECT 1 FROM t WHERE id = ? LIMIT 1`.
#[allow(clippy::result_large_err)]
pub fn exists(entity: &EntityDescriptor, id: &Value) -> Result<Statement> {
    Ok(Statement::new(
        format!(
            "SELECT 1 FROM {} WHERE {} = ? LIMIT 1",
            table(entity),
            quote_ident_mysql(ID_COLUMN)
        ),
        vec![encoded_id(entity, id)?],
    ))
}

/// `SELECT count(*) AS cnt FROM t [WHERE ...]`.
///
/// Only equality and NULL tests are accepted here; operator expressions
/// belong to `select`.
#[allow(clippy::result_large_err)]
pub fn count(entity: &EntityDescriptor, conditions: &[(String, Value)]) -> Result<Statement> {
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    for (column, value) in conditions {
        let Some(prop) = entity.get_property(column) else {
            continue;
        };
        let quoted = quote_ident_mysql(column);
        if value.is_null() {
            clauses.push(format!("{} IS NULL", quoted));
        } else {
            clauses.push(format!("{} = ?", quoted));
            params.push(encode_param(prop, value)?);
        }
    }

    let mut sql = format!("SELECT count(*) AS cnt FROM {}", table(entity));
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    Ok(Statement::new(sql, params))
}

/// `INSERT INTO t (cols) VALUES (?, ...) ON DUPLICATE KEY UPDATE c = ?, ...`.
///
/// `id` leads the column list when present. Parameters are the inserted
/// values followed by the non-key values again for the update clause. A
/// record with no non-key column updates `id` to itself.
#[allow(clippy::result_large_err)]
pub fn upsert(entity: &EntityDescriptor, record: &Record) -> Result<Statement> {
    let mut names = Vec::new();
    let mut values = Vec::new();
    if let Some(id) = record.id() {
        names.push(quote_ident_mysql(ID_COLUMN));
        values.push(encoded_id(entity, id)?);
    }
    let columns = encoded_columns(entity, record)?;
    let updates: Vec<_> = columns.iter().map(|(n, _)| format!("{} = ?", n)).collect();
    let mut update_values: Vec<_> = columns.iter().map(|(_, v)| v.clone()).collect();
    for (name, value) in columns {
        names.push(name);
        values.push(value);
    }

    let update_clause = if updates.is_empty() {
        let id = quote_ident_mysql(ID_COLUMN);
        format!("{} = {}", id, id)
    } else {
        updates.join(", ")
    };
    let placeholders = vec!["?"; values.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
        table(entity),
        names.join(", "),
        placeholders,
        update_clause
    );
    values.append(&mut update_values);
    Ok(Statement::new(sql, values))
}
