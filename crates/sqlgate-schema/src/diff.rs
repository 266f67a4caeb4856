//! Declared-versus-live column diff.

use crate::ddl::{column_sql, datatype};
use crate::introspect::{LiveColumn, ParsedSqlType};
use sqlgate_core::{EntityDescriptor, ID_COLUMN, PropertyDescriptor, Result, quote_ident_mysql};
use std::fmt;

/// One clause of a multi-clause `ALTER TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterClause {
    /// Declared property missing from the table
    Add { column: String, definition: String },
    /// Live column the entity no longer declares
    Drop { column: String },
    /// Column whose nullability or type differs
    Change { column: String, definition: String },
}

impl AlterClause {
    pub fn column(&self) -> &str {
        match self {
            AlterClause::Add { column, .. }
            | AlterClause::Drop { column }
            | AlterClause::Change { column, .. } => column,
        }
    }
}

impl fmt::Display for AlterClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlterClause::Add { definition, .. } => write!(f, "ADD COLUMN {}", definition),
            AlterClause::Drop { column } => write!(f, "DROP COLUMN {}", quote_ident_mysql(column)),
            AlterClause::Change { column, definition } => write!(
                f,
                "CHANGE COLUMN {} {}",
                quote_ident_mysql(column),
                definition
            ),
        }
    }
}

/// Whether a live column differs from its declaration.
pub fn column_changed(prop: &PropertyDescriptor, live: &LiveColumn) -> bool {
    if live.nullable != prop.nullable {
        return true;
    }
    let declared = ParsedSqlType::parse(&datatype(prop));
    !live.parsed_type.matches_declared(&declared)
}

/// Compute the clauses that bring `live` in line with `entity`.
///
/// Adds and changes come first in declaration order, then drops in live
/// column order. The `id` column is never dropped.
#[allow(clippy::result_large_err)]
pub fn alter_table(entity: &EntityDescriptor, live: &[LiveColumn]) -> Result<Vec<AlterClause>> {
    let mut clauses = Vec::new();

    for prop in entity.properties() {
        match live.iter().find(|c| c.name == prop.name) {
            None => clauses.push(AlterClause::Add {
                column: prop.name.clone(),
                definition: column_sql(prop)?,
            }),
            Some(existing) if column_changed(prop, existing) => {
                clauses.push(AlterClause::Change {
                    column: prop.name.clone(),
                    definition: column_sql(prop)?,
                });
            }
            Some(_) => {}
        }
    }

    for column in live {
        if column.name == ID_COLUMN {
            continue;
        }
        if !entity.properties().iter().any(|p| p.name == column.name) {
            clauses.push(AlterClause::Drop {
                column: column.name.clone(),
            });
        }
    }

    Ok(clauses)
}

/// Render clauses into one `ALTER TABLE`, or `None` when nothing changed.
pub fn alter_table_sql(entity: &EntityDescriptor, clauses: &[AlterClause]) -> Option<String> {
    if clauses.is_empty() {
        return None;
    }
    let body = clauses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",\n");
    let sql = format!(
        "ALTER TABLE {} {}",
        quote_ident_mysql(entity.table_name()),
        body
    );
    tracing::trace!(table = entity.table_name(), sql = %sql, "generated ALTER TABLE");
    Some(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgate_core::LogicalType;

    fn live(name: &str, ty: &str, nullable: bool) -> LiveColumn {
        LiveColumn {
            name: name.to_string(),
            sql_type: ty.to_string(),
            parsed_type: ParsedSqlType::parse(ty),
            nullable,
            key: if name == "id" { "PRI".into() } else { String::new() },
            default: None,
            extra: if name == "id" {
                "auto_increment".into()
            } else {
                String::new()
            },
        }
    }

    fn id() -> LiveColumn {
        live("id", "int(11)", false)
    }

    #[test]
    fn test_added_column_without_dropping_id() {
        let entity = EntityDescriptor::new("User")
            .property(PropertyDescriptor::new("name", LogicalType::String))
            .property(PropertyDescriptor::new("email", LogicalType::String));
        let clauses = alter_table(&entity, &[id(), live("name", "varchar(255)", true)]).unwrap();

        assert_eq!(
            clauses,
            vec![AlterClause::Add {
                column: "email".into(),
                definition: "`email` VARCHAR(255) NULL".into()
            }]
        );
        let sql = alter_table_sql(&entity, &clauses).unwrap();
        assert_eq!(sql, "ALTER TABLE `User` ADD COLUMN `email` VARCHAR(255) NULL");
        assert!(!sql.contains("DROP COLUMN"));
    }

    #[test]
    fn test_undeclared_column_dropped() {
        let entity = EntityDescriptor::new("User")
            .property(PropertyDescriptor::new("name", LogicalType::String));
        let clauses = alter_table(
            &entity,
            &[id(), live("name", "varchar(255)", true), live("legacy", "text", true)],
        )
        .unwrap();
        assert_eq!(
            clauses,
            vec![AlterClause::Drop {
                column: "legacy".into()
            }]
        );
    }

    #[test]
    fn test_nullability_and_type_changes() {
        let entity = EntityDescriptor::new("User")
            .property(PropertyDescriptor::new("name", LogicalType::String).not_null())
            .property(PropertyDescriptor::new("age", LogicalType::Number))
            .property(PropertyDescriptor::new("bio", LogicalType::Text));
        let clauses = alter_table(
            &entity,
            &[
                id(),
                live("name", "varchar(255)", true),
                live("age", "varchar(20)", true),
                live("bio", "text", true),
            ],
        )
        .unwrap();

        let changed: Vec<_> = clauses.iter().map(AlterClause::column).collect();
        assert_eq!(changed, vec!["name", "age"]);
        assert_eq!(
            clauses[0].to_string(),
            "CHANGE COLUMN `name` `name` VARCHAR(255) NOT NULL"
        );
    }

    #[test]
    fn test_multi_clause_join() {
        let entity = EntityDescriptor::new("Post")
            .property(PropertyDescriptor::new("title", LogicalType::String))
            .property(PropertyDescriptor::new("published", LogicalType::Boolean));
        let clauses = alter_table(&entity, &[id(), live("body", "text", true)]).unwrap();
        assert_eq!(
            alter_table_sql(&entity, &clauses).unwrap(),
            "ALTER TABLE `Post` ADD COLUMN `title` VARCHAR(255) NULL,\n\
             ADD COLUMN `published` TINYINT(1) NULL,\n\
             DROP COLUMN `body`"
        );
    }

    #[test]
    fn test_in_sync_table_needs_nothing() {
        let entity = EntityDescriptor::new("User")
            .property(PropertyDescriptor::new("name", LogicalType::String))
            .property(PropertyDescriptor::new("age", LogicalType::Number));
        let clauses = alter_table(
            &entity,
            &[id(), live("name", "varchar(255)", true), live("age", "int", true)],
        )
        .unwrap();
        assert!(clauses.is_empty());
        assert_eq!(alter_table_sql(&entity, &clauses), None);
    }
}
