//! MySQL column and table DDL.
//!
//! Every table starts with the implicit `id` key, followed by the declared
//! properties in declaration order. Indexes are never emitted.

use sqlgate_core::{
    EntityDescriptor, LogicalType, PropertyDescriptor, Result, encode_literal, escape_string,
    quote_ident_mysql,
};

/// Column definition of the implicit surrogate key.
pub const ID_COLUMN_SQL: &str = "`id` INT(11) NOT NULL AUTO_INCREMENT UNIQUE PRIMARY KEY";

/// Column type for a property.
pub fn datatype(prop: &PropertyDescriptor) -> String {
    match prop.logical_type {
        LogicalType::String => format!("VARCHAR({})", prop.limit.unwrap_or(255)),
        LogicalType::Text => "TEXT".to_string(),
        LogicalType::Number => format!("INT({})", prop.limit.unwrap_or(11)),
        LogicalType::Date => "DATETIME".to_string(),
        LogicalType::Boolean => "TINYINT(1)".to_string(),
    }
}

/// `<datatype> NULL|NOT NULL [DEFAULT <literal>]` for one property.
///
/// Producer and `Now` defaults are evaluated at the moment the DDL is built.
#[allow(clippy::result_large_err)]
pub fn property_settings_sql(prop: &PropertyDescriptor) -> Result<String> {
    let mut sql = datatype(prop);
    sql.push_str(if prop.nullable { " NULL" } else { " NOT NULL" });
    if let Some(default) = &prop.default {
        let value = default.resolve();
        if !value.is_null() {
            sql.push_str(" DEFAULT ");
            sql.push_str(&encode_literal(prop, &value, &escape_string)?);
        }
    }
    Ok(sql)
}

/// `` `name` <settings> `` for one property.
#[allow(clippy::result_large_err)]
pub fn column_sql(prop: &PropertyDescriptor) -> Result<String> {
    Ok(format!(
        "{} {}",
        quote_ident_mysql(&prop.name),
        property_settings_sql(prop)?
    ))
}

/// All column definitions of an entity, `id` first.
#[allow(clippy::result_large_err)]
pub fn properties_sql(entity: &EntityDescriptor) -> Result<String> {
    let mut columns = Vec::with_capacity(entity.properties().len() + 1);
    columns.push(ID_COLUMN_SQL.to_string());
    for prop in entity.properties() {
        columns.push(column_sql(prop)?);
    }
    Ok(columns.join(",\n  "))
}

/// `CREATE TABLE` for an entity.
#[allow(clippy::result_large_err)]
pub fn create_table_sql(entity: &EntityDescriptor) -> Result<String> {
    let sql = format!(
        "CREATE TABLE {} (\n  {}\n)",
        quote_ident_mysql(entity.table_name()),
        properties_sql(entity)?
    );
    tracing::trace!(table = entity.table_name(), sql = %sql, "generated CREATE TABLE");
    Ok(sql)
}

/// `DROP TABLE IF EXISTS` for an entity.
pub fn drop_table_sql(entity: &EntityDescriptor) -> String {
    let sql = format!(
        "DROP TABLE IF EXISTS {}",
        quote_ident_mysql(entity.table_name())
    );
    tracing::trace!(table = entity.table_name(), sql = %sql, "generated DROP TABLE");
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgate_core::{DefaultValue, Value};

    #[test]
    fn test_datatype_mapping() {
        let cases = [
            (PropertyDescriptor::new("a", LogicalType::String), "VARCHAR(255)"),
            (
                PropertyDescriptor::new("a", LogicalType::String).limit(40),
                "VARCHAR(40)",
            ),
            (PropertyDescriptor::new("a", LogicalType::Text), "TEXT"),
            (PropertyDescriptor::new("a", LogicalType::Number), "INT(11)"),
            (
                PropertyDescriptor::new("a", LogicalType::Number).limit(4),
                "INT(4)",
            ),
            (PropertyDescriptor::new("a", LogicalType::Date), "DATETIME"),
            (PropertyDescriptor::new("a", LogicalType::Boolean), "TINYINT(1)"),
        ];
        for (prop, expected) in cases {
            assert_eq!(datatype(&prop), expected);
        }
    }

    #[test]
    fn test_settings_null_and_defaults() {
        let plain = PropertyDescriptor::new("title", LogicalType::String);
        assert_eq!(property_settings_sql(&plain).unwrap(), "VARCHAR(255) NULL");

        let strict = PropertyDescriptor::new("title", LogicalType::String)
            .not_null()
            .default_value("untitled");
        assert_eq!(
            property_settings_sql(&strict).unwrap(),
            "VARCHAR(255) NOT NULL DEFAULT 'untitled'"
        );

        let counter = PropertyDescriptor::new("views", LogicalType::Number).default_value(0);
        assert_eq!(
            property_settings_sql(&counter).unwrap(),
            "INT(11) NULL DEFAULT 0"
        );

        let flag = PropertyDescriptor::new("active", LogicalType::Boolean).default_value(true);
        assert_eq!(
            property_settings_sql(&flag).unwrap(),
            "TINYINT(1) NULL DEFAULT 1"
        );
    }

    #[test]
    fn test_producer_default_evaluated() {
        let prop = PropertyDescriptor::new("code", LogicalType::String)
            .default_with(DefaultValue::producer(|| Value::Text("x'1".into())));
        assert_eq!(
            property_settings_sql(&prop).unwrap(),
            "VARCHAR(255) NULL DEFAULT 'x''1'"
        );
    }

    #[test]
    fn test_now_default_is_quoted_datetime() {
        let prop = PropertyDescriptor::new("created", LogicalType::Date)
            .default_with(DefaultValue::Now);
        let sql = property_settings_sql(&prop).unwrap();
        assert!(sql.starts_with("DATETIME NULL DEFAULT '"));
        // 'YYYY-MM-DD HH:MM:SS'
        let literal = sql.trim_start_matches("DATETIME NULL DEFAULT ");
        assert_eq!(literal.len(), 21);
    }

    #[test]
    fn test_create_and_drop_table() {
        let entity = EntityDescriptor::new("Post")
            .table("posts")
            .property(PropertyDescriptor::new("title", LogicalType::String).not_null())
            .property(PropertyDescriptor::new("body", LogicalType::Text));
        assert_eq!(
            create_table_sql(&entity).unwrap(),
            "CREATE TABLE `posts` (\n  \
             `id` INT(11) NOT NULL AUTO_INCREMENT UNIQUE PRIMARY KEY,\n  \
             `title` VARCHAR(255) NOT NULL,\n  \
             `body` TEXT NULL\n)"
        );
        assert_eq!(drop_table_sql(&entity), "DROP TABLE IF EXISTS `posts`");
    }

    #[test]
    fn test_empty_entity_has_only_id() {
        let entity = EntityDescriptor::new("Tag");
        assert_eq!(properties_sql(&entity).unwrap(), ID_COLUMN_SQL);
    }
}
