//! Live table structure as reported by `SHOW FIELDS`.

use sqlgate_core::{EntityDescriptor, Row, Value, quote_ident_mysql};

/// Parsed SQL type with extracted metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSqlType {
    /// Base type name (e.g., VARCHAR, INT, DECIMAL)
    pub base_type: String,
    /// Length or display width (e.g., VARCHAR(255) -> 255)
    pub length: Option<u32>,
    /// Precision for numeric types (e.g., DECIMAL(10,2) -> 10)
    pub precision: Option<u32>,
    /// Scale for numeric types (e.g., DECIMAL(10,2) -> 2)
    pub scale: Option<u32>,
    /// Whether the type is unsigned
    pub unsigned: bool,
}

impl ParsedSqlType {
    /// Parse a MySQL type string.
    ///
    /// # Examples
    /// - `varchar(255)` -> base_type: "VARCHAR", length: 255
    /// - `decimal(10,2)` -> base_type: "DECIMAL", precision: 10, scale: 2
    /// - `int(10) unsigned` -> base_type: "INT", length: 10, unsigned: true
    pub fn parse(type_str: &str) -> Self {
        let upper = type_str.trim().to_uppercase();

        let (type_str, unsigned) = match upper.strip_suffix(" UNSIGNED") {
            Some(rest) => (rest.trim_end(), true),
            None => (upper.as_str(), false),
        };

        let Some(paren_start) = type_str.find('(') else {
            return Self {
                base_type: normalize_base(type_str.trim()),
                unsigned,
                ..Self::default()
            };
        };

        let base_type = normalize_base(type_str[..paren_start].trim());
        let params = type_str[paren_start + 1..]
            .trim_end()
            .trim_end_matches(')');

        if let Some((precision, scale)) = params.split_once(',') {
            Self {
                base_type,
                precision: precision.trim().parse().ok(),
                scale: scale.trim().parse().ok(),
                unsigned,
                ..Self::default()
            }
        } else {
            Self {
                base_type,
                length: params.trim().parse().ok(),
                unsigned,
                ..Self::default()
            }
        }
    }

    /// Integer types whose width is display-only.
    pub fn is_integer(&self) -> bool {
        matches!(
            self.base_type.as_str(),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT"
        )
    }

    /// Whether a live column type satisfies a declared one.
    ///
    /// Servers that drop integer display widths (`int` for `INT(11)`) still
    /// match, except `TINYINT(1)` which is the boolean marker.
    pub fn matches_declared(&self, declared: &ParsedSqlType) -> bool {
        if self.base_type != declared.base_type
            || self.unsigned != declared.unsigned
            || self.precision != declared.precision
            || self.scale != declared.scale
        {
            return false;
        }
        if self.length == declared.length {
            return true;
        }
        self.is_integer() && self.length.is_none() && declared.length != Some(1)
    }
}

fn normalize_base(base: &str) -> String {
    match base {
        "INTEGER" => "INT".to_string(),
        "BOOL" | "BOOLEAN" => "TINYINT".to_string(),
        other => other.to_string(),
    }
}

/// One row of `SHOW FIELDS FROM <table>`.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveColumn {
    /// Column name (`Field`)
    pub name: String,
    /// Raw type text (`Type`)
    pub sql_type: String,
    /// Parsed type
    pub parsed_type: ParsedSqlType,
    /// `Null` is `YES`
    pub nullable: bool,
    /// `Key` (`PRI`, `UNI`, `MUL` or empty)
    pub key: String,
    /// `Default`, when not NULL
    pub default: Option<String>,
    /// `Extra` (e.g. `auto_increment`)
    pub extra: String,
}

impl LiveColumn {
    /// Build from a `SHOW FIELDS` row; rows without `Field`/`Type` are skipped.
    ///
    /// Columns may arrive as text or as binary strings.
    pub fn from_row(row: &Row) -> Option<Self> {
        let name = text_column(row, "Field")?;
        let sql_type = text_column(row, "Type")?;
        let null = text_column(row, "Null").unwrap_or_default();
        let key = text_column(row, "Key").unwrap_or_default();
        let default = text_column(row, "Default");
        let extra = text_column(row, "Extra").unwrap_or_default();
        let parsed_type = ParsedSqlType::parse(&sql_type);

        Some(Self {
            name,
            sql_type,
            parsed_type,
            nullable: null.eq_ignore_ascii_case("YES"),
            key,
            default,
            extra,
        })
    }
}

fn text_column(row: &Row, name: &str) -> Option<String> {
    match row.get_by_name(name)? {
        Value::Text(s) => Some(s.clone()),
        Value::Bytes(b) => String::from_utf8(b.clone()).ok(),
        _ => None,
    }
}

/// `SHOW FIELDS FROM <table>` for an entity.
pub fn show_fields_sql(entity: &EntityDescriptor) -> String {
    format!("SHOW FIELDS FROM {}", quote_ident_mysql(entity.table_name()))
}

/// Parse every usable row of a `SHOW FIELDS` result.
pub fn live_columns(rows: &[Row]) -> Vec<LiveColumn> {
    rows.iter().filter_map(LiveColumn::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_row(name: &str, ty: &str, null: &str) -> Row {
        Row::new(
            ["Field", "Type", "Null", "Key", "Default", "Extra"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            vec![
                Value::Text(name.into()),
                Value::Text(ty.into()),
                Value::Text(null.into()),
                Value::Text(String::new()),
                Value::Null,
                Value::Text(String::new()),
            ],
        )
    }

    #[test]
    fn test_parse_types() {
        let t = ParsedSqlType::parse("varchar(255)");
        assert_eq!(t.base_type, "VARCHAR");
        assert_eq!(t.length, Some(255));

        let t = ParsedSqlType::parse("decimal(10,2)");
        assert_eq!(t.precision, Some(10));
        assert_eq!(t.scale, Some(2));
        assert_eq!(t.length, None);

        let t = ParsedSqlType::parse("int(10) unsigned");
        assert_eq!(t.base_type, "INT");
        assert_eq!(t.length, Some(10));
        assert!(t.unsigned);

        let t = ParsedSqlType::parse("datetime");
        assert_eq!(t.base_type, "DATETIME");
        assert_eq!(t.length, None);
    }

    #[test]
    fn test_integer_width_is_ignored_when_absent() {
        let declared = ParsedSqlType::parse("INT(11)");
        assert!(ParsedSqlType::parse("int").matches_declared(&declared));
        assert!(ParsedSqlType::parse("int(11)").matches_declared(&declared));
        assert!(!ParsedSqlType::parse("int(4)").matches_declared(&declared));
        assert!(!ParsedSqlType::parse("bigint").matches_declared(&declared));
    }

    #[test]
    fn test_boolean_width_must_match() {
        let declared = ParsedSqlType::parse("TINYINT(1)");
        assert!(ParsedSqlType::parse("tinyint(1)").matches_declared(&declared));
        assert!(!ParsedSqlType::parse("tinyint").matches_declared(&declared));
    }

    #[test]
    fn test_varchar_width_must_match() {
        let declared = ParsedSqlType::parse("VARCHAR(255)");
        assert!(!ParsedSqlType::parse("varchar(100)").matches_declared(&declared));
    }

    #[test]
    fn test_live_column_from_row() {
        let col = LiveColumn::from_row(&field_row("name", "varchar(255)", "YES")).unwrap();
        assert_eq!(col.name, "name");
        assert!(col.nullable);
        assert_eq!(col.default, None);
        assert_eq!(col.key, "");
    }

    #[test]
    fn test_live_column_from_binary_row() {
        let bytes = |s: &str| Value::Bytes(s.as_bytes().to_vec());
        let row = Row::new(
            ["Field", "Type", "Null", "Key", "Default", "Extra"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            vec![
                bytes("id"),
                bytes("int(11)"),
                bytes("NO"),
                bytes("PRI"),
                Value::Null,
                bytes("auto_increment"),
            ],
        );

        let cols = live_columns(&[row, field_row("title", "varchar(80)", "YES")]);
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].name, "id");
        assert_eq!(cols[0].parsed_type.base_type, "INT");
        assert!(!cols[0].nullable);
        assert_eq!(cols[0].key, "PRI");
        assert_eq!(cols[0].default, None);
        assert_eq!(cols[0].extra, "auto_increment");
        assert_eq!(cols[1].name, "title");
    }

    #[test]
    fn test_non_utf8_field_is_skipped() {
        let row = Row::new(
            vec!["Field".to_string(), "Type".to_string()],
            vec![Value::Bytes(vec![0xff, 0xfe]), Value::Text("int".into())],
        );
        assert!(LiveColumn::from_row(&row).is_none());
    }

    #[test]
    fn test_rows_without_field_are_skipped() {
        let broken = Row::new(vec!["Type".to_string()], vec![Value::Text("int".into())]);
        let rows = vec![broken, field_row("id", "int(11)", "NO")];
        let cols = live_columns(&rows);
        assert_eq!(cols.len(), 1);
        assert_eq!(cols[0].name, "id");
    }

    #[test]
    fn test_show_fields_sql() {
        let entity = sqlgate_core::EntityDescriptor::new("User").table("users");
        assert_eq!(show_fields_sql(&entity), "SHOW FIELDS FROM `users`");
    }
}
