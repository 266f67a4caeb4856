//! MySQL identifier quoting and string-literal escaping.
//!
//! Table and column names come from entity descriptors and caller-supplied
//! ordering text. Ordering text is not validated.

/// Quote a SQL identifier using MySQL backtick quoting.
///
/// Embedded backticks are escaped by doubling them (`` ` `` → ``` `` ```).
///
/// # Examples
///
/// ```
/// use sqlgate_core::quote_ident_mysql;
///
/// assert_eq!(quote_ident_mysql("users"), "`users`");
/// assert_eq!(quote_ident_mysql("user`name"), "`user``name`");
/// ```
#[inline]
pub fn quote_ident_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a possibly qualified name (`table.column`), one backtick pair per part.
///
/// ```
/// use sqlgate_core::quote_qualified;
///
/// assert_eq!(quote_qualified("Post.userId"), "`Post`.`userId`");
/// ```
pub fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(quote_ident_mysql)
        .collect::<Vec<_>>()
        .join(".")
}

/// Render a string as a single-quoted MySQL literal.
///
/// ```
/// use sqlgate_core::escape_string;
///
/// assert_eq!(escape_string("it's"), "'it''s'");
/// ```
pub fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => result.push_str("''"),
            '\\' => result.push_str("\\\\"),
            '\0' => result.push_str("\\0"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\x1a' => result.push_str("\\Z"),
            _ => result.push(ch),
        }
    }
    result.push('\'');
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_mysql_embedded_backtick() {
        assert_eq!(quote_ident_mysql("a`b`c"), "`a``b``c`");
        assert_eq!(quote_ident_mysql(""), "``");
    }

    #[test]
    fn test_quote_qualified_single_part() {
        assert_eq!(quote_qualified("User"), "`User`");
    }

    #[test]
    fn test_quote_qualified_escapes_each_part() {
        assert_eq!(quote_qualified("a`x.b"), "`a``x`.`b`");
    }

    #[test]
    fn test_escape_string_control_chars() {
        assert_eq!(escape_string("a\nb"), "'a\\nb'");
        assert_eq!(escape_string("back\\slash"), "'back\\\\slash'");
        assert_eq!(escape_string("nul\0"), "'nul\\0'");
        assert_eq!(escape_string("\x1a"), "'\\Z'");
    }

    #[test]
    fn test_escape_string_injection_attempt() {
        let escaped = escape_string("'; DROP TABLE users; --");
        assert_eq!(escaped, "'''; DROP TABLE users; --'");
    }
}
