//! SELECT statement builder for the external source.
//!
//! Table and column names come from trusted configuration and are emitted
//! verbatim. Condition values are escaped according to the configured
//! [`QuoteStyle`] and must be representable in the source encoding.

use std::fmt::Write as _;

use crate::encoding::SourceEncoding;
use crate::error::ConnectorResult;

/// How string literals are escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteStyle {
    /// `'` becomes `''`.
    #[default]
    Doubling,
    /// `\`, `'`, `"` and NUL are backslash-escaped.
    Backslash,
}

/// Escape a literal value for interpolation between single quotes.
#[must_use]
pub fn escape_literal(value: &str, style: QuoteStyle) -> String {
    match style {
        QuoteStyle::Doubling => value.replace('\'', "''"),
        QuoteStyle::Backslash => {
            let mut escaped = String::with_capacity(value.len());
            for c in value.chars() {
                match c {
                    '\\' => escaped.push_str("\\\\"),
                    '\'' => escaped.push_str("\\'"),
                    '"' => escaped.push_str("\\\""),
                    '\0' => escaped.push_str("\\0"),
                    other => escaped.push(other),
                }
            }
            escaped
        }
    }
}

/// Row count statement for a table.
#[must_use]
pub fn count_sql(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", table.trim())
}

/// A `SELECT` against a single source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    table: String,
    conditions: Vec<(String, String)>,
    fields: Vec<String>,
    distinct: bool,
    sort: Option<String>,
}

impl SelectQuery {
    /// Select every column of `table`.
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into().trim().to_string(),
            conditions: Vec::new(),
            fields: Vec::new(),
            distinct: false,
            sort: None,
        }
    }

    /// Add an equality condition; conditions are joined with `AND`.
    #[must_use]
    pub fn with_condition(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    /// Project the given columns instead of `*`.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Return distinct rows only.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Order by the given expression.
    #[must_use]
    pub fn order_by(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    /// Render the statement.
    ///
    /// Condition values are only checked against `encoding` here; the driver
    /// transcodes the finished statement into the connection character set.
    pub fn to_sql(&self, style: QuoteStyle, encoding: &SourceEncoding) -> ConnectorResult<String> {
        self.to_sql_with_projection(&self.fields, style, encoding)
    }

    /// Render the statement with `projection` emitted verbatim in place of
    /// the configured fields. An empty projection selects `*`.
    pub fn to_sql_with_projection(
        &self,
        projection: &[String],
        style: QuoteStyle,
        encoding: &SourceEncoding,
    ) -> ConnectorResult<String> {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if projection.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&projection.join(","));
        }
        let _ = write!(sql, " FROM {}", self.table);

        for (i, (column, value)) in self.conditions.iter().enumerate() {
            encoding.ensure_representable(value)?;
            let keyword = if i == 0 { "WHERE" } else { "AND" };
            let _ = write!(
                sql,
                " {keyword} {column} = '{}'",
                escape_literal(value, style)
            );
        }

        if let Some(sort) = &self.sort {
            let _ = write!(sql, " ORDER BY {sort}");
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_doubling() {
        assert_eq!(escape_literal("O'Brien", QuoteStyle::Doubling), "O''Brien");
        assert_eq!(escape_literal(r"a\b", QuoteStyle::Doubling), r"a\b");
    }

    #[test]
    fn test_escape_backslash() {
        assert_eq!(escape_literal("O'Brien", QuoteStyle::Backslash), r"O\'Brien");
        assert_eq!(escape_literal(r"a\b", QuoteStyle::Backslash), r"a\\b");
        assert_eq!(escape_literal("say \"hi\"", QuoteStyle::Backslash), r#"say \"hi\""#);
        assert_eq!(escape_literal("nul\0", QuoteStyle::Backslash), r"nul\0");
    }

    #[test]
    fn test_select_all() {
        let sql = SelectQuery::from_table(" staff_roles ")
            .to_sql(QuoteStyle::Doubling, &SourceEncoding::utf8())
            .unwrap();
        assert_eq!(sql, "SELECT * FROM staff_roles");
    }

    #[test]
    fn test_select_with_everything() {
        let sql = SelectQuery::from_table("staff_roles")
            .with_fields(["username", "role"])
            .with_condition("campus", "St Mary's")
            .with_condition("active", "1")
            .distinct()
            .order_by("username")
            .to_sql(QuoteStyle::Doubling, &SourceEncoding::utf8())
            .unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT username,role FROM staff_roles \
             WHERE campus = 'St Mary''s' AND active = '1' ORDER BY username"
        );
    }

    #[test]
    fn test_projection_replaces_fields() {
        let sql = SelectQuery::from_table("staff_roles")
            .with_fields(["username"])
            .with_condition("role", "editor")
            .to_sql_with_projection(
                &[
                    "username".to_string(),
                    "CAST(hired AS TEXT) AS hired".to_string(),
                ],
                QuoteStyle::Doubling,
                &SourceEncoding::utf8(),
            )
            .unwrap();
        assert_eq!(
            sql,
            "SELECT username,CAST(hired AS TEXT) AS hired FROM staff_roles WHERE role = 'editor'"
        );
    }

    #[test]
    fn test_condition_must_fit_source_encoding() {
        let enc = SourceEncoding::for_label("latin1").unwrap();
        let query = SelectQuery::from_table("t").with_condition("name", "José");
        assert!(query.to_sql(QuoteStyle::Doubling, &enc).is_ok());

        let query = SelectQuery::from_table("t").with_condition("name", "日本");
        let err = query.to_sql(QuoteStyle::Doubling, &enc).unwrap_err();
        assert_eq!(err.error_code(), "UNREPRESENTABLE_VALUE");
    }

    #[test]
    fn test_count_sql() {
        assert_eq!(count_sql("staff_roles"), "SELECT COUNT(*) FROM staff_roles");
    }
}
