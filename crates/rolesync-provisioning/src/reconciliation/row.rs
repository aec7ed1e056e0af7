//! Typed access to the configured columns of a source row.

use serde_json::{Map, Value};

use rolesync_connector::{ExternalRow, SourceEncoding};

use super::error::RowError;

/// A source row reduced to its user identifier and role shortname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    /// Trimmed, decoded user identifier.
    pub user: String,
    /// Trimmed, decoded role shortname.
    pub role: String,
}

impl NormalizedRow {
    /// `user => role`, as used in trace lines.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} => {}", self.user, self.role)
    }
}

/// Extracts the user and role values from source rows.
///
/// Column names are resolved case-insensitively. Values are decoded from the
/// source encoding and trimmed; `NULL` counts as empty.
#[derive(Debug, Clone)]
pub struct RowAccessor {
    user_field: String,
    role_field: String,
    encoding: SourceEncoding,
}

impl RowAccessor {
    #[must_use]
    pub fn new(user_field: &str, role_field: &str, encoding: SourceEncoding) -> Self {
        Self {
            user_field: user_field.trim().to_lowercase(),
            role_field: role_field.trim().to_lowercase(),
            encoding,
        }
    }

    #[must_use]
    pub fn user_field(&self) -> &str {
        &self.user_field
    }

    #[must_use]
    pub fn role_field(&self) -> &str {
        &self.role_field
    }

    pub fn normalize(&self, row: &ExternalRow) -> Result<NormalizedRow, RowError> {
        let user = self.field(row, &self.user_field)?;
        let role = self.field(row, &self.role_field)?;

        if user.is_empty() || role.is_empty() {
            return Err(RowError::InvalidRow {
                record: self.describe_record(row),
            });
        }
        Ok(NormalizedRow { user, role })
    }

    fn field(&self, row: &ExternalRow, name: &str) -> Result<String, RowError> {
        let value = row.get(name).ok_or_else(|| RowError::MissingField {
            field: name.to_string(),
        })?;
        Ok(value
            .decode(&self.encoding)
            .map(|text| text.trim().to_string())
            .unwrap_or_default())
    }

    /// The decoded row as a JSON object.
    fn describe_record(&self, row: &ExternalRow) -> String {
        let object: Map<String, Value> = row
            .iter()
            .map(|(column, value)| {
                let value = value
                    .decode(&self.encoding)
                    .map_or(Value::Null, |text| Value::String(text.into_owned()));
                (column.to_string(), value)
            })
            .collect();
        Value::Object(object).to_string()
    }
}
