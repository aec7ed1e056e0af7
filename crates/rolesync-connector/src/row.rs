//! Rows read from the external source.

use serde::{Serialize, Serializer};
use std::borrow::Cow;

use crate::encoding::SourceEncoding;

/// A single column value as delivered by a source driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// Text the driver already decoded.
    Text(String),
    /// Undecoded bytes in the source encoding.
    Bytes(Vec<u8>),
    /// SQL `NULL`.
    Null,
}

impl RawValue {
    /// Decode the value to UTF-8. `NULL` decodes to `None`.
    #[must_use]
    pub fn decode<'a>(&'a self, encoding: &SourceEncoding) -> Option<Cow<'a, str>> {
        match self {
            RawValue::Text(text) => Some(Cow::Borrowed(text.as_str())),
            RawValue::Bytes(bytes) => Some(encoding.decode(bytes)),
            RawValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(value: Vec<u8>) -> Self {
        RawValue::Bytes(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(RawValue::Null, Into::into)
    }
}

impl Serialize for RawValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawValue::Text(text) => serializer.serialize_str(text),
            RawValue::Bytes(bytes) => serializer.serialize_str(&String::from_utf8_lossy(bytes)),
            RawValue::Null => serializer.serialize_none(),
        }
    }
}

/// One record from the external source.
///
/// Column names are lower-cased on insert, so lookups are case-insensitive.
/// Columns keep the order the driver produced them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalRow {
    fields: Vec<(String, RawValue)>,
}

impl ExternalRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a column, replacing any earlier column with the same name.
    pub fn insert(&mut self, column: impl AsRef<str>, value: impl Into<RawValue>) {
        let column = column.as_ref().to_lowercase();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, column: impl AsRef<str>, value: impl Into<RawValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Look up a column by name, ignoring case.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&RawValue> {
        let column = column.to_lowercase();
        self.fields
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    /// Column names in source order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<RawValue>> FromIterator<(K, V)> for ExternalRow {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut row = ExternalRow::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

impl Serialize for ExternalRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_lowercased() {
        let row = ExternalRow::new().with("UserName", "alice").with("ROLE", "editor");
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["username", "role"]);
        assert_eq!(row.get("USERNAME"), Some(&RawValue::from("alice")));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_duplicate_column_replaces() {
        let row = ExternalRow::new().with("role", "a").with("Role", "b");
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("role"), Some(&RawValue::from("b")));
    }

    #[test]
    fn test_decode_values() {
        let latin1 = SourceEncoding::for_label("latin1").unwrap();
        assert_eq!(
            RawValue::Bytes(b"Zo\xeb".to_vec()).decode(&latin1).unwrap(),
            "Zoë"
        );
        assert_eq!(RawValue::from("Zoë").decode(&latin1).unwrap(), "Zoë");
        assert_eq!(RawValue::Null.decode(&latin1), None);
        assert!(RawValue::from(None::<String>).is_null());
    }

    #[test]
    fn test_row_serializes_as_map() {
        let row: ExternalRow = [("User", RawValue::from("alice")), ("role", RawValue::Null)]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"user":"alice","role":null}"#);
    }
}
