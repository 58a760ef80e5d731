//! In-memory tabular dataset exchanged with the UI collaborator.
//!
//! Rows carry no identity beyond their values. A column missing from a row
//! reads as [`Value::Null`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A nullable scalar cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

/// Equality key for joining rows. Integral floats compare equal to the
/// matching integer, since DECIMAL columns come back as floats.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum MatchKey {
    Null,
    Int(i64),
    Float(u64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn match_key(&self) -> MatchKey {
        match self {
            Value::Null => MatchKey::Null,
            Value::Int(i) => MatchKey::Int(*i),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                MatchKey::Int(*f as i64)
            }
            // -0.0 and 0.0 are caught by the integral arm above
            Value::Float(f) => MatchKey::Float(f.to_bits()),
            Value::Text(s) => MatchKey::Text(s.clone()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

pub type Row = BTreeMap<String, Value>;

/// Build a [`Row`] from `(column, value)` pairs.
pub fn row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Row
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

static NULL: Value = Value::Null;

/// Ordered named columns plus an unordered sequence of rows.
///
/// Every key a row carries is also a declared column; deserializing adds
/// any column a row names but `columns` left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDataset")]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

#[derive(Deserialize)]
struct RawDataset {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Row>,
}

impl From<RawDataset> for Dataset {
    fn from(raw: RawDataset) -> Self {
        Dataset::with_rows(raw.columns, raw.rows)
    }
}

impl Dataset {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a dataset from rows, adding any column a row names that is not
    /// already declared.
    pub fn with_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: impl IntoIterator<Item = Row>,
    ) -> Self {
        let mut dataset = Self::new(columns);
        for r in rows {
            dataset.push_row(r);
        }
        dataset
    }

    /// Declared columns in display order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in no meaningful order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn add_column(&mut self, column: impl Into<String>) {
        let column = column.into();
        if !self.has_column(&column) {
            self.columns.push(column);
        }
    }

    /// Append a row, declaring any column it names that is not yet known.
    pub fn push_row(&mut self, row: Row) {
        for key in row.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    /// Cell at `index`/`column`; absent cells read as null.
    pub fn value(&self, index: usize, column: &str) -> &Value {
        self.rows
            .get(index)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }

    pub fn set_value(&mut self, index: usize, column: &str, value: Value) {
        self.add_column(column);
        if let Some(r) = self.rows.get_mut(index) {
            r.insert(column.to_string(), value);
        }
    }

    pub fn column_values(&self, column: &str) -> Vec<&Value> {
        self.rows
            .iter()
            .map(|r| r.get(column).unwrap_or(&NULL))
            .collect()
    }

    pub fn drop_column(&mut self, column: &str) {
        self.columns.retain(|c| c != column);
        for r in &mut self.rows {
            r.remove(column);
        }
    }

    /// Concatenate `other`'s rows; the column list becomes the union.
    pub fn append(&mut self, other: Dataset) {
        for column in other.columns {
            self.add_column(column);
        }
        self.rows.extend(other.rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_cell_reads_null() {
        let ds = Dataset::with_rows(["id", "name"], [row([("name", "A")])]);
        assert_eq!(ds.value(0, "id"), &Value::Null);
        assert_eq!(ds.value(0, "name"), &Value::from("A"));
        assert_eq!(ds.value(7, "name"), &Value::Null);
    }

    #[test]
    fn test_integral_float_matches_int() {
        assert_eq!(Value::Float(5.0).match_key(), Value::Int(5).match_key());
        assert_ne!(Value::Float(5.5).match_key(), Value::Int(5).match_key());
        assert_ne!(Value::Null.match_key(), Value::Int(0).match_key());
        assert_ne!(Value::from("5").match_key(), Value::Int(5).match_key());
    }

    #[test]
    fn test_append_unions_columns() {
        let mut left = Dataset::with_rows(["id"], [row([("id", 1)])]);
        let right = Dataset::with_rows(["id", "brand"], [row([("brand", "Acme")])]);
        left.append(right);
        assert_eq!(left.columns(), &["id".to_string(), "brand".to_string()]);
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn test_json_shape() {
        let ds = Dataset::with_rows(
            ["id", "name", "price"],
            [row([
                ("id", Value::Int(1)),
                ("name", Value::from("A")),
                ("price", Value::Float(2.5)),
            ])],
        );
        let json = serde_json::to_value(&ds).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "columns": ["id", "name", "price"],
                "rows": [{"id": 1, "name": "A", "price": 2.5}]
            })
        );
        let back: Dataset = serde_json::from_value(json).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn test_deserialize_declares_row_keys() {
        let ds: Dataset = serde_json::from_value(serde_json::json!({
            "columns": ["id"],
            "rows": [{"id": 1, "stock": 4}]
        }))
        .unwrap();
        assert_eq!(ds.columns(), &["id", "stock"]);
        assert_eq!(ds.value(0, "stock"), &Value::Int(4));
    }
}
