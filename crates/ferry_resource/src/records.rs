//! The in-memory table every codec decodes into and encodes from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered column names plus rows of scalar values.
///
/// Rows are always as wide as the column list: short rows are padded with
/// `null`, and objects introducing a new column back-fill earlier rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Records {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Records {
    /// Creates an empty table with the given columns.
    #[must_use]
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Creates a table from columns and rows.
    #[must_use]
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: impl IntoIterator<Item = Vec<Value>>,
    ) -> Self {
        let mut records = Self::new(columns);
        for row in rows {
            records.push_row(row);
        }
        records
    }

    /// Builds a table from JSON objects, columns in first-seen order.
    #[must_use]
    pub fn from_objects<'a>(objects: impl IntoIterator<Item = &'a Map<String, Value>>) -> Self {
        let mut records = Self::default();
        for object in objects {
            records.push_object(object);
        }
        records
    }

    /// Returns the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the values of one column, if it exists.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Appends a row.
    ///
    /// Missing trailing cells become `null`; extra cells get generated
    /// column names (`column_4`, ...).
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        while row.len() > self.columns.len() {
            let name = format!("column_{}", self.columns.len() + 1);
            self.add_column(name);
        }
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Appends a JSON object as a row, adding unseen keys as columns.
    pub fn push_object(&mut self, object: &Map<String, Value>) {
        for key in object.keys() {
            if self.column_index(key).is_none() {
                self.add_column(key.clone());
            }
        }
        let row = self
            .columns
            .iter()
            .map(|column| object.get(column).cloned().unwrap_or(Value::Null))
            .collect();
        self.rows.push(row);
    }

    fn add_column(&mut self, name: String) {
        self.columns.push(name);
        for row in &mut self.rows {
            row.push(Value::Null);
        }
    }

    /// Appends all rows of `other`, matching columns by name.
    pub fn extend(&mut self, other: &Records) {
        if self.columns.is_empty() && self.rows.is_empty() {
            self.columns = other.columns.clone();
        }
        if self.columns == other.columns {
            self.rows.extend(other.rows.iter().cloned());
            return;
        }
        for object in other.to_maps() {
            self.push_object(&object);
        }
    }

    /// Returns each row as a column-name → value map.
    ///
    /// Map equality ignores key order, which makes this the comparison to use
    /// across formats that do not preserve column order.
    #[must_use]
    pub fn to_maps(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn short_rows_are_padded_and_long_rows_add_columns() {
        let mut records = Records::new(["a", "b"]);
        records.push_row(vec![json!(1)]);
        records.push_row(vec![json!(1), json!(2), json!(3)]);
        assert_eq!(records.columns(), ["a", "b", "column_3"]);
        assert_eq!(records.rows()[0], vec![json!(1), Value::Null, Value::Null]);
    }

    #[test]
    fn objects_back_fill_new_columns() {
        let a = object(json!({"name": "Alice"}));
        let b = object(json!({"balance": 200, "name": "Bob"}));
        let records = Records::from_objects([&a, &b]);
        assert_eq!(records.columns(), ["name", "balance"]);
        assert_eq!(records.rows()[0], vec![json!("Alice"), Value::Null]);
        assert_eq!(records.rows()[1], vec![json!("Bob"), json!(200)]);
    }

    #[test]
    fn maps_ignore_key_order() {
        let left = Records::from_rows(["name", "balance"], [vec![json!("Alice"), json!(100)]]);
        let right = Records::from_rows(["balance", "name"], [vec![json!(100), json!("Alice")]]);
        assert_ne!(left, right);
        assert_eq!(left.to_maps(), right.to_maps());
    }

    #[test]
    fn extend_matches_columns_by_name() {
        let mut all = Records::default();
        all.extend(&Records::from_rows(["a", "b"], [vec![json!(1), json!(2)]]));
        all.extend(&Records::from_rows(["b", "a"], [vec![json!(4), json!(3)]]));
        assert_eq!(all.columns(), ["a", "b"]);
        assert_eq!(all.rows()[1], vec![json!(3), json!(4)]);
        assert_eq!(all.column("a").unwrap(), vec![&json!(1), &json!(3)]);
    }
}
