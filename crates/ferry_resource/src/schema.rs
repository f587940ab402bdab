//! Column type inference.
//!
//! `discover` on any resource ends here: the resource is read into
//! [`Records`] and the schema is inferred from the values, so two resources
//! with the same content report equal schemas wherever they are stored.

use crate::records::Records;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inferred type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Every value is null.
    Null,
    /// Booleans.
    Bool,
    /// Integers fitting in 64 bits.
    Int64,
    /// Floating-point numbers.
    Float64,
    /// Text, or a mix that has no narrower common type.
    String,
    /// Nested arrays or objects.
    Json,
}

impl DataType {
    /// Returns the type of a single value.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Int64,
            Value::Number(_) => Self::Float64,
            Value::String(_) => Self::String,
            Value::Array(_) | Value::Object(_) => Self::Json,
        }
    }

    /// Returns the narrowest type holding values of both types.
    #[must_use]
    pub fn unify(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Null, t) | (t, Self::Null) => t,
            (Self::Int64, Self::Float64) | (Self::Float64, Self::Int64) => Self::Float64,
            _ => Self::String,
        }
    }
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Json => "json",
        })
    }
}

/// One column of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Inferred type.
    pub data_type: DataType,
    /// True if any value in the column is null.
    pub nullable: bool,
}

/// Ordered column types of a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Creates a schema from fields.
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Infers the schema of a table.
    #[must_use]
    pub fn infer(records: &Records) -> Self {
        let mut fields: Vec<Field> = records
            .columns()
            .iter()
            .map(|name| Field {
                name: name.clone(),
                data_type: DataType::Null,
                nullable: false,
            })
            .collect();
        for row in records.rows() {
            for (field, value) in fields.iter_mut().zip(row) {
                field.nullable |= value.is_null();
                field.data_type = field.data_type.unify(DataType::of(value));
            }
        }
        Self { fields }
    }

    /// Returns the fields in column order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the field named `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl core::fmt::Display for Schema {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("{")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: ", field.name)?;
            if field.nullable {
                write!(f, "?{}", field.data_type)?;
            } else {
                write!(f, "{}", field.data_type)?;
            }
        }
        f.write_str("}")
    }
}
