//! Tables in the JSON table schema format returned by Datafarm.
//!
//! Values are coerced to the column types named in the schema.

use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{
    errors::WatObsErr,
    time::{format_iso_millis, from_epoch_millis, parse_datetime},
};

/// Column types used in Datafarm table schemas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum FieldType {
    /// Text.
    String,
    /// Whole numbers.
    Integer,
    /// Floating point numbers.
    Number,
    /// Milliseconds since the unix epoch on the wire.
    Datetime,
    /// True or false.
    Boolean,
    /// Anything else, kept as sent.
    Any,
}

/// A named, typed column.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Column type.
    pub field_type: FieldType,
}

/// One value in a [`DataTable`].
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Numeric cells as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Cell::Number(v) => Some(v),
            Cell::Integer(v) => Some(v as f64),
            _ => None,
        }
    }

    /// Integer cells.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Cell::Integer(v) => Some(v),
            _ => None,
        }
    }

    /// Text cells.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Date time cells.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match *self {
            Cell::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// True for missing values.
    pub fn is_null(&self) -> bool {
        *self == Cell::Null
    }

    fn coerce(val: Value, field: &Field) -> Result<Self, WatObsErr> {
        let invalid = |val: &Value| {
            WatObsErr::InvalidResponse(format!(
                "column {}: {} is not a valid {}",
                field.name, val, field.field_type
            ))
        };

        let cell = match (field.field_type, val) {
            (_, Value::Null) => Cell::Null,
            (FieldType::Datetime, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .and_then(from_epoch_millis)
                .map(Cell::DateTime)
                .ok_or_else(|| invalid(&Value::Number(n.clone())))?,
            (FieldType::Datetime, Value::String(s)) => Cell::DateTime(parse_datetime(&s)?),
            (FieldType::Number, Value::Number(n)) => n
                .as_f64()
                .map(Cell::Number)
                .ok_or_else(|| invalid(&Value::Number(n.clone())))?,
            (FieldType::Number, Value::String(s)) => match s.trim().parse() {
                Ok(v) => Cell::Number(v),
                Err(_) => return Err(invalid(&Value::String(s))),
            },
            (FieldType::Integer, Value::Number(n)) => match n.as_i64() {
                Some(v) => Cell::Integer(v),
                None => n
                    .as_f64()
                    .map(Cell::Number)
                    .ok_or_else(|| invalid(&Value::Number(n.clone())))?,
            },
            (FieldType::Boolean, Value::Bool(b)) => Cell::Bool(b),
            (FieldType::String, Value::String(s)) => Cell::Text(s),
            (FieldType::String, other) => Cell::Text(other.to_string()),
            (FieldType::Any, Value::Bool(b)) => Cell::Bool(b),
            (FieldType::Any, Value::String(s)) => Cell::Text(s),
            (FieldType::Any, Value::Number(n)) => match n.as_i64() {
                Some(v) => Cell::Integer(v),
                None => Cell::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            (_, other) => return Err(invalid(&other)),
        };

        Ok(cell)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Integer(v) => write!(f, "{}", v),
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::DateTime(dt) => write!(f, "{}", format_iso_millis(dt)),
        }
    }
}

/// A table as returned by the Datafarm API, described by a schema.
///
/// Rows are indexed by the first primary key of the schema. A table without data has no index
/// and keeps every schema column.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct DataTable {
    index_name: Option<String>,
    index: Vec<Cell>,
    fields: Vec<Field>,
    rows: Vec<Vec<Cell>>,
}

#[derive(Deserialize)]
struct RawTable {
    schema: Option<RawSchema>,
    #[serde(default)]
    data: Option<Vec<Vec<Value>>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    fields: Vec<RawField>,
    #[serde(default)]
    primary_key: Vec<String>,
}

#[derive(Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type", default)]
    field_type: Option<String>,
}

/// Build a table from the JSON of a Datafarm response.
pub fn to_data_table(json: &str) -> Result<DataTable, WatObsErr> {
    let val: Value = serde_json::from_str(json)?;
    DataTable::from_value(val)
}

impl DataTable {
    /// Build a table from an already parsed Datafarm response.
    pub fn from_value(val: Value) -> Result<Self, WatObsErr> {
        let raw: RawTable = serde_json::from_value(val)?;
        let schema = raw
            .schema
            .ok_or_else(|| WatObsErr::InvalidResponse("No schema in data".to_owned()))?;

        let fields: Vec<Field> = schema
            .fields
            .into_iter()
            .map(|f| Field {
                field_type: f
                    .field_type
                    .as_deref()
                    .and_then(|t| FieldType::from_str(t).ok())
                    .unwrap_or(FieldType::Any),
                name: f.name,
            })
            .collect();

        let data = match raw.data {
            Some(data) => data,
            None => {
                return Ok(DataTable {
                    fields,
                    ..DataTable::default()
                })
            }
        };

        let index_name = schema.primary_key.into_iter().next();
        let index_pos = match index_name {
            Some(ref name) => Some(fields.iter().position(|f| &f.name == name).ok_or_else(
                || WatObsErr::InvalidResponse(format!("primary key {} is not a field", name)),
            )?),
            None => None,
        };

        let mut index = Vec::with_capacity(data.len());
        let mut rows = Vec::with_capacity(data.len());
        for row in data {
            if row.len() != fields.len() {
                return Err(WatObsErr::InvalidResponse(format!(
                    "row with {} values for {} fields",
                    row.len(),
                    fields.len()
                )));
            }

            let mut cells = Vec::with_capacity(fields.len());
            for (pos, (val, field)) in row.into_iter().zip(&fields).enumerate() {
                let cell = Cell::coerce(val, field)?;
                if Some(pos) == index_pos {
                    index.push(cell);
                } else {
                    cells.push(cell);
                }
            }
            rows.push(cells);
        }

        let fields = fields
            .into_iter()
            .enumerate()
            .filter(|(pos, _)| Some(*pos) != index_pos)
            .map(|(_, f)| f)
            .collect();

        Ok(DataTable {
            index_name,
            index,
            fields,
            rows,
        })
    }

    /// Name of the index column, if any.
    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    /// The index values, one per row.
    pub fn index(&self) -> &[Cell] {
        &self.index
    }

    /// The columns, not counting the index.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Names of the columns, not counting the index.
    pub fn columns(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// The rows, not counting the index.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows and columns.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.fields.len())
    }

    /// All values of a column, which may be the index.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        if self.index_name.as_deref() == Some(name) {
            return Some(self.index.iter().collect());
        }

        let pos = self.fields.iter().position(|f| f.name == name)?;
        Some(self.rows.iter().map(|row| &row[pos]).collect())
    }
}
