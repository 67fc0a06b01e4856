//! Query result types.
//!
//! Defines the structures used to represent query results and materializes
//! them from the delimited text the query service writes to object storage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{RelayError, Result};

/// Represents the result of a query job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data.
    pub rows: Vec<Row>,

    /// Number of rows in the result.
    pub row_count: usize,

    /// Wall time from submission to materialization.
    #[serde(with = "duration_serde")]
    pub execution_time: Duration,

    /// Execution identifier of the job that produced this result.
    #[serde(default)]
    pub execution_id: Option<String>,
}

impl QueryResult {
    /// Creates a new empty query result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query result with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            execution_time: Duration::ZERO,
            execution_id: None,
        }
    }

    /// Parses a CSV body with a header row.
    ///
    /// Every cell's type is inferred per column: a column whose non-empty
    /// cells are all integers is `bigint`, all numbers `double`, all
    /// `true`/`false` `boolean`, otherwise `varchar`. Empty cells are NULL.
    pub fn from_csv(body: &[u8]) -> Result<Self> {
        if body.is_empty() {
            return Err(RelayError::parse("Result object is empty"));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(body);

        let headers = reader
            .headers()
            .map_err(|e| RelayError::parse(format!("Invalid header row: {e}")))?
            .clone();
        if headers.is_empty() {
            return Err(RelayError::parse("Result object has no header row"));
        }

        let mut raw_rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| RelayError::parse(e.to_string()))?;
            raw_rows.push(record.iter().map(str::to_string).collect());
        }

        let kinds: Vec<CellKind> = (0..headers.len())
            .map(|i| {
                raw_rows
                    .iter()
                    .map(|row| CellKind::of(&row[i]))
                    .fold(CellKind::Empty, CellKind::widen)
            })
            .collect();

        let columns = headers
            .iter()
            .zip(&kinds)
            .map(|(name, kind)| ColumnInfo::new(name, kind.type_name()))
            .collect();

        let rows = raw_rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&kinds)
                    .map(|(cell, kind)| kind.convert(cell))
                    .collect()
            })
            .collect();

        Ok(Self::with_data(columns, rows))
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Inferred scalar kind of a cell, ordered from most to least specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Empty,
    Bool,
    Int,
    Float,
    Text,
}

impl CellKind {
    fn of(cell: &str) -> Self {
        if cell.is_empty() {
            Self::Empty
        } else if cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false") {
            Self::Bool
        } else if cell.parse::<i64>().is_ok() {
            Self::Int
        } else if cell.parse::<f64>().is_ok() {
            Self::Float
        } else {
            Self::Text
        }
    }

    /// The narrowest kind that holds both.
    fn widen(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Empty, k) | (k, Self::Empty) => k,
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => Self::Float,
            _ => Self::Text,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool => "boolean",
            Self::Int => "bigint",
            Self::Float => "double",
            Self::Empty | Self::Text => "varchar",
        }
    }

    fn convert(&self, cell: String) -> Value {
        if cell.is_empty() {
            return Value::Null;
        }
        match self {
            Self::Bool => Value::Bool(cell.eq_ignore_ascii_case("true")),
            Self::Int => cell.parse().map(Value::Int).unwrap_or(Value::String(cell)),
            Self::Float => match cell.parse() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::String(cell),
            },
            Self::Empty | Self::Text => Value::String(cell),
        }
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Inferred column data type.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// Represents a single value from a query result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Serde support for Duration (not natively supported by serde).
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
