//! Core value types shared by the SQL front end and the storage engine

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Declared type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Int,
    Text,
    Bool,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Int => write!(f, "int"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Bool => write!(f, "bool"),
        }
    }
}

/// A column is a name paired with its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

/// One column value in one row: an owned byte sequence with typed views.
///
/// The wire encoding is fixed: ints are exactly four big-endian two's
/// complement bytes, text is raw UTF-8 with no terminator, bool is a single
/// `0x01` byte for true. The empty sequence is null; bool false and null
/// share it and are told apart only by column type. Equality is byte
/// equality, so two nulls compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell(Vec<u8>);

impl Cell {
    pub fn null() -> Self {
        Cell(Vec::new())
    }

    pub fn from_int(value: i32) -> Self {
        Cell(value.to_be_bytes().to_vec())
    }

    pub fn from_text(value: &str) -> Self {
        Cell(value.as_bytes().to_vec())
    }

    pub fn from_bool(value: bool) -> Self {
        if value {
            Cell(vec![1])
        } else {
            Cell(Vec::new())
        }
    }

    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Decode as a signed 32-bit big-endian integer.
    ///
    /// A cell that is not exactly four bytes is corrupt under this view; it
    /// is reported and decodes to zero rather than failing the statement.
    pub fn as_int(&self) -> i32 {
        match <[u8; 4]>::try_from(self.0.as_slice()) {
            Ok(bytes) => i32::from_be_bytes(bytes),
            Err(_) => {
                warn!(len = self.0.len(), "corrupted int cell");
                0
            }
        }
    }

    /// View the raw bytes as UTF-8 text.
    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Any non-empty cell is true; null (and bool false) is false.
    pub fn as_bool(&self) -> bool {
        !self.0.is_empty()
    }
}

/// A row is a fixed-length vector of cells matching the table's columns.
pub type Row = Vec<Cell>;

/// Result set returned by SELECT: ordered column metadata plus rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}
