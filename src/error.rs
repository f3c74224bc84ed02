//! Error types for the EmberDB engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Every failure the engine can surface to an embedder.
///
/// Lex and parse errors carry the source position they were raised at;
/// execution errors name the object they refer to. Each statement reports
/// the first error it hits and aborts, rolling back its own partial state.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unable to lex token{hint} at {line}:{column}")]
    Lex {
        line: usize,
        column: usize,
        hint: String,
    },

    #[error("[{line}, {column}]: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("table {0} does not exist")]
    TableDoesNotExist(String),

    #[error("table {0} already exists")]
    TableAlreadyExists(String),

    #[error("column {0} does not exist")]
    ColumnDoesNotExist(String),

    #[error("invalid datatype {0}")]
    InvalidDataType(String),

    #[error("missing values")]
    MissingValue,

    #[error("invalid cell")]
    InvalidCell,

    #[error("invalid operands")]
    InvalidOperands,

    #[error("primary key already exists on table {0}")]
    PrimaryKeyAlreadyExists(String),

    #[error("index {0} already exists")]
    IndexAlreadyExists(String),

    #[error("value for index {0} violates not null constraint")]
    ViolatesNotNullConstraint(String),

    #[error("duplicate key value violates unique constraint {0}")]
    ViolatesUniqueConstraint(String),
}
