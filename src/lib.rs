//! EmberDB Storage Engine
//!
//! A small in-memory relational database engine with a SQL-like dialect.
//!
//! ## Architecture
//! - SQL layer: lexer and Pratt parser producing statement trees
//! - Evaluation: expressions interpreted against a row context
//! - Storage layer: table catalog, typed rows, ordered indexes
//!
//! The engine is single-threaded by design: the caller owns an [`EmberDB`]
//! and drives it one statement at a time. Rows are append-only and indexes
//! insert-only, so memory is released deterministically when the catalog is
//! dropped.

pub mod database;
pub mod sql;
pub mod types;

mod error;

pub use database::{EmberDB, Table, TableIndex};
pub use error::{EngineError, Result};
pub use sql::{parse, Statement};
pub use types::{Cell, Column, ColumnType, Results, Row};
