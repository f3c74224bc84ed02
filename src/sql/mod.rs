//! SQL front end
//!
//! - Lexer: tokenizes source text
//! - Parser: builds statements from tokens
//!
//! Evaluation and execution live in the `database` module.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{
    ColumnDefinition, CreateIndexStatement, CreateTableStatement, Expression, InsertStatement,
    SelectItem, SelectStatement, Statement,
};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Location, Token, TokenKind};

use crate::error::Result;

/// Parse a source string into a list of statements.
pub fn parse(source: &str) -> Result<Vec<Statement>> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_statements()
}
