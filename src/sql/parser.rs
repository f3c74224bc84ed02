//! SQL parser - converts a token stream into statements
//!
//! Statement parsers are alternatives: each either consumes its statement,
//! reports that its leading keyword is absent (restoring the cursor so the
//! next alternative can try), or fails the whole parse with a positioned
//! diagnostic once the leading keyword has committed it.

use super::ast::*;
use super::token::{Token, TokenKind};
use crate::error::{EngineError, Result};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse the full token list. Statements are separated by one or more
    /// semicolons; a trailing semicolon is permitted.
    pub fn parse_statements(&mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();

        while self.position < self.tokens.len() {
            statements.push(self.parse_statement()?);

            let mut semicolons = 0;
            while self.match_symbol(";") {
                semicolons += 1;
            }
            if semicolons == 0 && self.position < self.tokens.len() {
                return Err(self.error("expected semicolon delimiter between statements"));
            }
        }

        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        if let Some(stmt) = self.parse_select()? {
            return Ok(Statement::Select(stmt));
        }
        if let Some(stmt) = self.parse_insert()? {
            return Ok(Statement::Insert(stmt));
        }
        if let Some(stmt) = self.parse_create_table()? {
            return Ok(Statement::CreateTable(stmt));
        }
        if let Some(stmt) = self.parse_create_index()? {
            return Ok(Statement::CreateIndex(stmt));
        }
        Err(self.error("expected statement"))
    }

    /// SELECT select-item (, select-item)* [FROM id] [WHERE e] [LIMIT e] [OFFSET e]
    fn parse_select(&mut self) -> Result<Option<SelectStatement>> {
        if !self.match_keyword("select") {
            return Ok(None);
        }

        let mut items = Vec::new();
        loop {
            if self.match_symbol("*") {
                items.push(SelectItem::Asterisk);
            } else {
                let expr = self.parse_expression(0)?;
                let alias = if self.match_keyword("as") {
                    Some(self.parse_identifier()?)
                } else {
                    None
                };
                items.push(SelectItem::Expr { expr, alias });
            }
            if !self.match_symbol(",") {
                break;
            }
        }

        let from = if self.match_keyword("from") {
            Some(self.parse_identifier()?)
        } else {
            None
        };

        let where_clause = if self.match_keyword("where") {
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        let limit = if self.match_keyword("limit") {
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        let offset = if self.match_keyword("offset") {
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        Ok(Some(SelectStatement {
            items,
            from,
            where_clause,
            limit,
            offset,
        }))
    }

    /// INSERT INTO id VALUES ( expression (, expression)* )
    fn parse_insert(&mut self) -> Result<Option<InsertStatement>> {
        if !self.match_keyword("insert") {
            return Ok(None);
        }

        self.expect_keyword("into")?;
        let table = self.parse_identifier()?;
        self.expect_keyword("values")?;
        self.expect_symbol("(")?;

        let mut values = Vec::new();
        loop {
            values.push(self.parse_expression(0)?);
            if !self.match_symbol(",") {
                break;
            }
        }

        self.expect_symbol(")")?;
        Ok(Some(InsertStatement { table, values }))
    }

    /// CREATE TABLE id ( column-def (, column-def)* )
    fn parse_create_table(&mut self) -> Result<Option<CreateTableStatement>> {
        let start = self.position;
        if !self.match_keyword("create") {
            return Ok(None);
        }
        if !self.match_keyword("table") {
            // Could still be CREATE [UNIQUE] INDEX.
            self.position = start;
            return Ok(None);
        }

        let table = self.parse_identifier()?;
        self.expect_symbol("(")?;
        let columns = self.parse_column_definitions()?;
        self.expect_symbol(")")?;

        Ok(Some(CreateTableStatement { table, columns }))
    }

    fn parse_column_definitions(&mut self) -> Result<Vec<ColumnDefinition>> {
        let mut columns = Vec::new();

        loop {
            match self.current() {
                Some(t) if t.matches(TokenKind::Symbol, ")") => break,
                None => return Err(self.error("expected closing paren after column definitions")),
                _ => {}
            }

            if !columns.is_empty() {
                self.expect_symbol(",")?;
            }

            let name = self.parse_identifier()?;
            let datatype = match self.current() {
                Some(t) if t.kind == TokenKind::Keyword => {
                    let value = t.value.clone();
                    self.advance();
                    value
                }
                _ => return Err(self.error("expected column datatype")),
            };

            let primary_key = if self.match_keyword("primary") {
                self.expect_keyword("key")?;
                true
            } else {
                false
            };

            columns.push(ColumnDefinition {
                name,
                datatype,
                primary_key,
            });
        }

        Ok(columns)
    }

    /// CREATE [UNIQUE] INDEX id ON id ( expression )
    fn parse_create_index(&mut self) -> Result<Option<CreateIndexStatement>> {
        let start = self.position;
        if !self.match_keyword("create") {
            return Ok(None);
        }
        let unique = self.match_keyword("unique");
        if !self.match_keyword("index") {
            self.position = start;
            return Ok(None);
        }

        let name = self.parse_identifier()?;
        self.expect_keyword("on")?;
        let table = self.parse_identifier()?;
        self.expect_symbol("(")?;
        let expr = self.parse_expression(0)?;
        self.expect_symbol(")")?;

        Ok(Some(CreateIndexStatement {
            table,
            name,
            unique,
            primary_key: false,
            expr,
        }))
    }

    /// Pratt expression parsing. Parses a primary, then keeps consuming
    /// binary operators whose binding power is at least `min_bp`, recursing
    /// with one more than the operator's power for left associativity.
    /// Any non-operator token (comma, FROM, `)`, ...) terminates the
    /// expression without being consumed.
    fn parse_expression(&mut self, min_bp: u8) -> Result<Expression> {
        let mut expr = if self.match_symbol("(") {
            let inner = self.parse_expression(0)?;
            self.expect_symbol(")")?;
            inner
        } else {
            self.parse_literal()?
        };

        while let Some(token) = self.current() {
            let bp = token.binding_power();
            if bp == 0 || bp < min_bp {
                break;
            }
            let op = token.clone();
            self.advance();

            let right = self.parse_expression(bp + 1)?;
            expr = Expression::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn parse_literal(&mut self) -> Result<Expression> {
        match self.current() {
            Some(t)
                if matches!(
                    t.kind,
                    TokenKind::Identifier
                        | TokenKind::Numeric
                        | TokenKind::String
                        | TokenKind::Boolean
                        | TokenKind::Null
                ) =>
            {
                let token = t.clone();
                self.advance();
                Ok(Expression::Literal(token))
            }
            _ => Err(self.error("expected expression")),
        }
    }

    // Cursor helpers

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn match_token(&mut self, kind: TokenKind, value: &str) -> bool {
        if let Some(t) = self.current() {
            if t.matches(kind, value) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn match_keyword(&mut self, value: &str) -> bool {
        self.match_token(TokenKind::Keyword, value)
    }

    fn match_symbol(&mut self, value: &str) -> bool {
        self.match_token(TokenKind::Symbol, value)
    }

    fn expect_keyword(&mut self, value: &str) -> Result<()> {
        if self.match_keyword(value) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", value.to_uppercase())))
        }
    }

    fn expect_symbol(&mut self, value: &str) -> Result<()> {
        if self.match_symbol(value) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{value}'")))
        }
    }

    fn parse_identifier(&mut self) -> Result<String> {
        match self.current() {
            Some(t) if t.kind == TokenKind::Identifier => {
                let value = t.value.clone();
                self.advance();
                Ok(value)
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    fn error(&self, message: &str) -> EngineError {
        match self.current().or_else(|| self.tokens.last()) {
            Some(t) => EngineError::Parse {
                line: t.loc.line,
                column: t.loc.column,
                message: format!("{message}, near: {}", t.value),
            },
            None => EngineError::Parse {
                line: 1,
                column: 1,
                message: format!("{message}, near: end of input"),
            },
        }
    }
}
