//! Expression evaluation against a row context
//!
//! Evaluating an expression for a given row yields a cell plus the column
//! metadata the result should carry: identifiers resolve to the column's
//! declared name and type, everything else is labeled `?column?`. Binary
//! results take their name from the left operand.

use super::table::Table;
use crate::error::{EngineError, Result};
use crate::sql::{Expression, Token, TokenKind};
use crate::types::{Cell, ColumnType};
use tracing::warn;

/// Value of an expression at one row, with its result column metadata.
#[derive(Debug)]
pub struct Evaluated {
    pub cell: Cell,
    pub name: String,
    pub column_type: ColumnType,
}

const ANONYMOUS_COLUMN: &str = "?column?";

impl Table {
    pub(crate) fn evaluate_cell(&self, row_index: usize, expr: &Expression) -> Result<Evaluated> {
        match expr {
            Expression::Literal(token) => self.evaluate_literal(row_index, token),
            Expression::Binary { left, op, right } => {
                self.evaluate_binary(row_index, left, op, right)
            }
        }
    }

    fn evaluate_literal(&self, row_index: usize, token: &Token) -> Result<Evaluated> {
        match token.kind {
            TokenKind::Identifier => {
                for (i, column) in self.columns.iter().enumerate() {
                    if column.name.eq_ignore_ascii_case(&token.value) {
                        return Ok(Evaluated {
                            cell: self.rows[row_index][i].clone(),
                            name: column.name.clone(),
                            column_type: column.column_type,
                        });
                    }
                }
                Err(EngineError::ColumnDoesNotExist(token.value.clone()))
            }
            TokenKind::Numeric => {
                let cell = match token.value.parse::<i32>() {
                    Ok(value) => Cell::from_int(value),
                    Err(_) => {
                        warn!(value = %token.value, "corrupted numeric literal");
                        Cell::null()
                    }
                };
                Ok(Evaluated {
                    cell,
                    name: ANONYMOUS_COLUMN.to_string(),
                    column_type: ColumnType::Int,
                })
            }
            TokenKind::String => Ok(Evaluated {
                cell: Cell::from_text(&token.value),
                name: ANONYMOUS_COLUMN.to_string(),
                column_type: ColumnType::Text,
            }),
            TokenKind::Boolean => Ok(Evaluated {
                cell: Cell::from_bool(token.value == "true"),
                name: ANONYMOUS_COLUMN.to_string(),
                column_type: ColumnType::Bool,
            }),
            TokenKind::Null => Ok(Evaluated {
                cell: Cell::null(),
                name: ANONYMOUS_COLUMN.to_string(),
                column_type: ColumnType::Int,
            }),
            _ => Err(EngineError::InvalidCell),
        }
    }

    fn evaluate_binary(
        &self,
        row_index: usize,
        left: &Expression,
        op: &Token,
        right: &Expression,
    ) -> Result<Evaluated> {
        let lhs = self.evaluate_cell(row_index, left)?;
        let rhs = self.evaluate_cell(row_index, right)?;
        let name = lhs.name;

        let (cell, column_type) = match (op.kind, op.value.as_str()) {
            (TokenKind::Symbol, "=") => {
                let eq = lhs.column_type == rhs.column_type && lhs.cell == rhs.cell;
                (Cell::from_bool(eq), ColumnType::Bool)
            }
            (TokenKind::Symbol, "<>" | "!=") => {
                let neq = lhs.column_type != rhs.column_type || lhs.cell != rhs.cell;
                (Cell::from_bool(neq), ColumnType::Bool)
            }
            (TokenKind::Symbol, "<" | ">" | "<=" | ">=") => {
                let ord = lhs.cell.bytes().cmp(rhs.cell.bytes());
                let result = match op.value.as_str() {
                    "<" => ord.is_lt(),
                    ">" => ord.is_gt(),
                    "<=" => ord.is_le(),
                    _ => ord.is_ge(),
                };
                (Cell::from_bool(result), ColumnType::Bool)
            }
            (TokenKind::Symbol, "+") => {
                if lhs.column_type != ColumnType::Int || rhs.column_type != ColumnType::Int {
                    return Err(EngineError::InvalidOperands);
                }
                // Saturates at the i32 bounds rather than wrapping.
                let sum = lhs.cell.as_int().saturating_add(rhs.cell.as_int());
                (Cell::from_int(sum), ColumnType::Int)
            }
            (TokenKind::Symbol, "||") => {
                if lhs.column_type != ColumnType::Text || rhs.column_type != ColumnType::Text {
                    return Err(EngineError::InvalidOperands);
                }
                let joined = format!("{}{}", lhs.cell.as_text(), rhs.cell.as_text());
                (Cell::from_text(&joined), ColumnType::Text)
            }
            (TokenKind::Keyword, "and") => {
                if lhs.column_type != ColumnType::Bool || rhs.column_type != ColumnType::Bool {
                    return Err(EngineError::InvalidOperands);
                }
                (
                    Cell::from_bool(lhs.cell.as_bool() && rhs.cell.as_bool()),
                    ColumnType::Bool,
                )
            }
            (TokenKind::Keyword, "or") => {
                if lhs.column_type != ColumnType::Bool || rhs.column_type != ColumnType::Bool {
                    return Err(EngineError::InvalidOperands);
                }
                (
                    Cell::from_bool(lhs.cell.as_bool() || rhs.cell.as_bool()),
                    ColumnType::Bool,
                )
            }
            _ => return Err(EngineError::InvalidCell),
        };

        Ok(Evaluated {
            cell,
            name,
            column_type,
        })
    }

    /// Result column metadata of an expression, derivable without any row.
    /// Mirrors `evaluate_cell` on the type level so an empty table can still
    /// report its projection schema.
    pub(crate) fn evaluate_type(&self, expr: &Expression) -> Result<(String, ColumnType)> {
        match expr {
            Expression::Literal(token) => match token.kind {
                TokenKind::Identifier => self
                    .columns
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(&token.value))
                    .map(|c| (c.name.clone(), c.column_type))
                    .ok_or_else(|| EngineError::ColumnDoesNotExist(token.value.clone())),
                TokenKind::Numeric | TokenKind::Null => {
                    Ok((ANONYMOUS_COLUMN.to_string(), ColumnType::Int))
                }
                TokenKind::String => Ok((ANONYMOUS_COLUMN.to_string(), ColumnType::Text)),
                TokenKind::Boolean => Ok((ANONYMOUS_COLUMN.to_string(), ColumnType::Bool)),
                _ => Err(EngineError::InvalidCell),
            },
            Expression::Binary { left, op, right } => {
                let (name, lt) = self.evaluate_type(left)?;
                let (_, rt) = self.evaluate_type(right)?;
                let column_type = match (op.kind, op.value.as_str()) {
                    (TokenKind::Symbol, "=" | "<>" | "!=" | "<" | ">" | "<=" | ">=") => {
                        ColumnType::Bool
                    }
                    (TokenKind::Symbol, "+") => {
                        if lt != ColumnType::Int || rt != ColumnType::Int {
                            return Err(EngineError::InvalidOperands);
                        }
                        ColumnType::Int
                    }
                    (TokenKind::Symbol, "||") => {
                        if lt != ColumnType::Text || rt != ColumnType::Text {
                            return Err(EngineError::InvalidOperands);
                        }
                        ColumnType::Text
                    }
                    (TokenKind::Keyword, "and" | "or") => {
                        if lt != ColumnType::Bool || rt != ColumnType::Bool {
                            return Err(EngineError::InvalidOperands);
                        }
                        ColumnType::Bool
                    }
                    _ => return Err(EngineError::InvalidCell),
                };
                Ok((name, column_type))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Column;

    fn literal(kind: TokenKind, value: &str) -> Expression {
        Expression::Literal(Token::new(kind, value, Default::default()))
    }

    fn binary(left: Expression, kind: TokenKind, op: &str, right: Expression) -> Expression {
        Expression::Binary {
            left: Box::new(left),
            op: Token::new(kind, op, Default::default()),
            right: Box::new(right),
        }
    }

    fn sample_table() -> Table {
        let mut table = Table::new("users");
        table.columns = vec![
            Column {
                name: "id".into(),
                column_type: ColumnType::Int,
            },
            Column {
                name: "name".into(),
                column_type: ColumnType::Text,
            },
        ];
        table.rows = vec![vec![Cell::from_int(7), Cell::from_text("alice")]];
        table
    }

    #[test]
    fn test_identifier_resolves_case_insensitively() {
        let table = sample_table();
        let ev = table
            .evaluate_cell(0, &literal(TokenKind::Identifier, "NAME"))
            .unwrap();
        assert_eq!(ev.cell.as_text(), "alice");
        assert_eq!(ev.name, "name");
        assert_eq!(ev.column_type, ColumnType::Text);
    }

    #[test]
    fn test_unknown_column() {
        let table = sample_table();
        let err = table
            .evaluate_cell(0, &literal(TokenKind::Identifier, "age"))
            .unwrap_err();
        assert!(matches!(err, EngineError::ColumnDoesNotExist(c) if c == "age"));
    }

    #[test]
    fn test_numeric_literal() {
        let scratch = Table::scratch();
        let ev = scratch
            .evaluate_cell(0, &literal(TokenKind::Numeric, "42"))
            .unwrap();
        assert_eq!(ev.cell.as_int(), 42);
        assert_eq!(ev.name, "?column?");
        assert_eq!(ev.column_type, ColumnType::Int);
    }

    #[test]
    fn test_out_of_range_numeric_yields_null() {
        let scratch = Table::scratch();
        let ev = scratch
            .evaluate_cell(0, &literal(TokenKind::Numeric, "99999999999"))
            .unwrap();
        assert!(ev.cell.is_null());
    }

    #[test]
    fn test_boolean_and_null_literals() {
        let scratch = Table::scratch();
        let t = scratch
            .evaluate_cell(0, &literal(TokenKind::Boolean, "true"))
            .unwrap();
        assert_eq!(t.cell.bytes(), &[1]);
        let f = scratch
            .evaluate_cell(0, &literal(TokenKind::Boolean, "false"))
            .unwrap();
        assert!(f.cell.is_null());
        let n = scratch
            .evaluate_cell(0, &literal(TokenKind::Null, "null"))
            .unwrap();
        assert!(n.cell.is_null());
        assert_eq!(n.column_type, ColumnType::Int);
    }

    #[test]
    fn test_equality_requires_same_type() {
        let scratch = Table::scratch();
        let same = binary(
            literal(TokenKind::Numeric, "1"),
            TokenKind::Symbol,
            "=",
            literal(TokenKind::Numeric, "1"),
        );
        assert!(scratch.evaluate_cell(0, &same).unwrap().cell.as_bool());

        let cross = binary(
            literal(TokenKind::Numeric, "1"),
            TokenKind::Symbol,
            "=",
            literal(TokenKind::String, "1"),
        );
        assert!(!scratch.evaluate_cell(0, &cross).unwrap().cell.as_bool());
    }

    #[test]
    fn test_not_equal_across_types_is_true() {
        let scratch = Table::scratch();
        let expr = binary(
            literal(TokenKind::Numeric, "1"),
            TokenKind::Symbol,
            "<>",
            literal(TokenKind::String, "1"),
        );
        assert!(scratch.evaluate_cell(0, &expr).unwrap().cell.as_bool());
    }

    #[test]
    fn test_addition_and_saturation() {
        let scratch = Table::scratch();
        let sum = binary(
            literal(TokenKind::Numeric, "2"),
            TokenKind::Symbol,
            "+",
            literal(TokenKind::Numeric, "3"),
        );
        assert_eq!(scratch.evaluate_cell(0, &sum).unwrap().cell.as_int(), 5);

        let max = binary(
            literal(TokenKind::Numeric, "2147483647"),
            TokenKind::Symbol,
            "+",
            literal(TokenKind::Numeric, "1"),
        );
        assert_eq!(
            scratch.evaluate_cell(0, &max).unwrap().cell.as_int(),
            i32::MAX
        );
    }

    #[test]
    fn test_addition_rejects_text() {
        let scratch = Table::scratch();
        let expr = binary(
            literal(TokenKind::Numeric, "2"),
            TokenKind::Symbol,
            "+",
            literal(TokenKind::String, "x"),
        );
        assert!(matches!(
            scratch.evaluate_cell(0, &expr),
            Err(EngineError::InvalidOperands)
        ));
    }

    #[test]
    fn test_concat() {
        let scratch = Table::scratch();
        let expr = binary(
            literal(TokenKind::String, "hi"),
            TokenKind::Symbol,
            "||",
            literal(TokenKind::String, " there"),
        );
        let ev = scratch.evaluate_cell(0, &expr).unwrap();
        assert_eq!(ev.cell.as_text(), "hi there");
        assert_eq!(ev.column_type, ColumnType::Text);
    }

    #[test]
    fn test_and_or_require_bools() {
        let scratch = Table::scratch();
        let good = binary(
            literal(TokenKind::Boolean, "true"),
            TokenKind::Keyword,
            "and",
            literal(TokenKind::Boolean, "false"),
        );
        assert!(!scratch.evaluate_cell(0, &good).unwrap().cell.as_bool());

        let bad = binary(
            literal(TokenKind::Boolean, "true"),
            TokenKind::Keyword,
            "or",
            literal(TokenKind::Numeric, "1"),
        );
        assert!(matches!(
            scratch.evaluate_cell(0, &bad),
            Err(EngineError::InvalidOperands)
        ));
    }

    #[test]
    fn test_binary_result_keeps_left_name() {
        let table = sample_table();
        let expr = binary(
            literal(TokenKind::Identifier, "id"),
            TokenKind::Symbol,
            "+",
            literal(TokenKind::Numeric, "1"),
        );
        let ev = table.evaluate_cell(0, &expr).unwrap();
        assert_eq!(ev.name, "id");
        assert_eq!(ev.cell.as_int(), 8);
    }

    #[test]
    fn test_evaluate_type_matches_cell_metadata() {
        let table = sample_table();
        let expr = binary(
            literal(TokenKind::Identifier, "id"),
            TokenKind::Symbol,
            "+",
            literal(TokenKind::Numeric, "1"),
        );
        let (name, ty) = table.evaluate_type(&expr).unwrap();
        assert_eq!(name, "id");
        assert_eq!(ty, ColumnType::Int);

        let (name, ty) = table
            .evaluate_type(&literal(TokenKind::Identifier, "name"))
            .unwrap();
        assert_eq!((name.as_str(), ty), ("name", ColumnType::Text));
    }
}
