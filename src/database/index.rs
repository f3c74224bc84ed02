//! Ordered index over one expression of a table
//!
//! The backing store is an ordered set of `(key bytes, row index)` pairs,
//! so duplicate keys are naturally kept apart by row index and range scans
//! come back in byte-lexicographic key order. Entries reference rows by
//! numeric index only.

use super::table::Table;
use crate::error::{EngineError, Result};
use crate::sql::{Expression, TokenKind};
use crate::types::Cell;
use std::collections::BTreeSet;
use std::ops::Bound;
use tracing::warn;

/// Comparison operators an index can serve.
const SUPPORTED_OPS: &[&str] = &["=", "<>", "!=", "<", "<=", ">", ">="];

pub struct TableIndex {
    pub(crate) name: String,
    pub(crate) expr: Expression,
    pub(crate) unique: bool,
    pub(crate) primary_key: bool,
    tree: BTreeSet<(Vec<u8>, usize)>,
}

impl TableIndex {
    pub(crate) fn new(
        name: impl Into<String>,
        expr: Expression,
        unique: bool,
        primary_key: bool,
    ) -> Self {
        Self {
            name: name.into(),
            expr,
            unique,
            primary_key,
            tree: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add the evaluated key of one row. Null keys violate the implicit
    /// not-null constraint; duplicate keys violate uniqueness when the
    /// index is unique.
    pub(crate) fn insert(&mut self, row_index: usize, value: Cell) -> Result<()> {
        if value.is_null() {
            return Err(EngineError::ViolatesNotNullConstraint(self.name.clone()));
        }
        let bytes = value.into_bytes();
        if self.unique && self.contains_key(&bytes) {
            return Err(EngineError::ViolatesUniqueConstraint(self.name.clone()));
        }
        self.tree.insert((bytes, row_index));
        Ok(())
    }

    /// Remove one row's entry; used to unwind a failed insertion.
    pub(crate) fn remove(&mut self, row_index: usize, value: &Cell) {
        self.tree.remove(&(value.bytes().to_vec(), row_index));
    }

    pub(crate) fn len(&self) -> usize {
        self.tree.len()
    }

    fn contains_key(&self, bytes: &[u8]) -> bool {
        self.tree
            .range(key_range(bytes))
            .next()
            .is_some()
    }

    /// The literal side of a comparison whose other side textually matches
    /// this index's expression; `None` when the conjunct cannot be served.
    /// Identifier keys are rejected since they would need a row to resolve.
    pub(crate) fn applicable_value<'a>(&self, expr: &'a Expression) -> Option<&'a Expression> {
        let Expression::Binary { left, op, right } = expr else {
            return None;
        };
        if op.kind != TokenKind::Symbol || !SUPPORTED_OPS.contains(&op.value.as_str()) {
            return None;
        }

        let code = self.expr.code();
        let (column, value) = if left.code() == code {
            (left, right)
        } else {
            (right, left)
        };
        if column.code() != code {
            return None;
        }

        match value.as_ref() {
            Expression::Literal(token) if token.kind != TokenKind::Identifier => Some(value),
            _ => None,
        }
    }

    /// Row indices matched by an applicable conjunct.
    ///
    /// Equality and the greater-than family ascend from the key; the
    /// less-than family descends from it; not-equal walks the whole tree
    /// skipping entries equal to the key. `None` means the conjunct could
    /// not be served after all and the caller should fall back to a scan.
    pub(crate) fn matching_rows(&self, expr: &Expression) -> Option<Vec<usize>> {
        let value_expr = self.applicable_value(expr)?;
        let Expression::Binary { op, .. } = expr else {
            return None;
        };

        let key = match Table::scratch().evaluate_cell(0, value_expr) {
            Ok(ev) => ev.cell.into_bytes(),
            Err(err) => {
                warn!(%err, "index key evaluation failed");
                return None;
            }
        };

        let rows = match op.value.as_str() {
            "=" => self
                .tree
                .range(key_range(&key))
                .map(|(_, row)| *row)
                .collect(),
            "<>" | "!=" => self
                .tree
                .iter()
                .filter(|(bytes, _)| *bytes != key)
                .map(|(_, row)| *row)
                .collect(),
            "<" => self
                .tree
                .range(..(key.clone(), 0))
                .rev()
                .map(|(_, row)| *row)
                .collect(),
            "<=" => self
                .tree
                .range(..=(key.clone(), usize::MAX))
                .rev()
                .map(|(_, row)| *row)
                .collect(),
            ">" => self
                .tree
                .range((
                    Bound::Excluded((key.clone(), usize::MAX)),
                    Bound::Unbounded,
                ))
                .map(|(_, row)| *row)
                .collect(),
            ">=" => self
                .tree
                .range((key.clone(), 0)..)
                .map(|(_, row)| *row)
                .collect(),
            _ => return None,
        };

        Some(rows)
    }
}

fn key_range(bytes: &[u8]) -> (Bound<(Vec<u8>, usize)>, Bound<(Vec<u8>, usize)>) {
    (
        Bound::Included((bytes.to_vec(), 0)),
        Bound::Included((bytes.to_vec(), usize::MAX)),
    )
}
