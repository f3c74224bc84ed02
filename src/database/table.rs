//! In-memory table storage
//!
//! A table owns its columns, rows, and indexes. Rows are append-only fixed
//! length cell vectors; indexes refer to rows by numeric index, never by
//! pointer, so the row vector can be compacted or relocated freely.

use super::index::TableIndex;
use crate::sql::Expression;
use crate::types::{Column, Row};

pub struct Table {
    pub(crate) name: String,
    pub(crate) columns: Vec<Column>,
    pub(crate) rows: Vec<Row>,
    pub(crate) indexes: Vec<TableIndex>,
}

impl Table {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// A row-less table used as the empty evaluation context for literal
    /// expressions (INSERT values, index keys, LIMIT/OFFSET bounds).
    pub(crate) fn scratch() -> Self {
        Table::new("")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Pair every WHERE conjunct with every index that can serve it.
    ///
    /// The predicate is linearized by flattening AND nodes into a conjunct
    /// list; an OR anywhere stops the flattening of that subtree, since its
    /// branches do not independently narrow the row set.
    pub(crate) fn applicable_indexes<'a>(
        &'a self,
        where_clause: Option<&'a Expression>,
    ) -> Vec<(&'a TableIndex, &'a Expression)> {
        let mut conjuncts = Vec::new();
        if let Some(expr) = where_clause {
            linearize(expr, &mut conjuncts);
        }

        let mut pairs = Vec::new();
        for conjunct in conjuncts {
            for index in &self.indexes {
                if index.applicable_value(conjunct).is_some() {
                    pairs.push((index, conjunct));
                }
            }
        }
        pairs
    }
}

fn linearize<'a>(expr: &'a Expression, out: &mut Vec<&'a Expression>) {
    use crate::sql::TokenKind;

    let Expression::Binary { left, op, right } = expr else {
        return;
    };
    if op.matches(TokenKind::Keyword, "or") {
        return;
    }
    if op.matches(TokenKind::Keyword, "and") {
        linearize(left, out);
        linearize(right, out);
        return;
    }
    out.push(expr);
}
