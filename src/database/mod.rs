//! In-memory storage engine
//!
//! The engine owns the catalog (table name to table) and executes parsed
//! statements against it. Each statement commits or rolls back on its own;
//! there are no multi-statement transactions.

pub mod eval;
pub mod index;
pub mod table;

pub use eval::Evaluated;
pub use index::TableIndex;
pub use table::Table;

use crate::error::{EngineError, Result};
use crate::sql::{
    CreateIndexStatement, CreateTableStatement, Expression, InsertStatement, SelectItem,
    SelectStatement, Statement, Token,
};
use crate::types::{Cell, Column, ColumnType, Results, Row};
use std::collections::{BTreeSet, HashMap};

#[derive(Default)]
pub struct EmberDB {
    tables: HashMap<String, Table>,
}

impl EmberDB {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch one parsed statement. SELECT yields a result set; the
    /// mutating statements yield nothing on success.
    pub fn execute(&mut self, statement: &Statement) -> Result<Option<Results>> {
        match statement {
            Statement::Select(stmt) => self.select(stmt).map(Some),
            Statement::Insert(stmt) => self.insert(stmt).map(|_| None),
            Statement::CreateTable(stmt) => self.create_table(stmt).map(|_| None),
            Statement::CreateIndex(stmt) => self.create_index(stmt).map(|_| None),
        }
    }

    /// Create a table, and for a PRIMARY KEY column the implicit unique
    /// `<table>_pkey` index. Any failure removes the half-constructed table.
    pub fn create_table(&mut self, stmt: &CreateTableStatement) -> Result<()> {
        if self.tables.contains_key(&stmt.table) {
            return Err(EngineError::TableAlreadyExists(stmt.table.clone()));
        }

        let mut table = Table::new(stmt.table.clone());
        let mut primary_key = None;

        for column in &stmt.columns {
            let column_type = match column.datatype.as_str() {
                "int" => ColumnType::Int,
                "text" => ColumnType::Text,
                "bool" => ColumnType::Bool,
                other => return Err(EngineError::InvalidDataType(other.to_string())),
            };

            if column.primary_key {
                if primary_key.is_some() {
                    return Err(EngineError::PrimaryKeyAlreadyExists(stmt.table.clone()));
                }
                primary_key = Some(Expression::Literal(Token::identifier(&column.name)));
            }

            table.columns.push(Column {
                name: column.name.clone(),
                column_type,
            });
        }

        self.tables.insert(stmt.table.clone(), table);

        if let Some(expr) = primary_key {
            let pkey = CreateIndexStatement {
                table: stmt.table.clone(),
                name: format!("{}_pkey", stmt.table),
                unique: true,
                primary_key: true,
                expr,
            };
            if let Err(err) = self.create_index(&pkey) {
                self.tables.remove(&stmt.table);
                return Err(err);
            }
        }

        Ok(())
    }

    /// Create an index and backfill it from every existing row. A backfill
    /// violation drops the index before it is ever attached to the table.
    pub fn create_index(&mut self, stmt: &CreateIndexStatement) -> Result<()> {
        let table = self
            .tables
            .get_mut(&stmt.table)
            .ok_or_else(|| EngineError::TableDoesNotExist(stmt.table.clone()))?;

        if table.indexes.iter().any(|index| index.name == stmt.name) {
            return Err(EngineError::IndexAlreadyExists(stmt.name.clone()));
        }

        let mut index = TableIndex::new(
            stmt.name.clone(),
            stmt.expr.clone(),
            stmt.unique,
            stmt.primary_key,
        );
        for row_index in 0..table.rows.len() {
            let evaluated = table.evaluate_cell(row_index, &stmt.expr)?;
            index.insert(row_index, evaluated.cell)?;
        }

        table.indexes.push(index);
        Ok(())
    }

    /// Append one row. Values are evaluated against an empty context, so
    /// only literal forms resolve. A failed index update removes the row
    /// and unwinds the entries already added for it.
    pub fn insert(&mut self, stmt: &InsertStatement) -> Result<()> {
        let table = self
            .tables
            .get_mut(&stmt.table)
            .ok_or_else(|| EngineError::TableDoesNotExist(stmt.table.clone()))?;

        if stmt.values.len() != table.columns.len() {
            return Err(EngineError::MissingValue);
        }

        let scratch = Table::scratch();
        let mut row = Row::with_capacity(stmt.values.len());
        for value in &stmt.values {
            row.push(scratch.evaluate_cell(0, value)?.cell);
        }

        table.rows.push(row);
        let row_index = table.rows.len() - 1;
        if let Err(err) = index_new_row(table, row_index) {
            table.rows.pop();
            return Err(err);
        }

        Ok(())
    }

    /// Execute a SELECT: resolve the table, narrow the candidate rows via
    /// applicable indexes, filter by WHERE, and project the item list.
    /// Column metadata comes from the projection expressions themselves, so
    /// an empty table still reports its schema.
    pub fn select(&self, stmt: &SelectStatement) -> Result<Results> {
        let mut results = Results::default();

        let Some(from) = &stmt.from else {
            return Ok(results);
        };
        let table = self
            .tables
            .get(from)
            .ok_or_else(|| EngineError::TableDoesNotExist(from.clone()))?;

        if stmt.items.is_empty() {
            return Ok(results);
        }

        for item in &stmt.items {
            match item {
                SelectItem::Asterisk => results.columns.extend_from_slice(&table.columns),
                SelectItem::Expr { expr, alias } => {
                    let (name, column_type) = table.evaluate_type(expr)?;
                    results.columns.push(Column {
                        name: alias.clone().unwrap_or(name),
                        column_type,
                    });
                }
            }
        }

        let limit = stmt.limit.as_ref().map(bound_value).transpose()?;
        let offset = stmt
            .offset
            .as_ref()
            .map(bound_value)
            .transpose()?
            .unwrap_or(0);

        // Candidate rows, narrowed by intersecting the subset each
        // applicable (index, conjunct) pair produces, left to right. The
        // final scan runs in ascending row order so output keeps insertion
        // order whether or not indexes were used.
        let mut candidates: Vec<usize> = (0..table.rows.len()).collect();
        for (index, conjunct) in table.applicable_indexes(stmt.where_clause.as_ref()) {
            if let Some(matched) = index.matching_rows(conjunct) {
                let matched: BTreeSet<usize> = matched.into_iter().collect();
                candidates.retain(|row| matched.contains(row));
            }
        }

        let mut skipped = 0usize;
        for &row_index in &candidates {
            if let Some(limit) = limit {
                if results.rows.len() >= limit {
                    break;
                }
            }

            if let Some(where_clause) = &stmt.where_clause {
                let evaluated = table.evaluate_cell(row_index, where_clause)?;
                if !evaluated.cell.as_bool() {
                    continue;
                }
            }

            if skipped < offset {
                skipped += 1;
                continue;
            }

            let mut row = Row::with_capacity(results.columns.len());
            for item in &stmt.items {
                match item {
                    SelectItem::Asterisk => {
                        row.extend(table.rows[row_index].iter().cloned());
                    }
                    SelectItem::Expr { expr, .. } => {
                        row.push(table.evaluate_cell(row_index, expr)?.cell);
                    }
                }
            }
            results.rows.push(row);
        }

        Ok(results)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }
}

/// Add the new row to every index of the table, unwinding the entries
/// already applied if a later index rejects it.
fn index_new_row(table: &mut Table, row_index: usize) -> Result<()> {
    let values: Vec<Cell> = table
        .indexes
        .iter()
        .map(|index| {
            table
                .evaluate_cell(row_index, &index.expr)
                .map(|evaluated| evaluated.cell)
        })
        .collect::<Result<_>>()?;

    for (i, value) in values.iter().enumerate() {
        if let Err(err) = table.indexes[i].insert(row_index, value.clone()) {
            for (j, applied) in values[..i].iter().enumerate() {
                table.indexes[j].remove(row_index, applied);
            }
            return Err(err);
        }
    }

    Ok(())
}

/// Evaluate a LIMIT/OFFSET expression against the empty context; it must
/// come out as an int, and negative values clamp to zero.
fn bound_value(expr: &Expression) -> Result<usize> {
    let evaluated = Table::scratch().evaluate_cell(0, expr)?;
    if evaluated.column_type != ColumnType::Int {
        return Err(EngineError::InvalidCell);
    }
    Ok(evaluated.cell.as_int().max(0) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parse;

    /// Run a batch of statements, returning the last SELECT's results.
    fn run(db: &mut EmberDB, source: &str) -> Result<Option<Results>> {
        let mut last = None;
        for statement in parse(source)? {
            last = db.execute(&statement)?;
        }
        Ok(last)
    }

    fn setup(source: &str) -> EmberDB {
        let mut db = EmberDB::new();
        run(&mut db, source).unwrap();
        db
    }

    fn ints(results: &Results) -> Vec<Vec<i32>> {
        results
            .rows
            .iter()
            .map(|row| row.iter().map(Cell::as_int).collect())
            .collect()
    }

    #[test]
    fn test_create_insert_select() {
        let mut db = setup(
            "CREATE TABLE users (id INT PRIMARY KEY, name TEXT); \
             INSERT INTO users VALUES (1, 'alice');",
        );
        let results = run(&mut db, "SELECT id, name FROM users;").unwrap().unwrap();

        assert_eq!(
            results.columns,
            vec![
                Column {
                    name: "id".into(),
                    column_type: ColumnType::Int
                },
                Column {
                    name: "name".into(),
                    column_type: ColumnType::Text
                },
            ]
        );
        assert_eq!(results.rows.len(), 1);
        assert_eq!(results.rows[0][0].as_int(), 1);
        assert_eq!(results.rows[0][1].as_text(), "alice");
    }

    #[test]
    fn test_primary_key_uniqueness() {
        let mut db = setup(
            "CREATE TABLE users (id INT PRIMARY KEY, name TEXT); \
             INSERT INTO users VALUES (1, 'alice');",
        );
        let err = run(&mut db, "INSERT INTO users VALUES (1, 'bob');").unwrap_err();
        assert!(matches!(err, EngineError::ViolatesUniqueConstraint(_)));

        // The rejected row was rolled back.
        let results = run(&mut db, "SELECT id FROM users;").unwrap().unwrap();
        assert_eq!(ints(&results), vec![vec![1]]);
        assert_eq!(db.table("users").unwrap().indexes[0].len(), 1);
    }

    #[test]
    fn test_projection_arithmetic() {
        let mut db = setup("CREATE TABLE t (a INT, b INT); INSERT INTO t VALUES (2, 3);");
        let results = run(&mut db, "SELECT a + b FROM t;").unwrap().unwrap();
        assert_eq!(results.columns.len(), 1);
        assert_eq!(results.columns[0].name, "a");
        assert_eq!(results.columns[0].column_type, ColumnType::Int);
        assert_eq!(ints(&results), vec![vec![5]]);
    }

    #[test]
    fn test_select_without_from_is_empty() {
        let mut db = EmberDB::new();
        let results = run(&mut db, "SELECT 'hi' || ' there';").unwrap().unwrap();
        assert_eq!(results, Results::default());
    }

    #[test]
    fn test_where_equality() {
        let mut db = setup(
            "CREATE TABLE u (x INT); \
             INSERT INTO u VALUES (10); INSERT INTO u VALUES (20);",
        );
        let results = run(&mut db, "SELECT x FROM u WHERE x = 20;").unwrap().unwrap();
        assert_eq!(ints(&results), vec![vec![20]]);
    }

    #[test]
    fn test_where_conjunction_with_index() {
        let mut db = setup(
            "CREATE TABLE u (x INT PRIMARY KEY); \
             INSERT INTO u VALUES (10); INSERT INTO u VALUES (20);",
        );
        let results = run(&mut db, "SELECT x FROM u WHERE x <> 10 AND x < 100;")
            .unwrap()
            .unwrap();
        assert_eq!(ints(&results), vec![vec![20]]);
    }

    #[test]
    fn test_index_and_scan_agree() {
        let statements = "CREATE TABLE t (x INT, y INT); \
             INSERT INTO t VALUES (1, 10); \
             INSERT INTO t VALUES (2, 20); \
             INSERT INTO t VALUES (3, 30); \
             INSERT INTO t VALUES (2, 40);";
        let queries = [
            "SELECT x, y FROM t WHERE x = 2;",
            "SELECT x, y FROM t WHERE x <> 2;",
            "SELECT x, y FROM t WHERE x < 3;",
            "SELECT x, y FROM t WHERE x <= 2;",
            "SELECT x, y FROM t WHERE x > 1;",
            "SELECT x, y FROM t WHERE x >= 2;",
            "SELECT x, y FROM t WHERE x > 1 AND x < 3;",
        ];

        let mut scan_db = setup(statements);
        let mut indexed_db = setup(statements);
        run(&mut indexed_db, "CREATE INDEX t_x ON t (x);").unwrap();

        for query in queries {
            let scanned = run(&mut scan_db, query).unwrap().unwrap();
            let indexed = run(&mut indexed_db, query).unwrap().unwrap();
            assert_eq!(scanned, indexed, "query {query:?}");
        }
    }

    #[test]
    fn test_select_star_on_empty_table_reports_schema() {
        let mut db = setup("CREATE TABLE t (a INT, b TEXT);");
        let results = run(&mut db, "SELECT * FROM t;").unwrap().unwrap();
        assert!(results.rows.is_empty());
        assert_eq!(results.columns.len(), 2);
        assert_eq!(results.columns[1].name, "b");
        assert_eq!(results.columns[1].column_type, ColumnType::Text);
    }

    #[test]
    fn test_select_star_mixed_with_items() {
        let mut db = setup("CREATE TABLE t (a INT, b INT); INSERT INTO t VALUES (1, 2);");
        let results = run(&mut db, "SELECT *, a FROM t;").unwrap().unwrap();
        assert_eq!(results.columns.len(), 3);
        assert_eq!(ints(&results), vec![vec![1, 2, 1]]);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut db = setup("CREATE TABLE t (x INT);");
        for value in [5, 3, 9, 1] {
            run(&mut db, &format!("INSERT INTO t VALUES ({value});")).unwrap();
        }
        let results = run(&mut db, "SELECT x FROM t;").unwrap().unwrap();
        assert_eq!(ints(&results), vec![vec![5], vec![3], vec![9], vec![1]]);
    }

    #[test]
    fn test_limit_and_offset() {
        let mut db = setup("CREATE TABLE t (x INT);");
        for value in 1..=5 {
            run(&mut db, &format!("INSERT INTO t VALUES ({value});")).unwrap();
        }
        let results = run(&mut db, "SELECT x FROM t LIMIT 2 OFFSET 1;")
            .unwrap()
            .unwrap();
        assert_eq!(ints(&results), vec![vec![2], vec![3]]);

        let results = run(&mut db, "SELECT x FROM t WHERE x > 1 LIMIT 2;")
            .unwrap()
            .unwrap();
        assert_eq!(ints(&results), vec![vec![2], vec![3]]);
    }

    #[test]
    fn test_table_errors() {
        let mut db = setup("CREATE TABLE t (x INT);");
        assert!(matches!(
            run(&mut db, "CREATE TABLE t (y INT);").unwrap_err(),
            EngineError::TableAlreadyExists(_)
        ));
        assert!(matches!(
            run(&mut db, "SELECT x FROM missing;").unwrap_err(),
            EngineError::TableDoesNotExist(_)
        ));
        assert!(matches!(
            run(&mut db, "INSERT INTO missing VALUES (1);").unwrap_err(),
            EngineError::TableDoesNotExist(_)
        ));
    }

    #[test]
    fn test_missing_value() {
        let mut db = setup("CREATE TABLE t (x INT, y INT);");
        assert!(matches!(
            run(&mut db, "INSERT INTO t VALUES (1);").unwrap_err(),
            EngineError::MissingValue
        ));
    }

    #[test]
    fn test_invalid_datatype_rolls_back() {
        let mut db = EmberDB::new();
        let err = run(&mut db, "CREATE TABLE t (a INT, b WHERE);").unwrap_err();
        assert!(matches!(err, EngineError::InvalidDataType(d) if d == "where"));
        assert!(db.table("t").is_none());
    }

    #[test]
    fn test_double_primary_key_rolls_back() {
        let mut db = EmberDB::new();
        let err = run(
            &mut db,
            "CREATE TABLE t (a INT PRIMARY KEY, b INT PRIMARY KEY);",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::PrimaryKeyAlreadyExists(_)));
        assert!(db.table("t").is_none());
    }

    #[test]
    fn test_pkey_index_is_created() {
        let db = setup("CREATE TABLE users (id INT PRIMARY KEY);");
        let table = db.table("users").unwrap();
        assert_eq!(table.indexes.len(), 1);
        assert_eq!(table.indexes[0].name(), "users_pkey");
        assert!(table.indexes[0].unique);
        assert!(table.indexes[0].primary_key);
    }

    #[test]
    fn test_duplicate_index_name() {
        let mut db = setup("CREATE TABLE users (id INT PRIMARY KEY);");
        let err = run(&mut db, "CREATE INDEX users_pkey ON users (id);").unwrap_err();
        assert!(matches!(err, EngineError::IndexAlreadyExists(_)));
    }

    #[test]
    fn test_create_index_backfills_existing_rows() {
        let mut db = setup(
            "CREATE TABLE t (x INT); \
             INSERT INTO t VALUES (10); INSERT INTO t VALUES (20);",
        );
        run(&mut db, "CREATE INDEX t_x ON t (x);").unwrap();
        assert_eq!(db.table("t").unwrap().indexes[0].len(), 2);

        let results = run(&mut db, "SELECT x FROM t WHERE x = 20;").unwrap().unwrap();
        assert_eq!(ints(&results), vec![vec![20]]);
    }

    #[test]
    fn test_backfill_violation_rolls_back_index() {
        let mut db = setup(
            "CREATE TABLE t (x INT); \
             INSERT INTO t VALUES (1); INSERT INTO t VALUES (1);",
        );
        let err = run(&mut db, "CREATE UNIQUE INDEX t_x ON t (x);").unwrap_err();
        assert!(matches!(err, EngineError::ViolatesUniqueConstraint(_)));
        assert!(db.table("t").unwrap().indexes.is_empty());

        // The table keeps working without the failed index.
        run(&mut db, "INSERT INTO t VALUES (2);").unwrap();
    }

    #[test]
    fn test_insert_null_primary_key() {
        let mut db = setup("CREATE TABLE t (x INT PRIMARY KEY);");
        let err = run(&mut db, "INSERT INTO t VALUES (null);").unwrap_err();
        assert!(matches!(err, EngineError::ViolatesNotNullConstraint(_)));
        assert!(db.table("t").unwrap().rows().is_empty());
    }

    #[test]
    fn test_failed_insert_unwinds_earlier_indexes() {
        let mut db = setup(
            "CREATE TABLE t (a INT, b INT); \
             CREATE INDEX t_a ON t (a); \
             CREATE UNIQUE INDEX t_b ON t (b); \
             INSERT INTO t VALUES (1, 100);",
        );
        // Second row passes t_a but violates t_b; both must unwind.
        let err = run(&mut db, "INSERT INTO t VALUES (2, 100);").unwrap_err();
        assert!(matches!(err, EngineError::ViolatesUniqueConstraint(_)));

        let table = db.table("t").unwrap();
        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.indexes[0].len(), 1);
        assert_eq!(table.indexes[1].len(), 1);
    }

    #[test]
    fn test_where_on_text_and_bool_columns() {
        let mut db = setup(
            "CREATE TABLE people (name TEXT, active BOOL); \
             INSERT INTO people VALUES ('alice', true); \
             INSERT INTO people VALUES ('bob', false);",
        );
        let results = run(&mut db, "SELECT name FROM people WHERE active = true;")
            .unwrap()
            .unwrap();
        assert_eq!(results.rows.len(), 1);
        assert_eq!(results.rows[0][0].as_text(), "alice");

        let results = run(&mut db, "SELECT name FROM people WHERE name = 'bob';")
            .unwrap()
            .unwrap();
        assert_eq!(results.rows[0][0].as_text(), "bob");
    }

    #[test]
    fn test_alias_names_result_column() {
        let mut db = setup("CREATE TABLE t (x INT); INSERT INTO t VALUES (1);");
        let results = run(&mut db, "SELECT x AS renamed FROM t;").unwrap().unwrap();
        assert_eq!(results.columns[0].name, "renamed");
    }

    #[test]
    fn test_count_matches_without_where() {
        let mut db = setup("CREATE TABLE t (x INT);");
        for value in 0..7 {
            run(&mut db, &format!("INSERT INTO t VALUES ({value});")).unwrap();
        }
        let results = run(&mut db, "SELECT x FROM t;").unwrap().unwrap();
        assert_eq!(results.rows.len(), db.table("t").unwrap().rows().len());
    }
}
