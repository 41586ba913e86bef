//! The table catalog: schemas and row stores.
//!
//! Table and column names are matched case-insensitively (both SQL
//! dialects fold identifiers), but schemas remember the declared
//! spelling for rendering. A row is a column-name → value map whose
//! key set is always a subset of its table's column set.

use std::collections::HashMap;

use miette::Diagnostic;
use thiserror::Error;

/// Errors during catalog operations.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum SqlError {
    /// Referenced table was never created.
    #[error("table '{table}' does not exist")]
    UnknownTable { table: String },
    /// Referenced column is not in the table's schema.
    #[error("column '{column}' does not exist in table '{table}'")]
    UnknownColumn { table: String, column: String },
    /// INSERT row arity does not match the target column list.
    #[error("insert into '{table}' supplies {got} value(s) for {expected} column(s)")]
    InsertArity {
        table: String,
        expected: usize,
        got: usize,
    },
}

/// A scalar cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl SqlValue {
    /// Render the cell the way the result grid prints it.
    pub fn render(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Int(n) => n.to_string(),
            SqlValue::Float(x) => x.to_string(),
            SqlValue::Str(s) => s.clone(),
            SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        }
    }
}

/// One declared column.
#[derive(Debug, Clone)]
pub struct Column {
    /// Declared spelling.
    pub name: String,
    /// The type text as written, e.g. `INT`, `VARCHAR(10)`, `NUMBER`.
    pub declared_type: String,
    /// Constraint lexemes as written (`NOT NULL`, `PRIMARY KEY`, ...).
    pub constraints: Vec<String>,
}

/// A table: ordered schema plus ordered row store.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Rows in insertion order; keys are declared column spellings.
    pub rows: Vec<HashMap<String, SqlValue>>,
}

impl Table {
    /// Find a column by case-insensitive name, returning its declared
    /// spelling.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Declared column names in schema order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Read a cell, treating missing keys as NULL.
    pub fn cell<'a>(row: &'a HashMap<String, SqlValue>, column: &Column) -> &'a SqlValue {
        row.get(&column.name).unwrap_or(&SqlValue::Null)
    }
}

/// The in-memory database for one interpreter run.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Tables in creation order.
    tables: Vec<Table>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema. Returns `false` (and leaves the existing
    /// table untouched) if a table of that name already exists — the
    /// front-ends report that as a warning, not an error.
    pub fn create_table(&mut self, name: &str, columns: Vec<Column>) -> bool {
        if self.table(name).is_some() {
            return false;
        }
        self.tables.push(Table {
            name: name.to_string(),
            columns,
            rows: Vec::new(),
        });
        true
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables
            .iter_mut()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Append one row given values for `columns` (declared spellings
    /// are resolved here). `columns = None` means the full declared
    /// column order.
    pub fn insert_row(
        &mut self,
        table_name: &str,
        columns: Option<&[String]>,
        values: Vec<SqlValue>,
    ) -> Result<(), SqlError> {
        let table = self
            .table(table_name)
            .ok_or_else(|| SqlError::UnknownTable {
                table: table_name.to_string(),
            })?;

        let target_names: Vec<String> = match columns {
            Some(cols) => {
                let mut resolved = Vec::with_capacity(cols.len());
                for col in cols {
                    let column = table.column(col).ok_or_else(|| SqlError::UnknownColumn {
                        table: table_name.to_string(),
                        column: col.clone(),
                    })?;
                    resolved.push(column.name.clone());
                }
                resolved
            }
            None => table.column_names(),
        };

        if target_names.len() != values.len() {
            return Err(SqlError::InsertArity {
                table: table_name.to_string(),
                expected: target_names.len(),
                got: values.len(),
            });
        }

        let row: HashMap<String, SqlValue> =
            target_names.into_iter().zip(values).collect();
        self.table_mut(table_name)
            .expect("table existed above")
            .rows
            .push(row);
        Ok(())
    }

    /// Number of tables registered.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_columns() -> Vec<Column> {
        vec![
            Column {
                name: "id".into(),
                declared_type: "INT".into(),
                constraints: vec![],
            },
            Column {
                name: "nm".into(),
                declared_type: "VARCHAR(10)".into(),
                constraints: vec![],
            },
        ]
    }

    #[test]
    fn test_create_and_lookup_case_insensitive() {
        let mut cat = Catalog::new();
        assert!(cat.create_table("p", two_columns()));
        assert!(cat.table("P").is_some());
        assert!(cat.table("q").is_none());
    }

    #[test]
    fn test_duplicate_create_is_noop() {
        let mut cat = Catalog::new();
        assert!(cat.create_table("p", two_columns()));
        assert!(!cat.create_table("P", vec![]));
        assert_eq!(cat.table("p").unwrap().columns.len(), 2);
    }

    #[test]
    fn test_insert_default_column_order() {
        let mut cat = Catalog::new();
        cat.create_table("p", two_columns());
        cat.insert_row("p", None, vec![SqlValue::Int(1), SqlValue::Str("a".into())])
            .unwrap();
        let table = cat.table("p").unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0]["id"], SqlValue::Int(1));
        assert_eq!(table.rows[0]["nm"], SqlValue::Str("a".into()));
    }

    #[test]
    fn test_insert_named_columns_resolve_spelling() {
        let mut cat = Catalog::new();
        cat.create_table("p", two_columns());
        cat.insert_row("p", Some(&["NM".to_string()]), vec![SqlValue::Str("b".into())])
            .unwrap();
        let row = &cat.table("p").unwrap().rows[0];
        // Key stored under the declared spelling, and id is absent (NULL).
        assert_eq!(row["nm"], SqlValue::Str("b".into()));
        assert!(!row.contains_key("id"));
    }

    #[test]
    fn test_insert_arity_mismatch() {
        let mut cat = Catalog::new();
        cat.create_table("p", two_columns());
        let err = cat
            .insert_row("p", None, vec![SqlValue::Int(1)])
            .unwrap_err();
        assert!(matches!(err, SqlError::InsertArity { expected: 2, got: 1, .. }));
    }

    #[test]
    fn test_insert_unknown_column() {
        let mut cat = Catalog::new();
        cat.create_table("p", two_columns());
        let err = cat
            .insert_row("p", Some(&["bogus".to_string()]), vec![SqlValue::Null])
            .unwrap_err();
        assert!(matches!(err, SqlError::UnknownColumn { .. }));
    }

    #[test]
    fn test_insert_unknown_table() {
        let mut cat = Catalog::new();
        let err = cat.insert_row("ghost", None, vec![]).unwrap_err();
        assert!(matches!(err, SqlError::UnknownTable { .. }));
    }
}
