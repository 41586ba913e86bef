//! In-memory SQL simulation shared by the PL/SQL and T-SQL front-ends.
//!
//! Provides the table catalog (schemas plus row stores), row-level
//! mutation used by `INSERT`/`UPDATE`/`DELETE`, and the fixed-width
//! text rendering `SELECT` writes to captured stdout. The front-ends
//! evaluate expressions themselves and hand scalar values down; this
//! crate never parses SQL.

mod catalog;
mod render;

pub use catalog::{Catalog, Column, SqlError, SqlValue, Table};
pub use render::{render_table, rows_affected};
