//! Fixed-width text rendering for SELECT results.
//!
//! The grid is the classic command-line shape: header, dashed rule,
//! one line per row, then an `(n rows affected)` trailer. Column width
//! is the widest of the header and every cell; columns are joined with
//! `" | "` and the last column is not right-padded.

use crate::catalog::SqlValue;

/// Render a projected result set as output lines.
///
/// `headers` are the projected column spellings; `rows` are cell
/// values in the same column order.
pub fn render_table(headers: &[String], rows: &[Vec<SqlValue>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
    let rendered: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(SqlValue::render).collect())
        .collect();
    for row in &rendered {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 3);
    lines.push(join_row(headers, &widths));
    let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    lines.push(join_row(&dashes, &widths));
    for row in &rendered {
        lines.push(join_row(row, &widths));
    }
    lines.push(rows_affected(rows.len()));
    lines
}

/// The `(n rows affected)` trailer, with the singular spelled out.
pub fn rows_affected(n: usize) -> String {
    if n == 1 {
        "(1 row affected)".to_string()
    } else {
        format!("({n} rows affected)")
    }
}

fn join_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            line.push_str(" | ");
        }
        if i + 1 < cells.len() {
            let width = widths.get(i).copied().unwrap_or(cell.len());
            line.push_str(&format!("{cell:<width$}"));
        } else {
            line.push_str(cell);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_row() {
        let headers = vec!["id".to_string(), "nm".to_string()];
        let rows = vec![vec![SqlValue::Int(2), SqlValue::Str("b".into())]];
        let lines = render_table(&headers, &rows);
        assert_eq!(
            lines,
            vec![
                "id | nm".to_string(),
                "-- | --".to_string(),
                "2  | b".to_string(),
                "(1 row affected)".to_string(),
            ]
        );
    }

    #[test]
    fn test_render_widens_to_cell() {
        let headers = vec!["n".to_string()];
        let rows = vec![vec![SqlValue::Int(1000)], vec![SqlValue::Int(7)]];
        let lines = render_table(&headers, &rows);
        // Single column: no padding on last column.
        assert_eq!(lines[0], "n");
        assert_eq!(lines[2], "1000");
        assert_eq!(lines[3], "7");
        assert_eq!(lines[4], "(2 rows affected)");
    }

    #[test]
    fn test_render_empty_result() {
        let headers = vec!["id".to_string()];
        let lines = render_table(&headers, &[]);
        assert_eq!(lines.last().unwrap(), "(0 rows affected)");
    }

    #[test]
    fn test_null_cells() {
        let headers = vec!["a".to_string(), "b".to_string()];
        let rows = vec![vec![SqlValue::Null, SqlValue::Bool(true)]];
        let lines = render_table(&headers, &rows);
        assert_eq!(lines[2], "NULL | 1");
    }
}
