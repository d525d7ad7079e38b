//! Dense rectangular table extracted from a worksheet.

use crate::error::SheetwashError;
use crate::workbook::Value;
use crate::workbook::Worksheet;

/// A rectangular grid of values with contiguous 0-based row indexes.
/// Every row has the same number of columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Table {
        Table { rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }
}

/// Materializes a worksheet into a dense table.
///
/// With `drop_empty` set, fully-null rows and fully-null columns are removed
/// and the remaining indexes are contiguous from 0. The inference pipeline
/// assumes this has happened: it never sees a fully-null column.
///
/// Fails with `EmptyTableError` when nothing remains.
pub fn load_table(sheet: &Worksheet, drop_empty: bool) -> Result<Table, SheetwashError> {
    let height = sheet.rows();
    let width = sheet.cols();

    let kept_rows: Vec<usize> = (0..height)
        .filter(|row| {
            !drop_empty || (0..width).any(|col| !sheet.get(*row, col).is_null())
        })
        .collect();
    let kept_cols: Vec<usize> = (0..width)
        .filter(|col| {
            !drop_empty || kept_rows.iter().any(|row| !sheet.get(*row, *col).is_null())
        })
        .collect();

    if kept_rows.is_empty() || kept_cols.is_empty() {
        return Err(SheetwashError::EmptyTableError(sheet.name.clone()));
    }

    let rows = kept_rows
        .iter()
        .map(|row| {
            kept_cols
                .iter()
                .map(|col| sheet.get(*row, *col).clone())
                .collect()
        })
        .collect();
    Ok(Table { rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Value {
        Value::Text(value.to_owned())
    }

    #[test]
    fn load_table_drops_blank_rows_and_columns() {
        let mut sheet = Worksheet::new("sparse");
        // Row 0 and column 0 stay fully null
        sheet.set(1, 1, text("Name"));
        sheet.set(1, 3, text("Age"));
        sheet.set(3, 1, text("wilson"));
        sheet.set(3, 3, Value::Int(30));

        let table = load_table(&sheet, true).unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.width(), 2);
        assert_eq!(table.rows[0], vec![text("Name"), text("Age")]);
        assert_eq!(table.rows[1], vec![text("wilson"), Value::Int(30)]);
    }

    #[test]
    fn load_table_keeps_gaps_inside_kept_rows() {
        let mut sheet = Worksheet::new("gappy");
        sheet.set(0, 0, text("a"));
        sheet.set(0, 2, text("b"));
        sheet.set(1, 0, Value::Int(1));
        // (1, 2) left null: the column is not fully null, so the gap survives
        let table = load_table(&sheet, true).unwrap();
        assert_eq!(table.rows[1], vec![Value::Int(1), Value::Null]);
    }

    #[test]
    fn load_table_without_dropping_keeps_everything() {
        let mut sheet = Worksheet::new("padded");
        sheet.set(1, 1, Value::Int(7));
        let table = load_table(&sheet, false).unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.width(), 2);
        assert!(table.rows[0][0].is_null());
    }

    #[test]
    fn load_table_fails_on_all_null_sheet() {
        let mut sheet = Worksheet::new("blank");
        sheet.set(2, 2, Value::Null);
        assert!(matches!(
            load_table(&sheet, true),
            Err(SheetwashError::EmptyTableError(_))
        ));
    }

    #[test]
    fn load_table_fails_on_zero_size_sheet() {
        let sheet = Worksheet::new("empty");
        assert!(matches!(
            load_table(&sheet, false),
            Err(SheetwashError::EmptyTableError(_))
        ));
    }
}
