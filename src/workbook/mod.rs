//! In-memory structured workbook model.
//!
//! A `Workbook` is an ordered collection of named `Worksheet`s; a worksheet is
//! a dense 0-based grid of `Value`s plus the merged regions declared by the
//! source file. Both format readers produce this model, and the inference
//! pipeline consumes it.

pub mod value;

pub use value::Value;

/// A rectangular merged-cell span, 0-based inclusive on both axes.
/// Regions are assumed non-overlapping.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MergedRegion {
    pub row_lo: usize,
    pub row_hi: usize,
    pub col_lo: usize,
    pub col_hi: usize,
}

/// An ordered collection of named worksheets.
#[derive(Debug, Default)]
pub struct Workbook {
    pub sheets: Vec<Worksheet>,
}

impl Workbook {
    /// Looks a worksheet up by name.
    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }
}

/// A 2-D grid of cell values addressed by (row, column), plus merged regions.
#[derive(Debug, Default)]
pub struct Worksheet {
    pub name: String,
    pub merges: Vec<MergedRegion>,
    grid: Vec<Vec<Value>>,
    cols: usize,
}

impl Worksheet {
    pub fn new(name: &str) -> Worksheet {
        Worksheet {
            name: name.to_owned(),
            merges: Vec::new(),
            grid: Vec::new(),
            cols: 0,
        }
    }

    /// Number of rows in the grid.
    pub fn rows(&self) -> usize {
        self.grid.len()
    }

    /// Number of columns in the grid (the widest row seen so far).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Gets the value at (row, col); positions outside the grid read as null.
    pub fn get(&self, row: usize, col: usize) -> &Value {
        const NULL: &Value = &Value::Null;
        self.grid
            .get(row)
            .and_then(|cells| cells.get(col))
            .unwrap_or(NULL)
    }

    /// Writes a value at (row, col), growing the grid with nulls as needed.
    pub fn set(&mut self, row: usize, col: usize, value: Value) {
        if self.grid.len() <= row {
            self.grid.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.grid[row];
        if cells.len() <= col {
            cells.resize(col + 1, Value::Null);
        }
        cells[col] = value;
        if self.cols <= col {
            self.cols = col + 1;
        }
    }

    /// Appends a whole row at the bottom of the grid.
    pub fn append_row(&mut self, cells: Vec<Value>) {
        self.cols = self.cols.max(cells.len());
        self.grid.push(cells);
    }

    /// Expands every merged region's anchor value into all member cells.
    ///
    /// The anchor is the top-left cell of the region; after this runs, all
    /// member cells hold identical values. Idempotent: re-running on an
    /// already-normalized worksheet is a no-op, and an empty region list
    /// leaves the worksheet unchanged.
    pub fn normalize_merges(&mut self) {
        for index in 0..self.merges.len() {
            let region = self.merges[index];
            let anchor = self.get(region.row_lo, region.col_lo).clone();
            for row in region.row_lo..=region.row_hi {
                for col in region.col_lo..=region.col_hi {
                    self.set(row, col, anchor.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged_sheet() -> Worksheet {
        let mut sheet = Worksheet::new("merged");
        sheet.set(0, 0, Value::Int(42));
        sheet.set(2, 2, Value::Text("corner".to_owned()));
        sheet.merges.push(MergedRegion {
            row_lo: 0,
            row_hi: 1,
            col_lo: 0,
            col_hi: 1,
        });
        sheet
    }

    #[test]
    fn normalize_merges_fans_out_anchor_value() {
        let mut sheet = merged_sheet();
        sheet.normalize_merges();
        for row in 0..=1 {
            for col in 0..=1 {
                assert_eq!(sheet.get(row, col), &Value::Int(42));
            }
        }
        // Cells outside the region are untouched
        assert_eq!(sheet.get(2, 2), &Value::Text("corner".to_owned()));
    }

    #[test]
    fn normalize_merges_is_idempotent() {
        let mut sheet = merged_sheet();
        sheet.normalize_merges();
        let first: Vec<Value> = (0..sheet.rows())
            .flat_map(|row| (0..sheet.cols()).map(move |col| (row, col)))
            .map(|(row, col)| sheet.get(row, col).clone())
            .collect();
        sheet.normalize_merges();
        let second: Vec<Value> = (0..sheet.rows())
            .flat_map(|row| (0..sheet.cols()).map(move |col| (row, col)))
            .map(|(row, col)| sheet.get(row, col).clone())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn normalize_merges_without_regions_is_a_no_op() {
        let mut sheet = Worksheet::new("plain");
        sheet.set(0, 0, Value::Text("x".to_owned()));
        sheet.normalize_merges();
        assert_eq!(sheet.get(0, 0), &Value::Text("x".to_owned()));
        assert_eq!(sheet.rows(), 1);
    }

    #[test]
    fn get_outside_grid_reads_null() {
        let sheet = Worksheet::new("empty");
        assert!(sheet.get(5, 5).is_null());
    }
}
