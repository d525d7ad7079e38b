use crate::infer::cluster::RowLabel;
use crate::infer::header::first_data_row;
use crate::table::Table;

/// Resolves one canonical type name per column by reading the first data row,
/// then scanning forward through later rows for any column that starts null.
///
/// The scan only ever moves forward from `first_data_row + 1` and visits each
/// row once, so a column null in the first data row but non-null only in the
/// very last row still resolves. A column with no non-null value anywhere
/// below stays "null" — valid, if uninformative.
pub(crate) fn resolve_column_types(table: &Table, labels: &[RowLabel]) -> Vec<&'static str> {
    let first = first_data_row(labels);
    let mut names: Vec<&'static str> = table.rows[first]
        .iter()
        .map(|value| value.type_name())
        .collect();
    for (col, name) in names.iter_mut().enumerate() {
        if *name != "null" {
            continue;
        }
        for row in (first + 1)..table.height() {
            let value = &table.rows[row][col];
            if !value.is_null() {
                *name = value.type_name();
                break;
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::Value;

    use RowLabel::Data;
    use RowLabel::Header;

    fn text(value: &str) -> Value {
        Value::Text(value.to_owned())
    }

    #[test]
    fn types_come_from_the_first_data_row() {
        let table = Table::from_rows(vec![
            vec![text("Name"), text("Age")],
            vec![text("wilson"), Value::Int(30)],
            vec![text("alice"), Value::Int(25)],
        ]);
        let names = resolve_column_types(&table, &[Header, Data, Data]);
        assert_eq!(names, vec!["text", "int"]);
    }

    #[test]
    fn null_leading_column_adopts_the_first_value_below() {
        let table = Table::from_rows(vec![
            vec![text("Name"), text("Score")],
            vec![text("wilson"), Value::Null],
            vec![text("alice"), Value::Null],
            vec![text("bob"), Value::Int(88)],
        ]);
        let names = resolve_column_types(&table, &[Header, Data, Data, Data]);
        assert_eq!(names[1], "int");
    }

    #[test]
    fn column_null_everywhere_stays_null() {
        let table = Table::from_rows(vec![
            vec![text("Name"), text("Gap")],
            vec![text("wilson"), Value::Null],
            vec![text("alice"), Value::Null],
        ]);
        let names = resolve_column_types(&table, &[Header, Data, Data]);
        assert_eq!(names[1], "null");
    }

    #[test]
    fn no_header_table_reads_row_zero() {
        let table = Table::from_rows(vec![
            vec![Value::Int(1), Value::Float(0.5)],
            vec![Value::Int(2), Value::Float(1.5)],
        ]);
        let names = resolve_column_types(&table, &[Data, Data]);
        assert_eq!(names, vec!["int", "float"]);
    }
}
