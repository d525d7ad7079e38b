use crate::infer::cluster::RowLabel;
use crate::workbook::Value;

/// Separator between folded header-row fragments in a composite column name.
const TITLE_SEPARATOR: char = '/';

/// Placeholder substituted for a null header cell.
const NULL_PLACEHOLDER: &str = "*";

/// True iff every row carries the same label as the first row: the whole
/// table clustered into one block, which signals a pure-data table with no
/// header at all.
pub fn has_no_header(labels: &[RowLabel]) -> bool {
    labels.iter().all(|label| *label == labels[0])
}

/// Collects the contiguous header block at the top of the table: row indexes
/// whose label equals the first row's, stopping at the first row that
/// differs. Empty for a table with no header. Headers are assumed contiguous
/// and at the top, a structural precondition on input spreadsheets.
pub(crate) fn header_rows(labels: &[RowLabel]) -> Vec<usize> {
    if has_no_header(labels) {
        return Vec::new();
    }
    labels
        .iter()
        .take_while(|label| **label == labels[0])
        .enumerate()
        .map(|(row, _)| row)
        .collect()
}

/// Index of the first row past the header block: the first row whose label
/// differs from the first row's. Row 0 for a table with no header.
pub fn first_data_row(labels: &[RowLabel]) -> usize {
    labels
        .iter()
        .position(|label| *label != labels[0])
        .unwrap_or(0)
}

/// Coerces every cell of a row to its text representation, returning a new
/// row. Null and text cells pass through unchanged. Only header rows are
/// stringified this way; applying it to data rows would destroy their
/// numeric typing.
pub(crate) fn coerce_row_to_text(row: &[Value]) -> Vec<Value> {
    row.iter()
        .map(|value| match value {
            Value::Null | Value::Text(_) => value.clone(),
            other => Value::Text(other.to_string()),
        })
        .collect()
}

/// Folds the collected header rows into one composite header.
///
/// Every header row is stringified; rows after the first are concatenated
/// onto the first with `/`, substituting `*` for a null cell on either side.
/// A cell still null after the fold (single all-null column header) becomes
/// `*` so every column name is a real string.
pub(crate) fn synthesize_titles(rows: &[&[Value]]) -> Vec<String> {
    let mut titles: Vec<Option<String>> = rows[0]
        .iter()
        .map(|value| match value {
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .collect();
    for row in &rows[1..] {
        for (title, value) in titles.iter_mut().zip(coerce_row_to_text(row)) {
            let left = title.as_deref().unwrap_or(NULL_PLACEHOLDER);
            let right = match &value {
                Value::Null => NULL_PLACEHOLDER.to_owned(),
                other => other.to_string(),
            };
            *title = Some(format!("{left}{TITLE_SEPARATOR}{right}"));
        }
    }
    titles
        .into_iter()
        .map(|title| title.unwrap_or_else(|| NULL_PLACEHOLDER.to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use RowLabel::Data;
    use RowLabel::Header;

    fn text(value: &str) -> Value {
        Value::Text(value.to_owned())
    }

    #[test]
    fn no_header_when_every_label_matches_the_first() {
        assert!(has_no_header(&[Data, Data, Data]));
        assert!(has_no_header(&[Header, Header]));
        assert!(!has_no_header(&[Header, Data, Data]));
    }

    #[test]
    fn header_block_is_the_contiguous_prefix() {
        assert_eq!(header_rows(&[Header, Header, Data, Data]), vec![0, 1]);
        assert_eq!(header_rows(&[Header, Data, Data]), vec![0]);
        assert_eq!(header_rows(&[Data, Data, Data]), Vec::<usize>::new());
        // A header-labeled row below the block is not collected
        assert_eq!(header_rows(&[Header, Data, Header]), vec![0]);
    }

    #[test]
    fn first_data_row_is_the_first_differing_label() {
        assert_eq!(first_data_row(&[Header, Header, Data, Data, Data]), 2);
        assert_eq!(first_data_row(&[Header, Data]), 1);
        assert_eq!(first_data_row(&[Data, Data]), 0);
    }

    #[test]
    fn coercion_returns_a_new_textual_row() {
        let row = vec![Value::Int(2017), Value::Null, text("kept")];
        let coerced = coerce_row_to_text(&row);
        assert_eq!(coerced[0], text("2017"));
        assert_eq!(coerced[1], Value::Null);
        assert_eq!(coerced[2], text("kept"));
        // The input row is untouched
        assert_eq!(row[0], Value::Int(2017));
    }

    #[test]
    fn titles_fold_with_separator_and_placeholder() {
        let top = vec![text("Name"), text("Age"), Value::Null];
        let bottom = vec![Value::Null, text("Years"), text("City")];
        let titles = synthesize_titles(&[&top, &bottom]);
        assert_eq!(titles, vec!["Name/*", "Age/Years", "*/City"]);
    }

    #[test]
    fn single_header_row_passes_through_stringified() {
        let top = vec![text("Name"), Value::Int(2), Value::Null];
        let titles = synthesize_titles(&[&top]);
        assert_eq!(titles, vec!["Name", "2", "*"]);
    }
}
