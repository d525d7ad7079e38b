use crate::table::Table;
use crate::workbook::Value;

/// Ordinal type weight placing a cell on a text-to-numeric spectrum.
///
/// Header rows are dominated by plain text (weight 1) and data rows by
/// numbers (weights 6-7), so clustering rows on Euclidean distance over these
/// weights separates the two. Null sits in the middle (3): gaps occur inside
/// data rows but rarely inside header rows, so null must not read as either
/// extreme. Formula text outranks everything because it only appears in
/// computed data cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeWeight {
    /// Generic text that is not a formula
    Text = 1,
    /// Any representable kind not covered by another weight
    Other = 2,
    /// Absent cell
    Null = 3,
    Bool = 4,
    /// Calendar instant, date, time or duration
    Temporal = 5,
    Int = 6,
    Float = 7,
    /// Text starting with `=` that contains exactly one `=`
    Formula = 8,
}

impl TypeWeight {
    /// Classifies a single value.
    ///
    /// Text is checked for the formula shape before falling back to the
    /// generic text weight; the categories are otherwise disjoint at the
    /// representation level.
    pub fn of(value: &Value) -> TypeWeight {
        match value {
            Value::Text(_) if value.is_formula_text() => Self::Formula,
            Value::Text(_) => Self::Text,
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::DateTime(_) | Value::Date(_) | Value::Time(_) | Value::Duration(_) => {
                Self::Temporal
            }
            Value::Int(_) => Self::Int,
            Value::Float(_) => Self::Float,
            Value::Other(_) => Self::Other,
        }
    }
}

/// Builds the R×C weight matrix for a table: entry (r, c) is the type weight
/// of cell (r, c). Fully-null columns must already have been dropped by
/// `load_table` before this runs.
pub(crate) fn type_matrix(table: &Table) -> Vec<Vec<f64>> {
    table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|value| TypeWeight::of(value) as u8 as f64)
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn weights_follow_the_ranking_table() {
        assert_eq!(TypeWeight::of(&Value::Text("Name".to_owned())), TypeWeight::Text);
        assert_eq!(TypeWeight::of(&Value::Other("#REF!".to_owned())), TypeWeight::Other);
        assert_eq!(TypeWeight::of(&Value::Null), TypeWeight::Null);
        assert_eq!(TypeWeight::of(&Value::Bool(true)), TypeWeight::Bool);
        assert_eq!(
            TypeWeight::of(&Value::Date(NaiveDate::from_ymd_opt(2017, 3, 30).unwrap())),
            TypeWeight::Temporal
        );
        assert_eq!(TypeWeight::of(&Value::Int(1)), TypeWeight::Int);
        assert_eq!(TypeWeight::of(&Value::Float(1.5)), TypeWeight::Float);
        assert_eq!(
            TypeWeight::of(&Value::Text("=SUM(A1:A2)".to_owned())),
            TypeWeight::Formula
        );
    }

    #[test]
    fn formula_shape_takes_priority_over_generic_text() {
        // Two equals signs: not a formula, just text
        assert_eq!(
            TypeWeight::of(&Value::Text("=A1=A2".to_owned())),
            TypeWeight::Text
        );
    }

    #[test]
    fn matrix_matches_table_shape() {
        let table = Table::from_rows(vec![
            vec![Value::Text("a".to_owned()), Value::Text("b".to_owned())],
            vec![Value::Int(1), Value::Float(2.5)],
        ]);
        let matrix = type_matrix(&table);
        assert_eq!(matrix, vec![vec![1.0, 1.0], vec![6.0, 7.0]]);
    }
}
