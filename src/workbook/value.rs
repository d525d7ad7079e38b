use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::TimeDelta;
use std::fmt::Display;

/// A single cell value in its semantic kind.
///
/// Within a merged region only the top-left cell holds the authoritative value
/// until `Worksheet::normalize_merges` fans it out.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Absent cell
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Calendar instant (date and time of day)
    DateTime(NaiveDateTime),
    /// Calendar date without a time of day
    Date(NaiveDate),
    /// Time of day without a date
    Time(NaiveTime),
    Duration(TimeDelta),
    /// Text, including formula text (a string starting with `=`)
    Text(String),
    /// Anything the source format can represent but this model cannot,
    /// carried through as its raw rendering (error cells, for instance)
    Other(String),
}

impl Value {
    /// Canonical type name, used as the `TypeSchema` value for a column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::DateTime(_) => "datetime",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Duration(_) => "duration",
            Self::Text(_) => "text",
            Self::Other(_) => "other",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for text that is a cell formula: starts with `=` and contains
    /// exactly one `=` character.
    pub fn is_formula_text(&self) -> bool {
        match self {
            Self::Text(text) => text.starts_with('=') && text.matches('=').count() == 1,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::DateTime(value) => write!(f, "{value}"),
            Self::Date(value) => write!(f, "{value}"),
            Self::Time(value) => write!(f, "{value}"),
            Self::Duration(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
            Self::Other(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formula_text_requires_exactly_one_equals() {
        assert!(Value::Text("=SUM(A1:A3)".to_owned()).is_formula_text());
        assert!(!Value::Text("=A1=A2".to_owned()).is_formula_text());
        assert!(!Value::Text("SUM(A1:A3)".to_owned()).is_formula_text());
        assert!(!Value::Null.is_formula_text());
    }

    #[test]
    fn type_names_cover_every_kind() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Float(1.5).type_name(), "float");
        assert_eq!(Value::Text("x".to_owned()).type_name(), "text");
        assert_eq!(Value::Other("#REF!".to_owned()).type_name(), "other");
    }
}
