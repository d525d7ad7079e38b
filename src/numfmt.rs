//! Number format classification and serial date/time decoding, shared by the
//! legacy and modern readers. Both Excel encodings store calendar values as
//! fractional day counts; the number format attached to a cell decides
//! whether a raw number is really a date, a time or a plain number.

use crate::workbook::Value;
use chrono::NaiveDate;
use chrono::NaiveTime;
use chrono::TimeDelta;
use std::collections::HashMap;

/// What a cell's number format says about its numeric payload.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum NumberFormat {
    /// Plain number
    #[default]
    General,
    Date,
    Time,
    DateTime,
}

impl NumberFormat {
    /// Classifies a built-in format id.
    pub(crate) fn parse_builtin_id(id: u16) -> Option<NumberFormat> {
        match id {
            22 => Some(Self::DateTime),
            14..=17 => Some(Self::Date),
            18..=21 | 45..=47 => Some(Self::Time),
            _ => None,
        }
    }

    /// Classifies a custom format code by scanning for date and time tokens,
    /// ignoring escaped characters, quoted literals and color/condition
    /// blocks.
    pub(crate) fn parse_custom(code: &str) -> NumberFormat {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_block = false;
        let mut has_date = false;
        let mut has_time = false;
        for character in code.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_block => is_literal = true,

                ']' if is_block => is_block = false,
                '[' if !is_literal => is_block = true,
                _ if is_literal || is_block => (),

                'Y' | 'y' | 'D' | 'd' => has_date = true,
                'H' | 'h' | 'S' | 's' => has_time = true,
                _ => (),
            }
        }
        match (has_date, has_time) {
            (true, true) => Self::DateTime,
            (true, false) => Self::Date,
            (false, true) => Self::Time,
            (false, false) => Self::General,
        }
    }

    pub(crate) fn is_temporal(&self) -> bool {
        *self != Self::General
    }
}

/// Resolves per-cell format references (XF records or `cellXfs` entries) to
/// classifications, preferring workbook-defined custom formats over the
/// built-in id table.
pub(crate) fn resolve_formats(
    format_ids: &[u16],
    custom_formats: &HashMap<u16, NumberFormat>,
) -> Vec<NumberFormat> {
    format_ids
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| NumberFormat::parse_builtin_id(*id))
                .unwrap_or_default()
        })
        .collect()
}

/// Converts a raw number to a typed value: whole numbers in `i64` range
/// become integers, everything else stays floating-point.
pub(crate) fn number_to_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < 9_007_199_254_740_992.0 {
        Value::Int(number as i64)
    } else {
        Value::Float(number)
    }
}

/// Decodes a serial day count into a calendar value.
///
/// A serial below 1 has the epoch-zero date component, so it decodes as a
/// pure time of day regardless of format; otherwise the format class picks
/// date, time or full date-time. A negative serial has no calendar meaning
/// (Excel renders it as `#####`), so it stays a plain number.
pub(crate) fn serial_to_value(serial: f64, format: NumberFormat, is_1904: bool) -> Value {
    if serial < 0.0 {
        return number_to_value(serial);
    }
    if serial < 1.0 || format == NumberFormat::Time {
        return Value::Time(time_of_day(serial.rem_euclid(1.0)));
    }
    let date = date_from_days(serial.trunc() as i64, is_1904);
    match format {
        NumberFormat::Date => Value::Date(date),
        _ => Value::DateTime(date.and_time(time_of_day(serial.rem_euclid(1.0)))),
    }
}

/// Serial date base plus day count. The 1900 system counts from an
/// 1899-12-30 base to absorb the Lotus 1-2-3 leap-year bug for serials
/// at 60 and above; earlier serials shift by one day.
fn date_from_days(days: i64, is_1904: bool) -> NaiveDate {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30).expect("NaiveDate literal");
    let days = if is_1904 {
        days + 1462
    } else if days < 60 {
        days + 1
    } else {
        days
    };
    base + TimeDelta::days(days)
}

/// Day fraction in [0, 1) to time of day, rounded to milliseconds.
fn time_of_day(fraction: f64) -> NaiveTime {
    let mut milliseconds = (fraction * 86_400_000.0).round() as i64 % 86_400_000;
    let millisecond = milliseconds % 1_000;
    milliseconds /= 1_000;
    let second = milliseconds % 60;
    milliseconds /= 60;
    let minute = milliseconds % 60;
    let hour = milliseconds / 60;
    NaiveTime::from_hms_milli_opt(
        hour as u32,
        minute as u32,
        second as u32,
        millisecond as u32,
    )
    .expect("time components within range")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn builtin_ids_classify() {
        assert_eq!(NumberFormat::parse_builtin_id(14), Some(NumberFormat::Date));
        assert_eq!(NumberFormat::parse_builtin_id(18), Some(NumberFormat::Time));
        assert_eq!(NumberFormat::parse_builtin_id(22), Some(NumberFormat::DateTime));
        assert_eq!(NumberFormat::parse_builtin_id(0), None);
        assert_eq!(NumberFormat::parse_builtin_id(2), None);
    }

    #[test]
    fn custom_codes_classify_by_tokens() {
        assert_eq!(NumberFormat::parse_custom("yyyy-mm-dd"), NumberFormat::Date);
        assert_eq!(NumberFormat::parse_custom("hh:mm:ss"), NumberFormat::Time);
        assert_eq!(
            NumberFormat::parse_custom("yyyy-mm-dd hh:mm"),
            NumberFormat::DateTime
        );
        assert_eq!(NumberFormat::parse_custom("#,##0.00"), NumberFormat::General);
        // Quoted literals and color blocks do not count as tokens
        assert_eq!(
            NumberFormat::parse_custom("[Red]0\"days\""),
            NumberFormat::General
        );
    }

    #[test]
    fn whole_numbers_become_integers() {
        assert_eq!(number_to_value(42.0), Value::Int(42));
        assert_eq!(number_to_value(-3.0), Value::Int(-3));
        assert_eq!(number_to_value(1.5), Value::Float(1.5));
    }

    #[test]
    fn sub_day_serial_is_a_pure_time() {
        let value = serial_to_value(0.5, NumberFormat::DateTime, false);
        assert_eq!(
            value,
            Value::Time(NaiveTime::from_hms_opt(12, 0, 0).unwrap())
        );
    }

    #[test]
    fn serial_decodes_to_date_time() {
        // 2017-03-30 06:00 in the 1900 date system
        let value = serial_to_value(42824.25, NumberFormat::DateTime, false);
        let expected = NaiveDateTime::parse_from_str("2017-03-30 06:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        assert_eq!(value, Value::DateTime(expected));
    }

    #[test]
    fn serial_before_lotus_bug_shifts_a_day() {
        // Serial 59 is 1900-02-28; serial 61 is 1900-03-01 (60 never existed)
        assert_eq!(
            serial_to_value(59.0, NumberFormat::Date, false),
            Value::Date(NaiveDate::from_ymd_opt(1900, 2, 28).unwrap())
        );
        assert_eq!(
            serial_to_value(61.0, NumberFormat::Date, false),
            Value::Date(NaiveDate::from_ymd_opt(1900, 3, 1).unwrap())
        );
    }

    #[test]
    fn negative_serial_stays_a_plain_number() {
        assert_eq!(
            serial_to_value(-1.25, NumberFormat::DateTime, false),
            Value::Float(-1.25)
        );
        assert_eq!(
            serial_to_value(-2.0, NumberFormat::Date, false),
            Value::Int(-2)
        );
        assert_eq!(
            serial_to_value(-0.5, NumberFormat::Time, true),
            Value::Float(-0.5)
        );
    }

    #[test]
    fn serial_in_the_1904_system() {
        assert_eq!(
            serial_to_value(1.0, NumberFormat::Date, true),
            Value::Date(NaiveDate::from_ymd_opt(1904, 1, 2).unwrap())
        );
    }
}
