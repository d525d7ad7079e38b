//! A1-style cell reference conversion.

/// Parses an Excel-style reference ("A1", "AA10") into 0-based (row, col)
/// indexes.
/// Returns None for anything that is not letters followed by digits.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let position = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(position);
    if letters.is_empty() {
        return None;
    }
    let mut col = 0usize;
    for letter in letters.chars() {
        if !letter.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (letter.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let row = digits.parse::<usize>().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

/// Parses a rectangular range reference ("A1:B3") into 0-based inclusive corners
/// ((row_lo, col_lo), (row_hi, col_hi)). A single-cell reference is a 1x1 range.
pub(crate) fn range_to_indexes(range: &str) -> Option<((usize, usize), (usize, usize))> {
    match range.split_once(':') {
        Some((start, end)) => {
            let start = reference_to_index(start)?;
            let end = reference_to_index(end)?;
            Some((start, end))
        }
        None => {
            let cell = reference_to_index(range)?;
            Some((cell, cell))
        }
    }
}
