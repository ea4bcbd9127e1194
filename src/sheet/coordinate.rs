//! Conversions between 0-based (row, column) coordinates and "A1"-style keys.
//!
//! Columns use bijective base-26 (`A`..`Z`, `AA`..`ZZ`, `AAA`..), rows are
//! written 1-based in decimal. Decoding is case-insensitive; encoding always
//! produces upper case, so `cell_key(parse_key(k))` canonicalises a key.

/// Convert a 0-based column index to its letter name (0 -> "A", 25 -> "Z", 26 -> "AA").
pub fn column_name(col: u32) -> String {
    let mut letters = Vec::with_capacity(4);
    let mut n = col as u64 + 1;

    while n > 0 {
        let digit = ((n - 1) % 26) as u8;
        letters.push(b'A' + digit);
        n = (n - 1) / 26;
    }

    letters.reverse();
    // Only ASCII capitals were pushed.
    letters.into_iter().map(char::from).collect()
}

/// Convert a column letter name back to its 0-based index.
///
/// Returns `None` for an empty name, a non-letter, or a name whose index does
/// not fit in a `u32`.
pub fn column_index(name: &str) -> Option<u32> {
    if name.is_empty() {
        return None;
    }

    let mut result: u64 = 0;
    for byte in name.bytes() {
        if !byte.is_ascii_alphabetic() {
            return None;
        }
        let value = (byte.to_ascii_uppercase() - b'A') as u64 + 1;
        result = result.checked_mul(26)?.checked_add(value)?;
        if result > u32::MAX as u64 + 1 {
            return None;
        }
    }

    u32::try_from(result - 1).ok()
}

/// Build the key of the cell at 0-based `(row, col)`, e.g. `(0, 0)` -> "A1".
pub fn cell_key(row: u32, col: u32) -> String {
    let mut key = column_name(col);
    let mut buf = itoa::Buffer::new();
    key.push_str(buf.format(row as u64 + 1));
    key
}

/// Split a key into its 0-based `(row, col)`.
///
/// The key must be one or more letters followed by one or more digits, with a
/// row number of at least 1.
pub fn parse_key(key: &str) -> Option<(u32, u32)> {
    let split = key.bytes().position(|b| !b.is_ascii_alphabetic())?;
    let (letters, digits) = key.split_at(split);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let col = column_index(letters)?;
    let row: u64 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }

    Some((u32::try_from(row - 1).ok()?, col))
}

/// Re-encode a key in canonical upper-case form, or `None` if it is malformed.
pub fn canonical_key(key: &str) -> Option<String> {
    parse_key(key).map(|(row, col)| cell_key(row, col))
}
