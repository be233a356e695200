//! Text helpers shared by matching: comparison keys and price extraction

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Builds a case and diacritic insensitive comparison key.
///
/// Lowercases, applies canonical decomposition (NFD) and drops every combining
/// mark, so `"Brașov"` and `"BRASOV"` both become `"brasov"`.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Best-effort integer price from free text.
///
/// All ASCII digits are concatenated and parsed as one number. Separate numbers
/// that share a text blob are merged (`"2 camere 90000"` gives `290000`); a
/// digit run too long for an `i64` yields `None`.
pub fn parse_price(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();

    if digits.is_empty() {
        return None;
    }

    digits.parse().ok()
}
