//! # Text Processing Module
//!
//! Normalization of recognized receipt text. The normalized string is the
//! only input the field extraction strategies read; no later stage goes back
//! to the image.
//!
//! Normalization:
//! - joins fragments with single spaces
//! - upper-cases
//! - removes every character outside word characters (Unicode), whitespace,
//!   `$`, `.` and `:`
//! - truncates to a character budget

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

lazy_static! {
    /// Characters outside the allow-set. `\w` is Unicode-aware, so accented
    /// letters and `Ñ` survive.
    static ref DISALLOWED_CHARS: Regex =
        Regex::new(r"[^\w\s$.:]").expect("DISALLOWED_CHARS regex should compile");
}

/// Normalize a single string: upper-case and strip disallowed characters.
///
/// ```
/// use smart_receipt::text_processing::normalize_text;
///
/// assert_eq!(normalize_text("Total: $1,234.50!"), "TOTAL: $1234.50");
/// assert_eq!(normalize_text("Al-Mos"), "ALMOS");
/// ```
pub fn normalize_text(text: &str) -> String {
    let upper = text.to_uppercase();
    DISALLOWED_CHARS.replace_all(&upper, "").into_owned()
}

/// Join, normalize and bound recognizer fragments.
///
/// Returns an empty string when there are no fragments.
pub fn normalize_fragments<S: AsRef<str>>(fragments: &[S], max_chars: usize) -> String {
    if fragments.is_empty() {
        return String::new();
    }

    let joined = fragments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(" ");
    let normalized = normalize_text(&joined);
    let normalized = normalized.trim();

    let bounded = truncate_chars(normalized, max_chars);
    trace!(
        input_chars = joined.chars().count(),
        output_chars = bounded.chars().count(),
        "Normalized receipt text"
    );
    bounded.to_string()
}

/// Longest prefix of `text` holding at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fragments_joins_with_spaces() {
        let fragments = vec!["Juguetron", "Satelite", "Total: 450.00"];
        assert_eq!(
            normalize_fragments(&fragments, 4000),
            "JUGUETRON SATELITE TOTAL: 450.00"
        );
    }

    #[test]
    fn test_normalize_keeps_spanish_letters() {
        assert_eq!(normalize_text("Plaza Satélite, Ñuñoa"), "PLAZA SATÉLITE ÑUÑOA");
    }

    #[test]
    fn test_normalize_strips_noise() {
        assert_eq!(normalize_text("*** GRACIAS! (vuelva) #12 ***"), " GRACIAS VUELVA 12 ");
        assert_eq!(normalize_text("IVA 16% -> $8.00"), "IVA 16  $8.00");
    }

    #[test]
    fn test_normalize_empty_fragments() {
        let fragments: Vec<String> = Vec::new();
        assert_eq!(normalize_fragments(&fragments, 4000), "");
        assert_eq!(normalize_fragments(&["  ", "!!"], 4000), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_text("Costco Wholesale #482, Arboledas: $1,299.90");
        assert_eq!(normalize_text(&once), once);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("ÑÑÑÑ", 2), "ÑÑ");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
