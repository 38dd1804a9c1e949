//! # Receipt Data Model
//!
//! Types that flow through the pipeline: the raw photo, the recognized and
//! normalized text, and the machine-produced field guess.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Merchant placeholder used by the response parser
pub const DEFAULT_MERCHANT: &str = "Desconocido";
/// Merchant placeholder used by the heuristic strategy
pub const DEFAULT_HEURISTIC_MERCHANT: &str = "DESCONOCIDO";
/// Location used when nothing better is known
pub const DEFAULT_LOCATION: &str = "EDOMEX (ZONA GENERAL)";

/// Amounts at or above this are treated as OCR noise by the heuristic strategy
pub fn amount_ceiling() -> Decimal {
    Decimal::new(10_000, 0)
}

/// Photo bytes as received from the collaborator. Transient.
#[derive(Debug, Clone)]
pub struct RawReceiptImage {
    pub bytes: Vec<u8>,
    /// Declared media type, e.g. `image/jpeg`. Informational; the format is sniffed.
    pub media_type: Option<String>,
}

impl RawReceiptImage {
    pub fn new(bytes: Vec<u8>, media_type: Option<String>) -> Self {
        Self { bytes, media_type }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Text recognized on a receipt.
///
/// `fragments` keeps what the recognizer reported, in its order. `normalized`
/// is the string every extraction strategy reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    fragments: Vec<String>,
    normalized: String,
}

impl ExtractedText {
    pub(crate) fn from_parts(fragments: Vec<String>, normalized: String) -> Self {
        Self {
            fragments,
            normalized,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn first_fragment(&self) -> Option<&str> {
        self.fragments.first().map(String::as_str)
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

impl fmt::Display for ExtractedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

/// Expense category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    Despensa,
    Gasolina,
    Juguetes,
    Comida,
    #[default]
    Otros,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Despensa,
        Category::Gasolina,
        Category::Juguetes,
        Category::Comida,
        Category::Otros,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Despensa => "Despensa",
            Category::Gasolina => "Gasolina",
            Category::Juguetes => "Juguetes",
            Category::Comida => "Comida",
            Category::Otros => "Otros",
        }
    }

    /// Match a label case- and accent-insensitively.
    ///
    /// Returns `None` for labels that name no known category; callers decide
    /// whether that means `Otros`.
    pub fn from_label(label: &str) -> Option<Self> {
        let folded = fold_accents(label.trim()).to_lowercase();
        let folded = folded.trim_matches(|c: char| !c.is_alphanumeric());
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().to_lowercase() == folded)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip diacritics: decompose, then drop combining marks
pub fn fold_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Unconfirmed, machine-produced candidate record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldGuess {
    pub merchant: String,
    pub amount: Decimal,
    pub category: Category,
    pub location: String,
}

impl FieldGuess {
    /// Build a guess from optional parts, filling the documented defaults.
    ///
    /// Negative amounts are clamped to zero.
    pub fn from_parts(
        merchant: Option<String>,
        amount: Option<Decimal>,
        category: Option<Category>,
        location: Option<String>,
        default_merchant: &str,
    ) -> Self {
        let merchant = merchant
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_merchant.to_string());
        let location = location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        let amount = amount.unwrap_or(Decimal::ZERO).max(Decimal::ZERO);

        Self {
            merchant,
            amount,
            category: category.unwrap_or_default(),
            location,
        }
    }

    /// The all-placeholder guess handed to the user when nothing was recognized
    pub fn placeholder() -> Self {
        Self::from_parts(None, None, None, None, DEFAULT_MERCHANT)
    }
}

impl Default for FieldGuess {
    fn default() -> Self {
        Self::placeholder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_label_is_tolerant() {
        assert_eq!(Category::from_label("despensa"), Some(Category::Despensa));
        assert_eq!(Category::from_label(" GASOLINA "), Some(Category::Gasolina));
        assert_eq!(Category::from_label("Comida."), Some(Category::Comida));
        assert_eq!(Category::from_label("**Juguetes**"), Some(Category::Juguetes));
        assert_eq!(Category::from_label("Electrónica"), None);
    }

    #[test]
    fn test_field_guess_defaults() {
        let guess = FieldGuess::placeholder();
        assert_eq!(guess.merchant, "Desconocido");
        assert_eq!(guess.amount, Decimal::ZERO);
        assert_eq!(guess.category, Category::Otros);
        assert_eq!(guess.location, DEFAULT_LOCATION);
    }

    #[test]
    fn test_field_guess_clamps_negative_amount_and_blank_strings() {
        let guess = FieldGuess::from_parts(
            Some("   ".to_string()),
            Some(Decimal::new(-550, 2)),
            None,
            Some(String::new()),
            DEFAULT_HEURISTIC_MERCHANT,
        );
        assert_eq!(guess.merchant, "DESCONOCIDO");
        assert_eq!(guess.amount, Decimal::ZERO);
        assert_eq!(guess.location, DEFAULT_LOCATION);
    }

    #[test]
    fn test_fold_accents() {
        assert_eq!(fold_accents("Categoría Ubicación Ñandú"), "Categoria Ubicacion Nandu");
        assert_eq!(fold_accents("Crème Brûlée Façade"), "Creme Brulee Facade");
        assert_eq!(Category::from_label("GASOLINA\u{0301}"), Some(Category::Gasolina));
    }
}
