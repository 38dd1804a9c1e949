//! # Response Parser
//!
//! Pulls typed fields out of free text shaped like
//!
//! ```text
//! Comercio: OXXO Lomas Verdes
//! Monto: 45.50
//! Categoria: Comida
//! Ubicacion: Naucalpan
//! ```
//!
//! Models rarely answer in exactly that shape, so labels are matched at the
//! start of a line, case-insensitively, with or without accents, and with
//! markdown decoration (`**Monto:**`, `- Comercio:`) tolerated. Each field is
//! parsed on its own; one bad field never hides the others.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use crate::receipt::{Category, FieldGuess, DEFAULT_MERCHANT};

lazy_static! {
    static ref MERCHANT_LINE: Regex = label_regex(r"comercio");
    static ref AMOUNT_LINE: Regex = label_regex(r"monto");
    static ref CATEGORY_LINE: Regex = label_regex(r"categor[ií]a");
    static ref LOCATION_LINE: Regex = label_regex(r"ubicaci[oó]n");
    static ref AMOUNT_VALUE: Regex =
        Regex::new(r"^\$?\s*(\d[\d,]*(?:\.\d+)?)").expect("AMOUNT_VALUE regex should compile");
}

fn label_regex(label: &str) -> Regex {
    let pattern = format!(r"(?mi)^[ \t>*_#-]*{}[ \t*_]*:[ \t*_]*(.*)$", label);
    Regex::new(&pattern).expect("label regex should compile")
}

/// Outcome of parsing one field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldParse<T> {
    Found(T),
    /// Label absent or its value empty
    Missing,
    /// Label present but the value could not be read
    Invalid(String),
}

impl<T> FieldParse<T> {
    pub fn found(self) -> Option<T> {
        match self {
            FieldParse::Found(value) => Some(value),
            FieldParse::Missing | FieldParse::Invalid(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldParse::Found(_))
    }
}

/// Per-field results of parsing a response
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFields {
    pub merchant: FieldParse<String>,
    pub amount: FieldParse<Decimal>,
    pub category: FieldParse<Category>,
    pub location: FieldParse<String>,
}

impl ParsedFields {
    /// Number of fields that parsed cleanly
    pub fn found_count(&self) -> usize {
        [
            self.merchant.is_found(),
            self.amount.is_found(),
            self.category.is_found(),
            self.location.is_found(),
        ]
        .into_iter()
        .filter(|found| *found)
        .count()
    }

    /// Resolve missing or invalid fields to the documented defaults
    pub fn into_guess(self) -> FieldGuess {
        FieldGuess::from_parts(
            self.merchant.found(),
            self.amount.found(),
            self.category.found(),
            self.location.found(),
            DEFAULT_MERCHANT,
        )
    }

    /// Resolve missing or invalid fields from `fallback`, field by field
    pub fn merge_with(self, fallback: &FieldGuess) -> FieldGuess {
        FieldGuess {
            merchant: self.merchant.found().unwrap_or_else(|| fallback.merchant.clone()),
            amount: self.amount.found().unwrap_or(fallback.amount),
            category: self.category.found().unwrap_or(fallback.category),
            location: self.location.found().unwrap_or_else(|| fallback.location.clone()),
        }
    }
}

/// Parse every labeled field of `raw`.
pub fn parse_response(raw: &str) -> ParsedFields {
    let parsed = ParsedFields {
        merchant: parse_text_field(&MERCHANT_LINE, raw),
        amount: parse_amount_field(raw),
        category: parse_category_field(raw),
        location: parse_text_field(&LOCATION_LINE, raw),
    };
    debug!(
        found = parsed.found_count(),
        response_chars = raw.chars().count(),
        "Parsed model response"
    );
    parsed
}

/// Parse `raw` into a guess. Total: any input yields a guess.
///
/// ```
/// use smart_receipt::response_parser::parse_fields;
///
/// let guess = parse_fields("Comercio: OXXO\nMonto: $45.50\nCategoria: Comida");
/// assert_eq!(guess.merchant, "OXXO");
/// assert_eq!(guess.amount.to_string(), "45.50");
///
/// let guess = parse_fields("garbage with no labels");
/// assert_eq!(guess.merchant, "Desconocido");
/// ```
pub fn parse_fields(raw: &str) -> FieldGuess {
    parse_response(raw).into_guess()
}

fn label_value<'a>(regex: &Regex, raw: &'a str) -> Option<&'a str> {
    regex
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().trim_end_matches(['*', '_']).trim())
        .filter(|value| !value.is_empty())
}

fn parse_text_field(regex: &Regex, raw: &str) -> FieldParse<String> {
    match label_value(regex, raw) {
        Some(value) => FieldParse::Found(value.to_string()),
        None => FieldParse::Missing,
    }
}

fn parse_amount_field(raw: &str) -> FieldParse<Decimal> {
    let Some(value) = label_value(&AMOUNT_LINE, raw) else {
        return FieldParse::Missing;
    };

    // Only the leading number counts; "MXN", "pesos" or a closing period are ignored
    let Some(number) = AMOUNT_VALUE.captures(value).and_then(|caps| caps.get(1)) else {
        return FieldParse::Invalid(format!("not an amount: '{}'", value));
    };

    // A second decimal point or a digit group after the decimals is not a single number
    let rest = &value[number.end()..];
    let mut rest_chars = rest.chars();
    if matches!(
        (rest_chars.next(), rest_chars.next()),
        (Some('.' | ','), Some(c)) if c.is_ascii_digit()
    ) {
        return FieldParse::Invalid(format!("not an amount: '{}'", value));
    }

    let digits = number.as_str().replace(',', "");
    match Decimal::from_str(&digits) {
        Ok(amount) => FieldParse::Found(amount),
        Err(e) => FieldParse::Invalid(format!("'{}': {}", value, e)),
    }
}

fn parse_category_field(raw: &str) -> FieldParse<Category> {
    match label_value(&CATEGORY_LINE, raw) {
        Some(value) => match Category::from_label(value) {
            Some(category) => FieldParse::Found(category),
            None => FieldParse::Invalid(format!("unknown category '{}'", value)),
        },
        None => FieldParse::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::DEFAULT_LOCATION;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_well_formed_response() {
        let raw = "Comercio: COSTCO WHOLESALE\nMonto: 1299.90\nCategoria: Despensa\nUbicacion: Arboledas, Tlalnepantla";
        let guess = parse_fields(raw);
        assert_eq!(guess.merchant, "COSTCO WHOLESALE");
        assert_eq!(guess.amount, dec("1299.90"));
        assert_eq!(guess.category, Category::Despensa);
        assert_eq!(guess.location, "Arboledas, Tlalnepantla");
    }

    #[test]
    fn test_parse_garbage_yields_defaults() {
        let guess = parse_fields("garbage with no labels");
        assert_eq!(guess.merchant, "Desconocido");
        assert_eq!(guess.amount, Decimal::ZERO);
        assert_eq!(guess.category, Category::Otros);
        assert_eq!(guess.location, DEFAULT_LOCATION);
    }

    #[test]
    fn test_parse_is_pure() {
        let raw = "**Comercio:** Pemex 2231\n**Monto:** $650.00\n";
        assert_eq!(parse_fields(raw), parse_fields(raw));
    }

    #[test]
    fn test_parse_markdown_and_accents() {
        let raw = "Aquí está:\n- **Comercio:** Tacos El Güero\n- **Monto:** $1,250.00 MXN\n- **Categoría:** comida\n- **Ubicación:** Satélite";
        let guess = parse_fields(raw);
        assert_eq!(guess.merchant, "Tacos El Güero");
        assert_eq!(guess.amount, dec("1250.00"));
        assert_eq!(guess.category, Category::Comida);
        assert_eq!(guess.location, "Satélite");
    }

    #[test]
    fn test_parse_degrades_field_by_field() {
        let parsed = parse_response("Monto: 45.50\nCategoria: Electrónica");
        assert_eq!(parsed.merchant, FieldParse::Missing);
        assert_eq!(parsed.amount, FieldParse::Found(dec("45.50")));
        assert!(matches!(parsed.category, FieldParse::Invalid(_)));
        assert_eq!(parsed.location, FieldParse::Missing);

        let guess = parsed.into_guess();
        assert_eq!(guess.merchant, "Desconocido");
        assert_eq!(guess.amount, dec("45.50"));
        assert_eq!(guess.category, Category::Otros);
    }

    #[test]
    fn test_unreadable_amount_is_invalid() {
        for raw in ["Monto: 10.00.00", "Monto: cuarenta pesos", "Monto: -45.00"] {
            let parsed = parse_response(raw);
            assert!(
                matches!(parsed.amount, FieldParse::Invalid(_)),
                "expected invalid amount for {:?}",
                raw
            );
            assert_eq!(parsed.into_guess().amount, Decimal::ZERO);
        }
    }

    #[test]
    fn test_amount_reads_leading_number_only() {
        for raw in ["Monto: 45.50MXN", "Monto: $45.50.", "Monto: 45.50,", "Monto: $45.50 pesos."] {
            let parsed = parse_response(raw);
            assert_eq!(parsed.amount, FieldParse::Found(dec("45.50")), "for {:?}", raw);
        }
        assert_eq!(parse_fields("Monto: $45.50.").amount, dec("45.50"));
    }

    #[test]
    fn test_amount_with_spaced_currency_sign() {
        assert_eq!(parse_fields("Monto: $ 99.50").amount, dec("99.50"));
        assert_eq!(parse_fields("monto:10").amount, dec("10"));
    }

    #[test]
    fn test_empty_value_does_not_read_next_line() {
        let parsed = parse_response("Comercio:\nMonto: 12.00");
        assert_eq!(parsed.merchant, FieldParse::Missing);
        assert_eq!(parsed.amount, FieldParse::Found(dec("12.00")));
    }

    #[test]
    fn test_labels_must_start_a_line() {
        let parsed = parse_response("El Comercio: no aplica");
        assert_eq!(parsed.merchant, FieldParse::Missing);
    }

    #[test]
    fn test_sentinel_text_yields_defaults() {
        let guess = parse_fields("Error: ningún modelo disponible");
        assert_eq!(guess, FieldGuess::placeholder());
    }

    #[test]
    fn test_merge_with_fallback() {
        let fallback = FieldGuess {
            merchant: "JUGUETRON".to_string(),
            amount: dec("450.00"),
            category: Category::Juguetes,
            location: "Plaza Satélite, Naucalpan".to_string(),
        };
        let merged = parse_response("Comercio: Juguetron Satélite\nMonto: ???").merge_with(&fallback);
        assert_eq!(merged.merchant, "Juguetron Satélite");
        assert_eq!(merged.amount, dec("450.00"));
        assert_eq!(merged.category, Category::Juguetes);
        assert_eq!(merged.location, "Plaza Satélite, Naucalpan");
    }
}
