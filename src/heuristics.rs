//! # Heuristic Field Extraction
//!
//! Deterministic extraction of a [`FieldGuess`] from normalized receipt text.
//! No external calls; the same text always yields the same guess.
//!
//! - amount: largest `digits.dd` token below the plausibility ceiling
//! - merchant: first recognized fragment, overridden by the merchant rules
//! - location: from the matching merchant rule, else the generic zone
//! - category: from the matching merchant rule, else the category hints

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use crate::receipt::{
    amount_ceiling, Category, ExtractedText, FieldGuess, DEFAULT_HEURISTIC_MERCHANT,
    DEFAULT_LOCATION,
};
use crate::text_processing::normalize_text;

lazy_static! {
    static ref AMOUNT_TOKEN: Regex =
        Regex::new(r"\d+\.\d{2}").expect("AMOUNT_TOKEN regex should compile");
}

/// A known merchant recognized by a keyword in the receipt text.
#[derive(Debug, Clone, PartialEq)]
pub struct MerchantRule {
    pub keyword: String,
    pub merchant: String,
    pub location: String,
    pub category: Category,
    /// `keyword` run through the text normalizer, compared against normalized text
    match_key: String,
}

impl MerchantRule {
    pub fn new(keyword: &str, merchant: &str, location: &str, category: Category) -> Self {
        Self {
            keyword: keyword.to_string(),
            merchant: merchant.to_string(),
            location: location.to_string(),
            category,
            match_key: normalize_text(keyword).trim().to_string(),
        }
    }

    pub fn match_key(&self) -> &str {
        &self.match_key
    }

    fn matches(&self, normalized_text: &str) -> bool {
        !self.match_key.is_empty() && normalized_text.contains(&self.match_key)
    }
}

/// Default merchant table. Evaluated top to bottom, first match wins; new
/// entries must keep the existing relative order.
pub fn default_merchant_rules() -> Vec<MerchantRule> {
    vec![
        MerchantRule::new(
            "COSTCO",
            "COSTCO WHOLESALE",
            "Arboledas, Tlalnepantla",
            Category::Despensa,
        ),
        MerchantRule::new(
            "JUGUETRON",
            "JUGUETRON",
            "Plaza Satélite, Naucalpan",
            Category::Juguetes,
        ),
        MerchantRule::new("AL-MOS", "AL-MOS", "Tlalnepantla Centro", Category::Otros),
    ]
}

/// Keywords hinting at a category when no merchant rule matched
pub fn default_category_hints() -> Vec<(&'static str, Category)> {
    vec![
        ("PEMEX", Category::Gasolina),
        ("GASOLINA", Category::Gasolina),
        ("MAGNA", Category::Gasolina),
        ("DIESEL", Category::Gasolina),
        ("RESTAURANTE", Category::Comida),
        ("COMIDA", Category::Comida),
        ("TACOS", Category::Comida),
        ("PROPINA", Category::Comida),
        ("SUPERMERCADO", Category::Despensa),
        ("DESPENSA", Category::Despensa),
        ("WALMART", Category::Despensa),
        ("SORIANA", Category::Despensa),
        ("CHEDRAUI", Category::Despensa),
        ("JUGUETE", Category::Juguetes),
    ]
}

/// Keyword and regex based extractor.
#[derive(Debug, Clone)]
pub struct HeuristicExtractor {
    merchant_rules: Vec<MerchantRule>,
    category_hints: Vec<(&'static str, Category)>,
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new(default_merchant_rules())
    }
}

impl HeuristicExtractor {
    pub fn new(merchant_rules: Vec<MerchantRule>) -> Self {
        Self {
            merchant_rules,
            category_hints: default_category_hints(),
        }
    }

    pub fn merchant_rules(&self) -> &[MerchantRule] {
        &self.merchant_rules
    }

    /// Produce a guess from extracted text.
    ///
    /// The first-fragment merchant is best effort: recognizers do not promise
    /// reading order, so the first fragment is not always the header line.
    ///
    /// ```
    /// use smart_receipt::heuristics::HeuristicExtractor;
    /// use smart_receipt::text_processing::normalize_text;
    ///
    /// let guess = HeuristicExtractor::default()
    ///     .guess_from_normalized(&normalize_text("Costco #482 total 1,299.90"), None);
    /// assert_eq!(guess.merchant, "COSTCO WHOLESALE");
    /// assert_eq!(guess.amount.to_string(), "1299.90");
    /// ```
    pub fn extract(&self, text: &ExtractedText) -> FieldGuess {
        self.guess_from_normalized(text.as_str(), text.first_fragment())
    }

    /// Produce a guess from already normalized text and an optional merchant candidate
    pub fn guess_from_normalized(&self, normalized: &str, first_fragment: Option<&str>) -> FieldGuess {
        let amount = largest_plausible_amount(normalized);

        let guess = match self.merchant_rules.iter().find(|rule| rule.matches(normalized)) {
            Some(rule) => FieldGuess::from_parts(
                Some(rule.merchant.clone()),
                Some(amount),
                Some(rule.category),
                Some(rule.location.clone()),
                DEFAULT_HEURISTIC_MERCHANT,
            ),
            None => FieldGuess::from_parts(
                first_fragment.map(str::to_string),
                Some(amount),
                self.category_hint(normalized),
                Some(DEFAULT_LOCATION.to_string()),
                DEFAULT_HEURISTIC_MERCHANT,
            ),
        };

        debug!(
            merchant = %guess.merchant,
            amount = %guess.amount,
            category = %guess.category,
            "Heuristic guess produced"
        );
        guess
    }

    fn category_hint(&self, normalized: &str) -> Option<Category> {
        self.category_hints
            .iter()
            .find(|(keyword, _)| normalized.contains(keyword))
            .map(|(_, category)| *category)
    }
}

/// Heuristic guess with the default rule tables
pub fn guess_fields(text: &ExtractedText) -> FieldGuess {
    HeuristicExtractor::default().extract(text)
}

/// Largest `digits.dd` token strictly below the plausibility ceiling; zero when none
pub fn largest_plausible_amount(text: &str) -> Decimal {
    let ceiling = amount_ceiling();
    AMOUNT_TOKEN
        .find_iter(text)
        .filter_map(|m| Decimal::from_str(m.as_str()).ok())
        .filter(|amount| *amount < ceiling)
        .max()
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::ExtractedText;
    use crate::text_processing::normalize_fragments;

    fn text(fragments: &[&str]) -> ExtractedText {
        let fragments: Vec<String> = fragments.iter().map(|s| s.to_string()).collect();
        let normalized = normalize_fragments(&fragments, 4000);
        ExtractedText::from_parts(fragments, normalized)
    }

    #[test]
    fn test_amount_ignores_implausible_totals() {
        assert_eq!(
            largest_plausible_amount("TOTAL 12345.00 SUBTOTAL 99.50"),
            Decimal::from_str("99.50").unwrap()
        );
    }

    #[test]
    fn test_amount_defaults_to_zero() {
        assert_eq!(largest_plausible_amount("SIN IMPORTES 45 PESOS"), Decimal::ZERO);
        assert_eq!(largest_plausible_amount(""), Decimal::ZERO);
    }

    #[test]
    fn test_amount_picks_maximum() {
        assert_eq!(
            largest_plausible_amount("LECHE 23.50 PAN 8.00 TOTAL 31.50 EFECTIVO 50.00"),
            Decimal::from_str("50.00").unwrap()
        );
    }

    #[test]
    fn test_costco_keyword_overrides_merchant() {
        let guess = HeuristicExtractor::default()
            .extract(&text(&["#$% ruido", "bienvenido a costco!!", "TOTAL 845.10"]));
        assert_eq!(guess.merchant, "COSTCO WHOLESALE");
        assert_eq!(guess.location, "Arboledas, Tlalnepantla");
        assert_eq!(guess.amount, Decimal::from_str("845.10").unwrap());
    }

    #[test]
    fn test_juguetron_receipt() {
        let guess = HeuristicExtractor::default().extract(&text(&["JUGUETRON SATELITE TOTAL: 450.00"]));
        assert_eq!(guess.merchant, "JUGUETRON");
        assert_eq!(guess.amount, Decimal::from_str("450.00").unwrap());
        assert_eq!(guess.location, "Plaza Satélite, Naucalpan");
        assert_eq!(guess.category, Category::Juguetes);
    }

    #[test]
    fn test_hyphenated_keyword_matches_normalized_text() {
        let guess = HeuristicExtractor::default().extract(&text(&["AL-MOS", "TOTAL 120.00"]));
        assert_eq!(guess.merchant, "AL-MOS");
        assert_eq!(guess.location, "Tlalnepantla Centro");
    }

    #[test]
    fn test_keyword_normalized_at_construction() {
        let rule = MerchantRule::new("al-mos ", "AL-MOS", "Tlalnepantla Centro", Category::Despensa);
        assert_eq!(rule.match_key(), "ALMOS");
        assert!(rule.matches("ABARROTES ALMOS TOTAL 85.00"));

        let blank = MerchantRule::new("--", "NADIE", "", Category::Otros);
        assert_eq!(blank.match_key(), "");
        assert!(!blank.matches("CUALQUIER TEXTO"));
    }

    #[test]
    fn test_first_rule_wins() {
        let guess = HeuristicExtractor::default().extract(&text(&["JUGUETRON DENTRO DE COSTCO"]));
        assert_eq!(guess.merchant, "COSTCO WHOLESALE");
    }

    #[test]
    fn test_unknown_merchant_uses_first_fragment() {
        let guess = HeuristicExtractor::default()
            .extract(&text(&["Tacos El Güero", "Propina 20.00", "Total 180.00"]));
        assert_eq!(guess.merchant, "Tacos El Güero");
        assert_eq!(guess.location, DEFAULT_LOCATION);
        assert_eq!(guess.category, Category::Comida);
        assert_eq!(guess.amount, Decimal::from_str("180.00").unwrap());
    }

    #[test]
    fn test_empty_text_yields_defaults() {
        let guess = HeuristicExtractor::default().extract(&ExtractedText::empty());
        assert_eq!(guess.merchant, "DESCONOCIDO");
        assert_eq!(guess.amount, Decimal::ZERO);
        assert_eq!(guess.category, Category::Otros);
        assert_eq!(guess.location, DEFAULT_LOCATION);
    }

    #[test]
    fn test_custom_rules_keep_order() {
        let extractor = HeuristicExtractor::new(vec![
            MerchantRule::new("OXXO", "OXXO", "Lomas Verdes", Category::Comida),
            MerchantRule::new("PEMEX", "PEMEX", "Periférico Norte", Category::Gasolina),
        ]);
        let guess = extractor.extract(&text(&["PEMEX OXXO 300.00"]));
        assert_eq!(guess.merchant, "OXXO");
        assert_eq!(extractor.merchant_rules().len(), 2);
    }
}
