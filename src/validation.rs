//! Validation of user-entered corrections to a field guess.
//!
//! Each validator returns the cleaned value or a short error code the
//! front end maps to its own message.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::receipt::amount_ceiling;

pub const MAX_MERCHANT_LENGTH: usize = 120;
pub const MAX_LOCATION_LENGTH: usize = 160;

lazy_static! {
    static ref AMOUNT_INPUT: Regex = Regex::new(r"^\$?\s*(-?\d[\d,]*(?:\.\d{1,2})?)$")
        .expect("Invalid amount input regex pattern");
}

/// Validates a merchant name
///
/// # Examples
/// ```
/// use smart_receipt::validation::validate_merchant;
///
/// assert_eq!(validate_merchant("  OXXO "), Ok("OXXO"));
/// assert_eq!(validate_merchant(""), Err("empty"));
/// assert_eq!(validate_merchant(&"a".repeat(121)), Err("too_long"));
/// ```
pub fn validate_merchant(name: &str) -> Result<&str, &'static str> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.chars().count() > MAX_MERCHANT_LENGTH {
        return Err("too_long");
    }

    Ok(trimmed)
}

/// Validates a location. Empty input means "no location".
pub fn validate_location(location: &str) -> Result<Option<&str>, &'static str> {
    let trimmed = location.trim();

    if trimmed.is_empty() {
        return Ok(None);
    }

    if trimmed.chars().count() > MAX_LOCATION_LENGTH {
        return Err("too_long");
    }

    Ok(Some(trimmed))
}

/// Validates an amount as a user would type it: optional `$`, thousands
/// commas, at most two decimals.
///
/// # Examples
/// ```
/// use smart_receipt::validation::validate_amount_input;
///
/// assert_eq!(validate_amount_input("$1,250.5").unwrap().to_string(), "1250.5");
/// assert_eq!(validate_amount_input("-3"), Err("negative"));
/// assert_eq!(validate_amount_input("doce"), Err("invalid"));
/// ```
pub fn validate_amount_input(input: &str) -> Result<Decimal, &'static str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty");
    }

    let digits = AMOUNT_INPUT
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace(',', ""))
        .ok_or("invalid")?;

    let amount = Decimal::from_str(&digits).map_err(|_| "invalid")?;
    validate_amount(amount)
}

/// Validates an amount value
pub fn validate_amount(amount: Decimal) -> Result<Decimal, &'static str> {
    if amount < Decimal::ZERO {
        return Err("negative");
    }
    if amount >= amount_ceiling() * Decimal::from(100) {
        return Err("too_large");
    }
    Ok(amount)
}
