//! # Expense Ledger
//!
//! Session-owned, append-only list of confirmed expenses with a running total
//! and CSV export.

use std::path::Path;

use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{error_logging, AppError, AppResult};
use crate::observability;
use crate::receipt::{Category, FieldGuess};

/// CSV header row of an export
pub const CSV_HEADER: [&str; 5] = ["Comercio", "Monto", "Categoria", "Ubicacion", "Fecha"];
/// Timestamp format used in exports
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";
const UTF8_BOM: &str = "\u{feff}";

/// An expense the user confirmed. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedExpense {
    merchant: String,
    amount: Decimal,
    category: Option<Category>,
    location: Option<String>,
    timestamp: DateTime<Local>,
}

impl ConfirmedExpense {
    /// # Errors
    ///
    /// `AppError::Validation` for a blank merchant or a negative amount.
    pub fn new(
        merchant: impl Into<String>,
        amount: Decimal,
        category: Option<Category>,
        location: Option<String>,
        timestamp: DateTime<Local>,
    ) -> AppResult<Self> {
        let merchant = merchant.into().trim().to_string();
        if merchant.is_empty() {
            return Err(AppError::Validation("merchant cannot be empty".to_string()));
        }
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(AppError::Validation(format!(
                "amount cannot be negative: {}",
                amount
            )));
        }

        Ok(Self {
            merchant,
            amount,
            category,
            location: location
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            timestamp,
        })
    }

    /// Record a reviewed guess as-is
    pub fn from_guess(guess: FieldGuess, timestamp: DateTime<Local>) -> AppResult<Self> {
        Self::new(
            guess.merchant,
            guess.amount,
            Some(guess.category),
            Some(guess.location),
            timestamp,
        )
    }

    pub fn merchant(&self) -> &str {
        &self.merchant
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }
}

/// Ordered confirmed expenses. Insertion order is kept; duplicates are allowed.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<ConfirmedExpense>,
    total: Decimal,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: ConfirmedExpense) {
        self.total += record.amount;
        observability::record_ledger_record(record.amount);
        info!(
            merchant = %record.merchant,
            amount = %record.amount,
            records = self.records.len() + 1,
            "Expense added to ledger"
        );
        self.records.push(record);
    }

    /// Sum of every recorded amount
    pub fn total(&self) -> Decimal {
        self.total
    }

    /// Remove every record. Irreversible.
    pub fn clear(&mut self) {
        info!(records = self.records.len(), "Ledger cleared");
        self.records.clear();
        self.total = Decimal::ZERO;
    }

    pub fn records(&self) -> &[ConfirmedExpense] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize the ledger as CSV, prefixed with a UTF-8 byte order mark so
    /// spreadsheet tools keep accented characters.
    ///
    /// ```
    /// use smart_receipt::ledger::Ledger;
    ///
    /// let csv = Ledger::new().export().unwrap();
    /// assert_eq!(csv, "\u{feff}Comercio,Monto,Categoria,Ubicacion,Fecha\n");
    /// ```
    pub fn export(&self) -> AppResult<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;

        for record in &self.records {
            writer.write_record([
                record.merchant.as_str(),
                &format!("{:.2}", record.amount),
                record.category.map(|c| c.as_str()).unwrap_or_default(),
                record.location.as_deref().unwrap_or_default(),
                &record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Export(e.to_string()))?;
        let body = String::from_utf8(bytes).map_err(|e| AppError::Export(e.to_string()))?;
        Ok(format!("{}{}", UTF8_BOM, body))
    }

    /// Export to a file, replacing it if present
    pub fn write_csv(&self, path: &Path) -> AppResult<()> {
        let csv = self.export()?;
        std::fs::write(path, csv).map_err(|e| {
            error_logging::log_filesystem_error(&e, "write_csv", path.to_str());
            AppError::Export(format!("failed to write {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), records = self.records.len(), "Ledger exported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 9, hour, minute, 0)
            .single()
            .expect("unambiguous local time")
    }

    fn expense(merchant: &str, amount: &str) -> ConfirmedExpense {
        ConfirmedExpense::new(
            merchant,
            Decimal::from_str(amount).unwrap(),
            Some(Category::Despensa),
            Some("Satélite".to_string()),
            at(10, 30),
        )
        .unwrap()
    }

    #[test]
    fn test_total_tracks_appends_and_clear() {
        let mut ledger = Ledger::new();
        ledger.append(expense("COSTCO WHOLESALE", "1299.90"));
        ledger.append(expense("OXXO", "45.10"));
        assert_eq!(ledger.total(), Decimal::from_str("1345.00").unwrap());
        assert_eq!(ledger.len(), 2);

        ledger.clear();
        assert_eq!(ledger.total(), Decimal::ZERO);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_export_rows_in_insertion_order() {
        let mut ledger = Ledger::new();
        ledger.append(expense("JUGUETRON", "450"));
        ledger.append(expense("AL-MOS, S.A.", "12.5"));

        let csv = ledger.export().unwrap();
        let lines: Vec<&str> = csv.trim_start_matches('\u{feff}').lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Comercio,Monto,Categoria,Ubicacion,Fecha");
        assert_eq!(lines[1], "JUGUETRON,450.00,Despensa,Satélite,2024-03-09 10:30");
        assert_eq!(lines[2], "\"AL-MOS, S.A.\",12.50,Despensa,Satélite,2024-03-09 10:30");
    }

    #[test]
    fn test_export_starts_with_bom() {
        let csv = Ledger::new().export().unwrap();
        assert!(csv.starts_with('\u{feff}'));
    }

    #[test]
    fn test_optional_fields_export_empty() {
        let mut ledger = Ledger::new();
        ledger.append(
            ConfirmedExpense::new("PEMEX", Decimal::from_str("650.00").unwrap(), None, None, at(8, 5))
                .unwrap(),
        );
        let csv = ledger.export().unwrap();
        assert!(csv.contains("PEMEX,650.00,,,2024-03-09 08:05"));
    }

    #[test]
    fn test_expense_validation() {
        assert!(ConfirmedExpense::new("  ", Decimal::ONE, None, None, at(9, 0)).is_err());
        assert!(ConfirmedExpense::new("OXXO", Decimal::new(-1, 0), None, None, at(9, 0)).is_err());
        assert!(ConfirmedExpense::new("OXXO", Decimal::ZERO, None, None, at(9, 0)).is_ok());
    }

    #[test]
    fn test_write_csv_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gastos.csv");
        let mut ledger = Ledger::new();
        ledger.append(expense("OXXO", "45.50"));

        ledger.write_csv(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, ledger.export().unwrap());
    }
}
