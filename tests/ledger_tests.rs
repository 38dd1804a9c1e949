//! # Ledger and Session Tests
//!
//! Confirmation flow, ledger invariants and CSV export through the public API.

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};
    use rust_decimal::Decimal;
    use smart_receipt::errors::AppError;
    use smart_receipt::ledger::CSV_HEADER;
    use smart_receipt::response_parser::parse_fields;
    use smart_receipt::{
        Category, ConfirmedExpense, ExpenseCorrection, GuessResult, GuessSource, Ledger,
        ReceiptSession,
    };
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn expense(merchant: &str, amount: &str) -> ConfirmedExpense {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 18, 45, 0).single().unwrap();
        ConfirmedExpense::new(merchant, dec(amount), Some(Category::Comida), None, at).unwrap()
    }

    #[test]
    fn test_total_equals_sum_of_records() {
        let mut ledger = Ledger::new();
        for (merchant, amount) in [("OXXO", "45.50"), ("OXXO", "45.50"), ("TACOS EL GÜERO", "180.00")] {
            ledger.append(expense(merchant, amount));
        }

        let sum: Decimal = ledger.records().iter().map(|r| r.amount()).sum();
        assert_eq!(ledger.total(), sum);
        assert_eq!(ledger.total(), dec("271.00"));
        // Duplicates are kept
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_export_header_and_row_count() {
        let mut ledger = Ledger::new();
        ledger.append(expense("OXXO", "45.5"));
        ledger.append(expense("TACOS EL GÜERO", "180"));

        let csv = ledger.export().unwrap();
        let body = csv.strip_prefix('\u{feff}').expect("export should start with a BOM");
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "OXXO,45.50,Comida,,2024-05-01 18:45");
        assert_eq!(lines[2], "TACOS EL GÜERO,180.00,Comida,,2024-05-01 18:45");
    }

    #[test]
    fn test_clear_then_export_has_only_header() {
        let mut ledger = Ledger::new();
        ledger.append(expense("OXXO", "10.00"));
        ledger.clear();
        assert_eq!(ledger.total(), Decimal::ZERO);
        assert_eq!(ledger.export().unwrap().lines().count(), 1);
    }

    #[test]
    fn test_session_flow_with_corrections_to_file() {
        let mut session = ReceiptSession::new();
        session.upload(1024);
        assert!(session.confirm(None).is_err());

        let guess = parse_fields("Comercio: Farmacia San Pablo\nMonto: abc\nCategoria: Salud");
        assert_eq!(guess.amount, Decimal::ZERO);
        assert_eq!(guess.category, Category::Otros);

        session.record_text(Default::default()).unwrap();
        session
            .record_guess(GuessResult {
                guess,
                source: GuessSource::Model { id: "gemini-1.5-flash".to_string() },
                raw_response: None,
            })
            .unwrap();
        session.await_confirmation().unwrap();

        let correction = ExpenseCorrection {
            amount: Some(dec("212.40")),
            ..Default::default()
        };
        let saved = session.confirm(Some(correction)).unwrap();
        assert_eq!(saved.merchant(), "Farmacia San Pablo");
        assert_eq!(saved.amount(), dec("212.40"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gastos.csv");
        session.ledger().write_csv(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Farmacia San Pablo,212.40,Otros,EDOMEX (ZONA GENERAL),"));
    }

    #[test]
    fn test_skipping_states_is_rejected() {
        let mut session = ReceiptSession::new();
        let err = session.record_text(Default::default()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(
            err.to_string(),
            "[SESSION] cannot record text while receipt is Idle"
        );
        assert!(session.discard().is_err());
    }

    #[test]
    fn test_write_csv_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("gastos.csv");
        let result = Ledger::new().write_csv(&path);
        assert!(matches!(result, Err(AppError::Export(_))));
    }
}
