//! # SmartReceipt
//!
//! Turns a photographed purchase receipt into a structured expense record
//! (merchant, amount, category, location) that a user reviews, corrects and
//! accumulates into a ledger exportable as CSV.
//!
//! Text is recognized with Tesseract after Otsu binarization. Fields are
//! guessed either by keyword heuristics or by a generative model tried
//! through an ordered fallback list.

pub mod ai;
pub mod config;
pub mod engine;
pub mod errors;
pub mod heuristics;
pub mod instance_manager;
pub mod ledger;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod pipeline;
pub mod preprocessing;
pub mod receipt;
pub mod response_parser;
pub mod session;
pub mod text_processing;
pub mod validation;

// Re-export types for easier access
pub use engine::{ExtractionEngine, ExtractionStrategy, GuessResult, GuessSource};
pub use ledger::{ConfirmedExpense, Ledger};
pub use pipeline::{ProcessedReceipt, ReceiptPipeline};
pub use receipt::{Category, ExtractedText, FieldGuess, RawReceiptImage};
pub use session::{ExpenseCorrection, ReceiptSession, ReceiptState};
