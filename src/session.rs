//! # Receipt Session
//!
//! Per-user state machine for one receipt at a time, plus the user's ledger.
//!
//! ```text
//! Idle -> Uploaded -> TextExtracted -> FieldsGuessed -> AwaitingConfirmation -> Confirmed
//!                                                                             \-> Discarded
//! ```
//!
//! A guess only reaches the ledger through `AwaitingConfirmation`.

use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::{GuessResult, GuessSource};
use crate::errors::{AppError, AppResult};
use crate::ledger::{ConfirmedExpense, Ledger};
use crate::receipt::{Category, ExtractedText, FieldGuess};

/// Where the current receipt is in its lifecycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ReceiptState {
    #[default]
    Idle,
    Uploaded {
        image_bytes: usize,
    },
    TextExtracted {
        text: ExtractedText,
    },
    FieldsGuessed {
        text: ExtractedText,
        guess: FieldGuess,
        source: GuessSource,
    },
    AwaitingConfirmation {
        guess: FieldGuess,
        source: GuessSource,
    },
    Confirmed {
        expense: ConfirmedExpense,
    },
    Discarded,
}

impl ReceiptState {
    pub fn name(&self) -> &'static str {
        match self {
            ReceiptState::Idle => "Idle",
            ReceiptState::Uploaded { .. } => "Uploaded",
            ReceiptState::TextExtracted { .. } => "TextExtracted",
            ReceiptState::FieldsGuessed { .. } => "FieldsGuessed",
            ReceiptState::AwaitingConfirmation { .. } => "AwaitingConfirmation",
            ReceiptState::Confirmed { .. } => "Confirmed",
            ReceiptState::Discarded => "Discarded",
        }
    }

    /// True while a receipt is being processed or reviewed
    pub fn is_pending(&self) -> bool {
        !matches!(
            self,
            ReceiptState::Idle | ReceiptState::Confirmed { .. } | ReceiptState::Discarded
        )
    }
}

/// User edits applied to a guess on confirmation. `None` keeps the guessed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseCorrection {
    pub merchant: Option<String>,
    pub amount: Option<Decimal>,
    pub category: Option<Category>,
    pub location: Option<String>,
}

impl ExpenseCorrection {
    pub fn is_empty(&self) -> bool {
        self.merchant.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.location.is_none()
    }

    fn apply(self, guess: FieldGuess) -> FieldGuess {
        FieldGuess {
            merchant: self.merchant.unwrap_or(guess.merchant),
            amount: self.amount.unwrap_or(guess.amount),
            category: self.category.unwrap_or(guess.category),
            location: self.location.unwrap_or(guess.location),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReceiptSession {
    state: ReceiptState,
    ledger: Ledger,
}

impl ReceiptSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ReceiptState {
        &self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    /// Start a new receipt. Any receipt still pending is discarded; returns
    /// whether that happened.
    pub fn upload(&mut self, image_bytes: usize) -> bool {
        let discarded = self.state.is_pending();
        if discarded {
            info!(from = self.state.name(), "Pending receipt discarded by new upload");
        }
        self.state = ReceiptState::Uploaded { image_bytes };
        debug!(image_bytes, "Receipt uploaded");
        discarded
    }

    pub fn record_text(&mut self, text: ExtractedText) -> AppResult<()> {
        match self.state {
            ReceiptState::Uploaded { .. } => {
                self.state = ReceiptState::TextExtracted { text };
                Ok(())
            }
            _ => Err(self.invalid("record text")),
        }
    }

    pub fn record_guess(&mut self, result: GuessResult) -> AppResult<()> {
        match std::mem::take(&mut self.state) {
            ReceiptState::TextExtracted { text } => {
                self.state = ReceiptState::FieldsGuessed {
                    text,
                    guess: result.guess,
                    source: result.source,
                };
                Ok(())
            }
            other => {
                self.state = other;
                Err(self.invalid("record guess"))
            }
        }
    }

    /// Present the guess for review
    pub fn await_confirmation(&mut self) -> AppResult<&FieldGuess> {
        match std::mem::take(&mut self.state) {
            ReceiptState::FieldsGuessed { guess, source, .. } => {
                self.state = ReceiptState::AwaitingConfirmation { guess, source };
            }
            other => {
                self.state = other;
                return Err(self.invalid("await confirmation"));
            }
        }
        self.pending_guess()
            .ok_or_else(|| AppError::Internal("guess vanished after transition".to_string()))
    }

    /// Guess under review, if any
    pub fn pending_guess(&self) -> Option<&FieldGuess> {
        match &self.state {
            ReceiptState::AwaitingConfirmation { guess, .. } => Some(guess),
            _ => None,
        }
    }

    /// Confirm the pending guess with optional corrections and append it to the ledger.
    pub fn confirm(&mut self, correction: Option<ExpenseCorrection>) -> AppResult<&ConfirmedExpense> {
        self.confirm_at(correction, Local::now())
    }

    pub fn confirm_at(
        &mut self,
        correction: Option<ExpenseCorrection>,
        timestamp: DateTime<Local>,
    ) -> AppResult<&ConfirmedExpense> {
        let guess = match &self.state {
            ReceiptState::AwaitingConfirmation { guess, .. } => guess.clone(),
            _ => return Err(self.invalid("confirm")),
        };

        let corrected = correction.as_ref().is_some_and(|c| !c.is_empty());
        let guess = match correction {
            Some(correction) => correction.apply(guess),
            None => guess,
        };
        // A rejected correction leaves the guess pending for another try.
        let expense = ConfirmedExpense::from_guess(guess, timestamp)?;

        info!(
            merchant = %expense.merchant(),
            amount = %expense.amount(),
            corrected,
            "Receipt confirmed"
        );
        self.ledger.append(expense.clone());
        self.state = ReceiptState::Confirmed { expense };

        match &self.state {
            ReceiptState::Confirmed { expense } => Ok(expense),
            _ => Err(AppError::Internal("confirmed expense missing".to_string())),
        }
    }

    /// Drop the receipt in progress. Allowed from any pending state.
    pub fn discard(&mut self) -> AppResult<()> {
        if !self.state.is_pending() {
            return Err(self.invalid("discard"));
        }
        info!(from = self.state.name(), "Receipt discarded");
        self.state = ReceiptState::Discarded;
        Ok(())
    }

    pub fn clear_ledger(&mut self) {
        self.ledger.clear();
    }

    pub fn export(&self) -> AppResult<String> {
        self.ledger.export()
    }

    fn invalid(&self, action: &str) -> AppError {
        AppError::InvalidTransition {
            from: self.state.name().to_string(),
            action: action.to_string(),
        }
    }
}
