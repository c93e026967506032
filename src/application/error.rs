use thiserror::Error;

use crate::domain::LedgerError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Import failed: {0}")]
    Import(#[from] anyhow::Error),

    #[error("No transactions found in {0}")]
    NoTransactions(String),
}
