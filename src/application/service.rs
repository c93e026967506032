use std::io::Read;

use tracing::info;

use crate::config::LedgerConfig;
use crate::domain::{process, LedgerOutcome, Transaction};
use crate::io::{import_transactions_csv, ImportError, ImportOptions};

use super::{AppError, LedgerSummary};

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any client (CLI, tests, other tools).
pub struct LedgerService {
    config: LedgerConfig,
}

/// Everything produced by analyzing one trade history
pub struct Analysis {
    pub outcome: LedgerOutcome,
    pub summary: LedgerSummary,
    /// Rows that could not be decoded and were left out
    pub import_errors: Vec<ImportError>,
}

impl LedgerService {
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }

    /// Replay already decoded transactions.
    pub fn process(&self, transactions: Vec<Transaction>) -> Result<LedgerOutcome, AppError> {
        Ok(process(transactions, &self.config)?)
    }

    /// Import a trade-history CSV and replay it.
    /// `source` names the input in errors and logs.
    pub fn analyze_csv<R: Read>(
        &self,
        reader: R,
        source: &str,
        options: &ImportOptions,
    ) -> Result<Analysis, AppError> {
        let import = import_transactions_csv(reader, options)?;
        if import.transactions.is_empty() {
            return Err(AppError::NoTransactions(source.to_string()));
        }

        let outcome = self.process(import.transactions)?;
        let summary = LedgerSummary::from_outcome(&outcome);

        info!(
            source,
            records = summary.record_count,
            open_positions = summary.positions.len(),
            realized_profit = summary.totals.realized_profit,
            "Ledger replay complete"
        );

        Ok(Analysis {
            outcome,
            summary,
            import_errors: import.errors,
        })
    }
}
