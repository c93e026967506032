use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    parse_cash_amount, NormalizedFields, PositionBook, PositionError, Transaction,
    TransactionKind,
};
use crate::config::{InputOrder, LedgerConfig, OversellPolicy};

/// Profit breakdown of a single sell matched against an open position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Disposal {
    /// Units the profit was realized on
    pub quantity: f64,
    pub proceeds: f64,
    /// Quantity valued at the position's average unit cost
    pub cost: f64,
    pub commission: f64,
    pub profit: f64,
    /// Trade amount as reported by the exchange, parsed strictly
    pub reported_amount: f64,
    /// True if this sell closed the position
    pub closed_position: bool,
}

/// A record after replay: its numeric view and the profit it realized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Position of the record in the input sequence
    pub index: usize,
    pub transaction: Transaction,
    /// Recognized kind, `None` for labels the ledger ignores
    pub kind: Option<TransactionKind>,
    pub fields: NormalizedFields,
    /// Realized profit, zero for everything but matched sells
    pub profit: f64,
    pub disposal: Option<Disposal>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerTotals {
    /// Sum of all sell profits
    pub realized_profit: f64,
    pub buy_commissions: f64,
    /// Realized profit with buy commissions expensed as they occur
    pub net_profit: f64,
    pub deposits: f64,
    /// Cash sent back to the bank
    pub cash_withdrawals: f64,
    /// Coins sent out to other venues
    pub external_withdrawals: f64,
}

/// Non-fatal anomaly found during replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerWarning {
    /// A sell was larger than the open position and got clamped
    Oversell {
        index: usize,
        timestamp: String,
        asset: String,
        requested: f64,
        available: f64,
    },
}

impl std::fmt::Display for LedgerWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerWarning::Oversell {
                index,
                timestamp,
                asset,
                requested,
                available,
            } => write!(
                f,
                "record {} ({}): sold {} {} but only {} was open, clamped",
                index, timestamp, requested, asset, available
            ),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Data integrity error at record {index} ({timestamp}, {asset}): {source}")]
    DataIntegrity {
        index: usize,
        timestamp: String,
        asset: String,
        #[source]
        source: PositionError,
    },

    #[error(
        "Sell at record {index} ({timestamp}) exceeds open {asset} position: requested {requested}, available {available}"
    )]
    Oversell {
        index: usize,
        timestamp: String,
        asset: String,
        requested: f64,
        available: f64,
    },
}

/// Result of replaying a whole transaction history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerOutcome {
    /// One entry per input record, oldest first
    pub entries: Vec<LedgerEntry>,
    pub totals: LedgerTotals,
    /// Positions still open at the end of the history
    pub positions: PositionBook,
    pub warnings: Vec<LedgerWarning>,
}

impl LedgerOutcome {
    /// Re-derive realized profit from the per-entry annotations.
    pub fn annotated_profit(&self) -> f64 {
        self.entries.iter().fold(0.0, |sum, entry| sum + entry.profit)
    }
}

/// Replays transactions under weighted-average costing.
pub struct LedgerProcessor<'a> {
    config: &'a LedgerConfig,
    positions: PositionBook,
    totals: LedgerTotals,
    warnings: Vec<LedgerWarning>,
}

impl<'a> LedgerProcessor<'a> {
    pub fn new(config: &'a LedgerConfig) -> Self {
        Self {
            config,
            positions: PositionBook::new(),
            totals: LedgerTotals::default(),
            warnings: Vec::new(),
        }
    }

    pub fn positions(&self) -> &PositionBook {
        &self.positions
    }

    pub fn totals(&self) -> &LedgerTotals {
        &self.totals
    }

    /// Apply one record. Records must be fed oldest first.
    pub fn apply(
        &mut self,
        index: usize,
        transaction: Transaction,
    ) -> Result<LedgerEntry, LedgerError> {
        let kind = self.config.kind_labels.classify(&transaction.kind);
        let fields = transaction.normalized();

        let mut entry = LedgerEntry {
            index,
            transaction,
            kind,
            fields,
            profit: 0.0,
            disposal: None,
        };

        match kind {
            Some(TransactionKind::Buy) => self.buy(&entry)?,
            Some(TransactionKind::Sell) => {
                if let Some(disposal) = self.sell(&entry)? {
                    entry.profit = disposal.profit;
                    entry.disposal = Some(disposal);
                }
            }
            Some(TransactionKind::Deposit) => {
                self.totals.deposits += fields.amount;
            }
            Some(TransactionKind::Withdrawal) => {
                if entry.transaction.is_cash_withdrawal(&self.config.cash_marker) {
                    self.totals.cash_withdrawals += fields.amount;
                } else {
                    self.totals.external_withdrawals += fields.amount;
                }
            }
            None => {
                debug!(index, kind = %entry.transaction.kind, "Ignoring unrecognized transaction kind");
            }
        }

        Ok(entry)
    }

    fn buy(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let fields = &entry.fields;
        let tx = &entry.transaction;

        // Buy commissions are expensed immediately, not capitalized
        self.totals.net_profit -= fields.commission;
        self.totals.buy_commissions += fields.commission;

        self.positions
            .acquire(&tx.asset, fields.quantity, fields.unit_price, fields.commission)
            .map_err(|source| LedgerError::DataIntegrity {
                index: entry.index,
                timestamp: tx.timestamp.clone(),
                asset: tx.asset.clone(),
                source,
            })?;
        Ok(())
    }

    fn sell(&mut self, entry: &LedgerEntry) -> Result<Option<Disposal>, LedgerError> {
        let fields = &entry.fields;
        let tx = &entry.transaction;

        let Some(position) = self.positions.get(&tx.asset).copied() else {
            debug!(index = entry.index, asset = %tx.asset, "Sell without open position, no profit recorded");
            return Ok(None);
        };

        let mut quantity = fields.quantity;
        if quantity > position.quantity {
            match self.config.oversell_policy {
                OversellPolicy::Discard => {
                    debug!(
                        index = entry.index,
                        asset = %tx.asset,
                        requested = quantity,
                        available = position.quantity,
                        "Sell exceeds open position, shortfall discarded"
                    );
                }
                OversellPolicy::Clamp => {
                    let warning = LedgerWarning::Oversell {
                        index: entry.index,
                        timestamp: tx.timestamp.clone(),
                        asset: tx.asset.clone(),
                        requested: quantity,
                        available: position.quantity,
                    };
                    warn!("{}", warning);
                    self.warnings.push(warning);
                    quantity = position.quantity;
                }
                OversellPolicy::Reject => {
                    return Err(LedgerError::Oversell {
                        index: entry.index,
                        timestamp: tx.timestamp.clone(),
                        asset: tx.asset.clone(),
                        requested: quantity,
                        available: position.quantity,
                    });
                }
            }
        }

        let proceeds = quantity * fields.unit_price;
        let cost = quantity * position.average_unit_cost;
        let profit = proceeds - cost - fields.commission;
        if !profit.is_finite() {
            return Err(LedgerError::DataIntegrity {
                index: entry.index,
                timestamp: tx.timestamp.clone(),
                asset: tx.asset.clone(),
                source: PositionError::InvalidProfit(profit),
            });
        }

        self.totals.realized_profit += profit;
        self.totals.net_profit += profit;
        let closed_position = self.positions.reduce(&tx.asset, quantity);

        Ok(Some(Disposal {
            quantity,
            proceeds,
            cost,
            commission: fields.commission,
            profit,
            reported_amount: parse_cash_amount(&tx.amount, &self.config.cash_marker),
            closed_position,
        }))
    }

    pub fn finish(self, entries: Vec<LedgerEntry>) -> LedgerOutcome {
        LedgerOutcome {
            entries,
            totals: self.totals,
            positions: self.positions,
            warnings: self.warnings,
        }
    }
}

/// Replay a transaction history and compute profit, cash flows and open positions.
///
/// Records are taken in storage order as configured by `config.input_order`
/// and always replayed oldest first. Entry indexes refer to the input order.
pub fn process(
    transactions: Vec<Transaction>,
    config: &LedgerConfig,
) -> Result<LedgerOutcome, LedgerError> {
    let mut processor = LedgerProcessor::new(config);
    let mut entries = Vec::with_capacity(transactions.len());

    let mut indexed: Vec<(usize, Transaction)> = transactions.into_iter().enumerate().collect();
    if config.input_order == InputOrder::NewestFirst {
        indexed.reverse();
    }

    for (index, transaction) in indexed {
        entries.push(processor.apply(index, transaction)?);
    }

    Ok(processor.finish(entries))
}
