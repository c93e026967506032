use serde::{Deserialize, Serialize};

use super::parse_lenient;

/// The transaction kinds that affect the ledger.
/// Records whose label maps to none of these are carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Acquire units of an asset
    Buy,
    /// Dispose of units of an asset, realizing profit
    Sell,
    /// Cash coming into the account
    Deposit,
    /// Cash or coins leaving the account
    Withdrawal,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 4] = [
        TransactionKind::Buy,
        TransactionKind::Sell,
        TransactionKind::Deposit,
        TransactionKind::Withdrawal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "buy",
            TransactionKind::Sell => "sell",
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single row of the exchange trade history, exactly as displayed.
/// Numeric fields stay as text; normalization belongs to the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Execution time, only used as an opaque label
    pub timestamp: String,
    /// Coin symbol (e.g. "BTC")
    pub asset: String,
    /// Market the trade happened on (e.g. "KRW"), display only
    pub market: String,
    /// Kind label as written by the exchange (e.g. "매수")
    pub kind: String,
    pub quantity: String,
    pub unit_price: String,
    pub amount: String,
    pub commission: String,
    pub settlement: String,
}

impl Transaction {
    pub fn new(
        timestamp: impl Into<String>,
        asset: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            asset: asset.into(),
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = market.into();
        self
    }

    pub fn with_quantity(mut self, quantity: impl Into<String>) -> Self {
        self.quantity = quantity.into();
        self
    }

    pub fn with_unit_price(mut self, unit_price: impl Into<String>) -> Self {
        self.unit_price = unit_price.into();
        self
    }

    pub fn with_amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = amount.into();
        self
    }

    pub fn with_commission(mut self, commission: impl Into<String>) -> Self {
        self.commission = commission.into();
        self
    }

    pub fn with_settlement(mut self, settlement: impl Into<String>) -> Self {
        self.settlement = settlement.into();
        self
    }

    /// Returns true if the quantity column is denominated in cash rather than coins.
    /// Withdrawals of cash go to the bank account, everything else leaves to another venue.
    pub fn is_cash_withdrawal(&self, cash_marker: &str) -> bool {
        !cash_marker.is_empty() && self.quantity.contains(cash_marker)
    }

    pub fn normalized(&self) -> NormalizedFields {
        NormalizedFields {
            quantity: parse_lenient(&self.quantity),
            unit_price: parse_lenient(&self.unit_price),
            amount: parse_lenient(&self.amount),
            commission: parse_lenient(&self.commission),
            settlement: parse_lenient(&self.settlement),
        }
    }
}

/// Numeric view of a [`Transaction`], every field extracted leniently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFields {
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
    pub commission: f64,
    pub settlement: f64,
}
