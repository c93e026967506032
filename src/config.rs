use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DEFAULT_CASH_MARKER, TransactionKind};

/// Ledger processing options. The defaults reproduce the behaviour expected for
/// a Korean exchange trade-history export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub kind_labels: KindLabels,
    /// Token marking an amount as cash rather than coins
    pub cash_marker: String,
    pub oversell_policy: OversellPolicy,
    pub input_order: InputOrder,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            kind_labels: KindLabels::default(),
            cash_marker: DEFAULT_CASH_MARKER.to_string(),
            oversell_policy: OversellPolicy::Discard,
            input_order: InputOrder::NewestFirst,
        }
    }
}

/// What to do when a sell exceeds the open quantity of its asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversellPolicy {
    /// Realize profit on the full sell quantity and drop the shortfall
    Discard,
    /// Realize profit on the open quantity only and record a warning
    Clamp,
    /// Abort processing with an error
    Reject,
}

impl OversellPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OversellPolicy::Discard => "discard",
            OversellPolicy::Clamp => "clamp",
            OversellPolicy::Reject => "reject",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "discard" => Some(OversellPolicy::Discard),
            "clamp" => Some(OversellPolicy::Clamp),
            "reject" => Some(OversellPolicy::Reject),
            _ => None,
        }
    }
}

impl std::fmt::Display for OversellPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage order of the incoming records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputOrder {
    /// Most recent record first, as exported by the exchange
    NewestFirst,
    OldestFirst,
}

impl InputOrder {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "newest-first" | "newest" => Some(InputOrder::NewestFirst),
            "oldest-first" | "oldest" => Some(InputOrder::OldestFirst),
            _ => None,
        }
    }
}

/// Accepted labels for each transaction kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindLabels {
    pub buy: Vec<String>,
    pub sell: Vec<String>,
    pub deposit: Vec<String>,
    pub withdrawal: Vec<String>,
}

impl Default for KindLabels {
    fn default() -> Self {
        fn labels(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            buy: labels(&["매수", "buy"]),
            sell: labels(&["매도", "sell"]),
            deposit: labels(&["입금", "deposit"]),
            withdrawal: labels(&["출금", "withdrawal"]),
        }
    }
}

impl KindLabels {
    pub fn labels_for(&self, kind: TransactionKind) -> &[String] {
        match kind {
            TransactionKind::Buy => &self.buy,
            TransactionKind::Sell => &self.sell,
            TransactionKind::Deposit => &self.deposit,
            TransactionKind::Withdrawal => &self.withdrawal,
        }
    }

    /// Map a label to its kind. Matching ignores surrounding whitespace and ASCII case.
    pub fn classify(&self, label: &str) -> Option<TransactionKind> {
        let label = label.trim();
        TransactionKind::ALL.into_iter().find(|kind| {
            self.labels_for(*kind)
                .iter()
                .any(|accepted| accepted.eq_ignore_ascii_case(label))
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    /// Build a config from `LEDGER_*` variables, falling back to defaults for unset keys.
    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = LedgerConfig::default();

        if let Some(marker) = env_map.get("LEDGER_CASH_MARKER") {
            let marker = marker.trim();
            if marker.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "LEDGER_CASH_MARKER".to_string(),
                    "must not be empty".to_string(),
                ));
            }
            config.cash_marker = marker.to_string();
        }

        if let Some(policy) = env_map.get("LEDGER_OVERSELL_POLICY") {
            config.oversell_policy = OversellPolicy::from_str(policy).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "LEDGER_OVERSELL_POLICY".to_string(),
                    format!("must be discard, clamp, or reject, got {}", policy),
                )
            })?;
        }

        if let Some(order) = env_map.get("LEDGER_INPUT_ORDER") {
            config.input_order = InputOrder::from_str(order).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "LEDGER_INPUT_ORDER".to_string(),
                    format!("must be newest-first or oldest-first, got {}", order),
                )
            })?;
        }

        let label_keys = [
            ("LEDGER_BUY_LABELS", &mut config.kind_labels.buy),
            ("LEDGER_SELL_LABELS", &mut config.kind_labels.sell),
            ("LEDGER_DEPOSIT_LABELS", &mut config.kind_labels.deposit),
            ("LEDGER_WITHDRAWAL_LABELS", &mut config.kind_labels.withdrawal),
        ];
        for (key, target) in label_keys {
            if let Some(value) = env_map.get(key) {
                *target = parse_label_list(key, value)?;
            }
        }

        Ok(config)
    }
}

fn parse_label_list(key: &str, value: &str) -> Result<Vec<String>, ConfigError> {
    let labels: Vec<String> = value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if labels.is_empty() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must list at least one label".to_string(),
        ));
    }
    Ok(labels)
}
