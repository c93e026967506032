use serde::{Deserialize, Serialize};

use crate::domain::{LedgerOutcome, LedgerTotals, Position, TransactionKind};

/// Closing report of a ledger run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub totals: LedgerTotals,
    /// Cost of every unit still held, at average cost
    pub open_cost_basis: f64,
    /// Open cost basis minus coins sent to other venues
    pub remaining_principal: f64,
    pub positions: Vec<PositionSummary>,
    pub record_count: usize,
    pub sell_count: usize,
    /// Sells with no open position to match against
    pub unmatched_sells: usize,
    /// Records whose kind label is not recognized
    pub ignored_records: usize,
    pub warning_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub asset: String,
    pub quantity: f64,
    pub average_unit_cost: f64,
    pub cost_basis: f64,
    pub accumulated_commission: f64,
}

impl PositionSummary {
    pub fn new(asset: &str, position: &Position) -> Self {
        Self {
            asset: asset.to_string(),
            quantity: position.quantity,
            average_unit_cost: position.average_unit_cost,
            cost_basis: position.cost_basis(),
            accumulated_commission: position.accumulated_commission,
        }
    }
}

impl LedgerSummary {
    pub fn from_outcome(outcome: &LedgerOutcome) -> Self {
        let sells = outcome
            .entries
            .iter()
            .filter(|e| e.kind == Some(TransactionKind::Sell));
        let sell_count = sells.clone().count();
        let unmatched_sells = sells.filter(|e| e.disposal.is_none()).count();

        let open_cost_basis = outcome.positions.cost_basis_total();

        Self {
            totals: outcome.totals,
            open_cost_basis,
            remaining_principal: open_cost_basis - outcome.totals.external_withdrawals,
            positions: outcome
                .positions
                .iter()
                .map(|(asset, position)| PositionSummary::new(asset, position))
                .collect(),
            record_count: outcome.entries.len(),
            sell_count,
            unmatched_sells,
            ignored_records: outcome.entries.iter().filter(|e| e.kind.is_none()).count(),
            warning_count: outcome.warnings.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InputOrder, LedgerConfig};
    use crate::domain::{process, Transaction};

    #[test]
    fn test_summary_from_outcome() {
        let config = LedgerConfig {
            input_order: InputOrder::OldestFirst,
            ..LedgerConfig::default()
        };
        let transactions = vec![
            Transaction::new("t1", "BTC", "매수")
                .with_quantity("2")
                .with_unit_price("100"),
            Transaction::new("t2", "ETH", "매도")
                .with_quantity("1")
                .with_unit_price("50"),
            Transaction::new("t3", "BTC", "매도")
                .with_quantity("1")
                .with_unit_price("120"),
            Transaction::new("t4", "XRP", "출금")
                .with_quantity("10 XRP")
                .with_amount("30"),
            Transaction::new("t5", "BTC", "스테이킹"),
        ];
        let outcome = process(transactions, &config).unwrap();

        let summary = LedgerSummary::from_outcome(&outcome);

        assert_eq!(summary.record_count, 5);
        assert_eq!(summary.sell_count, 2);
        assert_eq!(summary.unmatched_sells, 1);
        assert_eq!(summary.ignored_records, 1);
        assert_eq!(summary.open_cost_basis, 100.0);
        assert_eq!(summary.remaining_principal, 70.0);
        assert_eq!(
            summary.positions,
            vec![PositionSummary {
                asset: "BTC".to_string(),
                quantity: 1.0,
                average_unit_cost: 100.0,
                cost_basis: 100.0,
                accumulated_commission: 0.0,
            }]
        );
        assert_eq!(summary.totals.realized_profit, 20.0);
    }
}
