use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{LedgerSummary, PositionSummary};
use crate::domain::{LedgerEntry, LedgerOutcome, LedgerWarning};

/// Full report snapshot for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub summary: LedgerSummary,
    pub entries: Vec<LedgerEntry>,
    pub warnings: Vec<LedgerWarning>,
}

/// Exporter for converting a ledger run to various formats
pub struct Exporter<'a> {
    outcome: &'a LedgerOutcome,
}

impl<'a> Exporter<'a> {
    pub fn new(outcome: &'a LedgerOutcome) -> Self {
        Self { outcome }
    }

    /// Export the replayed records, oldest first, with their realized profit
    pub fn export_entries_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "timestamp",
            "asset",
            "market",
            "kind",
            "quantity",
            "unit_price",
            "amount",
            "commission",
            "settlement",
            "profit",
        ])?;

        let mut count = 0;
        for entry in &self.outcome.entries {
            let tx = &entry.transaction;
            csv_writer.write_record([
                tx.timestamp.as_str(),
                tx.asset.as_str(),
                tx.market.as_str(),
                tx.kind.as_str(),
                tx.quantity.as_str(),
                tx.unit_price.as_str(),
                tx.amount.as_str(),
                tx.commission.as_str(),
                tx.settlement.as_str(),
                entry.profit.to_string().as_str(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the positions still open at the end of the history
    pub fn export_positions_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "asset",
            "quantity",
            "average_unit_cost",
            "cost_basis",
            "accumulated_commission",
        ])?;

        let mut count = 0;
        for (asset, position) in self.outcome.positions.iter() {
            let summary = PositionSummary::new(asset, position);
            csv_writer.write_record(&[
                summary.asset,
                summary.quantity.to_string(),
                summary.average_unit_cost.to_string(),
                summary.cost_basis.to_string(),
                summary.accumulated_commission.to_string(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the whole run as a JSON snapshot
    pub fn export_full_json<W: Write>(&self, mut writer: W) -> Result<ReportSnapshot> {
        let snapshot = ReportSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            summary: LedgerSummary::from_outcome(self.outcome),
            entries: self.outcome.entries.clone(),
            warnings: self.outcome.warnings.clone(),
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
