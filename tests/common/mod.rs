// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use avgledger::config::{InputOrder, LedgerConfig};
use avgledger::domain::Transaction;
use tempfile::TempDir;

/// Header row of the exchange trade-history export
pub const EXPORT_HEADER: &str = "체결시간,코인,마켓,종류,거래수량,거래단가,거래금액,수수료,정산금액";

/// Config for hand-written histories listed oldest first
pub fn oldest_first_config() -> LedgerConfig {
    LedgerConfig {
        input_order: InputOrder::OldestFirst,
        ..LedgerConfig::default()
    }
}

pub fn buy(asset: &str, quantity: &str, price: &str, commission: &str) -> Transaction {
    Transaction::new("2024-01-01 00:00", asset, "매수")
        .with_market("KRW")
        .with_quantity(quantity)
        .with_unit_price(price)
        .with_commission(commission)
}

pub fn sell(asset: &str, quantity: &str, price: &str, commission: &str) -> Transaction {
    Transaction::new("2024-01-01 00:00", asset, "매도")
        .with_market("KRW")
        .with_quantity(quantity)
        .with_unit_price(price)
        .with_commission(commission)
}

pub fn deposit(amount: &str) -> Transaction {
    Transaction::new("2024-01-01 00:00", "KRW", "입금")
        .with_quantity(amount)
        .with_amount(amount)
}

pub fn withdrawal(asset: &str, quantity: &str, amount: &str) -> Transaction {
    Transaction::new("2024-01-01 00:00", asset, "출금")
        .with_quantity(quantity)
        .with_amount(amount)
}

/// Write a trade-history CSV (header included) into a temporary directory
pub fn write_export(rows: &[&str]) -> Result<(PathBuf, TempDir)> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("trades.csv");

    let mut content = String::from(EXPORT_HEADER);
    content.push('\n');
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(&path, content)?;

    Ok((path, temp_dir))
}
