use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;
use tracing::{info, warn};

use crate::domain::Transaction;

/// Result of an import operation
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    /// Decoded records, in file order
    pub transactions: Vec<Transaction>,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

impl ImportResult {
    pub fn imported(&self) -> usize {
        self.transactions.len()
    }
}

/// Error that occurred during import
#[derive(Debug, Clone)]
pub struct ImportError {
    pub line: usize,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Field delimiter, ',' for CSV and '\t' for spreadsheet copies
    pub delimiter: u8,
    /// Abort on the first undecodable row instead of skipping it
    pub fail_fast: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            fail_fast: false,
        }
    }
}

/// One row of the exchange trade-history export.
/// Column names follow the exchange's Korean headers, English names are accepted too.
#[derive(Debug, Deserialize)]
struct TradeRow {
    #[serde(rename = "체결시간", alias = "timestamp")]
    timestamp: String,
    #[serde(rename = "코인", alias = "asset")]
    asset: String,
    #[serde(rename = "마켓", alias = "market", default)]
    market: String,
    #[serde(rename = "종류", alias = "kind")]
    kind: String,
    #[serde(rename = "거래수량", alias = "quantity", default)]
    quantity: String,
    #[serde(rename = "거래단가", alias = "unit_price", default)]
    unit_price: String,
    #[serde(rename = "거래금액", alias = "amount", default)]
    amount: String,
    #[serde(rename = "수수료", alias = "commission", default)]
    commission: String,
    #[serde(rename = "정산금액", alias = "settlement", default)]
    settlement: String,
}

impl From<TradeRow> for Transaction {
    fn from(row: TradeRow) -> Self {
        Transaction {
            timestamp: row.timestamp,
            asset: row.asset,
            market: row.market,
            kind: row.kind,
            quantity: row.quantity,
            unit_price: row.unit_price,
            amount: row.amount,
            commission: row.commission,
            settlement: row.settlement,
        }
    }
}

/// Read a trade-history export into raw transaction records.
///
/// Records keep the file's order; the ledger decides how to replay them.
pub fn import_transactions_csv<R: Read>(reader: R, options: &ImportOptions) -> Result<ImportResult> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .context("Failed to read CSV header row")?
        .clone();

    let mut result = ImportResult::default();

    for (line_num, record) in csv_reader.records().enumerate() {
        let line = line_num + 2; // +2 for header and 0-indexing

        let decoded = record
            .map_err(|e| format!("CSV parse error: {}", e))
            .and_then(|r| {
                r.deserialize::<TradeRow>(Some(&headers))
                    .map_err(|e| format!("Invalid row: {}", e))
            });

        match decoded {
            Ok(row) => result.transactions.push(row.into()),
            Err(error) => {
                if options.fail_fast {
                    anyhow::bail!("Line {}: {}", line, error);
                }
                warn!(line, %error, "Skipping undecodable row");
                result.skipped += 1;
                result.errors.push(ImportError { line, error });
            }
        }
    }

    info!(
        imported = result.imported(),
        skipped = result.skipped,
        "Trade history imported"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_korean_headers() {
        let data = "체결시간,코인,마켓,종류,거래수량,거래단가,거래금액,수수료,정산금액\n\
                    2024-01-02 10:00,BTC,KRW,매도,0.1 BTC,\"60,000,000 KRW\",\"6,000,000 KRW\",\"3,000 KRW\",\"5,997,000 KRW\"\n\
                    2024-01-01 10:00,BTC,KRW,매수,0.1 BTC,\"50,000,000 KRW\",\"5,000,000 KRW\",\"2,500 KRW\",\"5,002,500 KRW\"\n";

        let result = import_transactions_csv(data.as_bytes(), &ImportOptions::default()).unwrap();

        assert_eq!(result.imported(), 2);
        assert!(result.errors.is_empty());
        let first = &result.transactions[0];
        assert_eq!(first.kind, "매도");
        assert_eq!(first.unit_price, "60,000,000 KRW");
        assert_eq!(first.settlement, "5,997,000 KRW");
    }

    #[test]
    fn test_import_english_headers_with_missing_optional_columns() {
        let data = "timestamp,asset,kind,quantity,unit_price,commission\n\
                    t1,ETH,buy,2,100,1\n";

        let result = import_transactions_csv(data.as_bytes(), &ImportOptions::default()).unwrap();

        assert_eq!(result.imported(), 1);
        let tx = &result.transactions[0];
        assert_eq!(tx.asset, "ETH");
        assert_eq!(tx.market, "");
        assert_eq!(tx.amount, "");
    }

    #[test]
    fn test_import_tab_delimited() {
        let data = "timestamp\tasset\tkind\tquantity\n t1 \tXRP\tsell\t10\n";
        let options = ImportOptions {
            delimiter: b'\t',
            ..ImportOptions::default()
        };

        let result = import_transactions_csv(data.as_bytes(), &options).unwrap();
        assert_eq!(result.transactions[0].timestamp, "t1");
        assert_eq!(result.transactions[0].quantity, "10");
    }

    #[test]
    fn test_import_skips_bad_rows() {
        // Second data row is missing the required asset and kind columns
        let data = "timestamp,asset,kind\nt1,BTC,buy\nt2\nt3,ETH,sell\n";

        let result = import_transactions_csv(data.as_bytes(), &ImportOptions::default()).unwrap();

        assert_eq!(result.imported(), 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors[0].line, 3);
    }

    #[test]
    fn test_import_fail_fast() {
        let data = "timestamp,asset,kind\nt1,BTC,buy\nt2\n";
        let options = ImportOptions {
            fail_fast: true,
            ..ImportOptions::default()
        };

        let err = import_transactions_csv(data.as_bytes(), &options).unwrap_err();
        assert!(err.to_string().contains("Line 3"));
    }
}
