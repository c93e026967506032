use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{stdin, stdout, Read, Write};

use crate::application::{Analysis, LedgerService, LedgerSummary};
use crate::config::{InputOrder, LedgerConfig, OversellPolicy};
use crate::domain::format_amount;
use crate::io::{Exporter, ImportOptions};

/// Avgledger - weighted-average profit ledger for exchange trade histories
#[derive(Parser)]
#[command(name = "avgledger")]
#[command(about = "Compute realized profit and cash flows from an exchange trade-history export")]
#[command(version)]
pub struct Cli {
    /// Token marking cash amounts (overrides LEDGER_CASH_MARKER)
    #[arg(long, global = true)]
    pub cash_marker: Option<String>,

    /// Oversold positions: discard, clamp, reject (overrides LEDGER_OVERSELL_POLICY)
    #[arg(long, global = true)]
    pub oversell: Option<String>,

    /// Input rows are already oldest first (default: newest first, as exported)
    #[arg(long, global = true)]
    pub oldest_first: bool,

    /// Input is tab separated instead of comma separated
    #[arg(long, global = true)]
    pub tsv: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show realized profit, cash flows and open positions
    Report {
        /// Trade history file (stdin if omitted)
        input: Option<String>,

        /// Also list every record with its realized profit
        #[arg(long)]
        entries: bool,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show positions still open at the end of the history
    Positions {
        /// Trade history file (stdin if omitted)
        input: Option<String>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Export the processed ledger to CSV or JSON
    Export {
        /// What to export: entries, positions, full
        export_type: String,

        /// Trade history file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Validate a trade history without printing the report
    Check {
        /// Trade history file (stdin if omitted)
        input: Option<String>,
    },
}

impl Cli {
    /// Resolve the ledger configuration: environment first, flags on top.
    pub fn ledger_config(&self) -> Result<LedgerConfig> {
        let mut config = LedgerConfig::from_env().context("Invalid LEDGER_* environment")?;

        if let Some(marker) = &self.cash_marker {
            if marker.trim().is_empty() {
                anyhow::bail!("Cash marker must not be empty");
            }
            config.cash_marker = marker.trim().to_string();
        }

        if let Some(policy) = &self.oversell {
            config.oversell_policy = OversellPolicy::from_str(policy).with_context(|| {
                format!(
                    "Invalid oversell policy '{}'. Valid policies: discard, clamp, reject",
                    policy
                )
            })?;
        }

        if self.oldest_first {
            config.input_order = InputOrder::OldestFirst;
        }

        Ok(config)
    }

    fn import_options(&self) -> ImportOptions {
        ImportOptions {
            delimiter: if self.tsv { b'\t' } else { b',' },
            ..ImportOptions::default()
        }
    }

    pub fn run(self) -> Result<()> {
        let service = LedgerService::new(self.ledger_config()?);
        let options = self.import_options();

        match &self.command {
            Commands::Report {
                input,
                entries,
                format,
            } => {
                let analysis = analyze(&service, input.as_deref(), &options)?;
                run_report_command(&analysis, *entries, format)?;
            }

            Commands::Positions { input, format } => {
                let analysis = analyze(&service, input.as_deref(), &options)?;
                run_positions_command(&analysis, format)?;
            }

            Commands::Export {
                export_type,
                input,
                output,
            } => {
                let analysis = analyze(&service, input.as_deref(), &options)?;
                run_export_command(&analysis, export_type, output.as_deref())?;
            }

            Commands::Check { input } => {
                let analysis = analyze(&service, input.as_deref(), &options)?;
                run_check_command(&analysis);
            }
        }

        Ok(())
    }
}

fn analyze(service: &LedgerService, input: Option<&str>, options: &ImportOptions) -> Result<Analysis> {
    // Determine input reader
    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    let source = input.unwrap_or("<stdin>");
    let analysis = service
        .analyze_csv(reader, source, options)
        .with_context(|| format!("Failed to process {}", source))?;

    if !analysis.import_errors.is_empty() {
        eprintln!(
            "Warning: {} row(s) could not be read and were skipped (run `check` for details)",
            analysis.import_errors.len()
        );
    }

    Ok(analysis)
}

fn run_report_command(analysis: &Analysis, show_entries: bool, format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&analysis.summary)?);
        }
        "table" => {
            if show_entries {
                print_entries(analysis);
                println!();
            }
            print_summary(&analysis.summary);
        }
        _ => {
            anyhow::bail!("Invalid format '{}'. Valid formats: table, json", format);
        }
    }
    Ok(())
}

fn print_entries(analysis: &Analysis) {
    println!(
        "{:<20} {:<8} {:<6} {:<10} {:>18} {:>16} {:>16} {:>12} {:>16}",
        "TIME", "COIN", "MARKET", "KIND", "QUANTITY", "PRICE", "AMOUNT", "FEE", "PROFIT"
    );
    println!("{}", "-".repeat(132));

    for entry in &analysis.outcome.entries {
        let tx = &entry.transaction;
        println!(
            "{:<20} {:<8} {:<6} {:<10} {:>18} {:>16} {:>16} {:>12} {:>16}",
            truncate(&tx.timestamp, 20),
            truncate(&tx.asset, 8),
            truncate(&tx.market, 6),
            truncate(&tx.kind, 10),
            truncate(&tx.quantity, 18),
            truncate(&tx.unit_price, 16),
            truncate(&tx.amount, 16),
            truncate(&tx.commission, 12),
            format_amount(entry.profit, 2)
        );
    }
}

fn print_summary(summary: &LedgerSummary) {
    let totals = &summary.totals;

    println!("Ledger Summary ({} records)", summary.record_count);
    println!();
    println!("  Net profit:            {:>20}", format_amount(totals.net_profit, 2));
    println!("  Realized profit:       {:>20}", format_amount(totals.realized_profit, 2));
    println!("  Buy commissions:       {:>20}", format_amount(totals.buy_commissions, 2));
    println!("  Deposits:              {:>20}", format_amount(totals.deposits, 2));
    println!("  Cash withdrawals:      {:>20}", format_amount(totals.cash_withdrawals, 2));
    println!("  External withdrawals:  {:>20}", format_amount(totals.external_withdrawals, 2));

    if summary.unmatched_sells > 0 || summary.ignored_records > 0 || summary.warning_count > 0 {
        println!();
        println!("  Unmatched sells:       {:>20}", summary.unmatched_sells);
        println!("  Ignored records:       {:>20}", summary.ignored_records);
        println!("  Oversell warnings:     {:>20}", summary.warning_count);
    }

    println!();
    print_positions(summary);
    println!();
    println!("  Open cost basis:       {:>20}", format_amount(summary.open_cost_basis, 2));
    println!("  Remaining principal:   {:>20}", format_amount(summary.remaining_principal, 2));
}

fn print_positions(summary: &LedgerSummary) {
    if summary.positions.is_empty() {
        println!("No open positions.");
        return;
    }

    println!(
        "{:<10} {:>18} {:>18} {:>20}",
        "COIN", "QUANTITY", "AVG COST", "COST BASIS"
    );
    println!("{}", "-".repeat(69));
    for position in &summary.positions {
        println!(
            "{:<10} {:>18} {:>18} {:>20}",
            truncate(&position.asset, 10),
            format_amount(position.quantity, 4),
            format_amount(position.average_unit_cost, 2),
            format_amount(position.cost_basis, 2)
        );
    }
}

fn run_positions_command(analysis: &Analysis, format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&analysis.summary.positions)?);
        }
        "csv" => {
            Exporter::new(&analysis.outcome).export_positions_csv(stdout())?;
        }
        "table" => print_positions(&analysis.summary),
        _ => {
            anyhow::bail!("Invalid format '{}'. Valid formats: table, json, csv", format);
        }
    }
    Ok(())
}

fn run_export_command(analysis: &Analysis, export_type: &str, output: Option<&str>) -> Result<()> {
    let exporter = Exporter::new(&analysis.outcome);

    // Determine output writer
    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "entries" => {
            let count = exporter.export_entries_csv(writer)?;
            if output.is_some() {
                eprintln!("Exported {} entries", count);
            }
        }
        "positions" => {
            let count = exporter.export_positions_csv(writer)?;
            if output.is_some() {
                eprintln!("Exported {} positions", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer)?;
            if output.is_some() {
                eprintln!(
                    "Exported full report: {} entries, {} open positions",
                    snapshot.entries.len(),
                    snapshot.summary.positions.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: entries, positions, full",
                export_type
            );
        }
    }

    Ok(())
}

fn run_check_command(analysis: &Analysis) {
    let summary = &analysis.summary;

    println!("Check complete");
    println!("  Records:          {}", summary.record_count);
    println!("  Unreadable rows:  {}", analysis.import_errors.len());
    println!("  Ignored records:  {}", summary.ignored_records);
    println!("  Unmatched sells:  {}", summary.unmatched_sells);
    println!("  Warnings:         {}", summary.warning_count);

    if !analysis.import_errors.is_empty() {
        println!("\nUnreadable rows:");
        for error in analysis.import_errors.iter().take(10) {
            println!("  Line {}: {}", error.line, error.error);
        }
        if analysis.import_errors.len() > 10 {
            println!("  ... and {} more errors", analysis.import_errors.len() - 10);
        }
    }

    if !analysis.outcome.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &analysis.outcome.warnings {
            println!("  {}", warning);
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("BTC", 8), "BTC");
        assert_eq!(truncate("2024-01-01 09:00:00.123", 10), "2024-01...");
        assert_eq!(truncate("비트코인캐시", 5), "비트...");
    }

    #[test]
    fn test_cli_flags_override_config() {
        let cli = Cli::parse_from([
            "avgledger",
            "--cash-marker",
            "USD",
            "--oversell",
            "clamp",
            "--oldest-first",
            "report",
            "trades.csv",
        ]);

        let config = cli.ledger_config().unwrap();
        assert_eq!(config.cash_marker, "USD");
        assert_eq!(config.oversell_policy, OversellPolicy::Clamp);
        assert_eq!(config.input_order, InputOrder::OldestFirst);
        assert!(matches!(cli.command, Commands::Report { ref input, .. } if input.as_deref() == Some("trades.csv")));
    }

    #[test]
    fn test_cli_rejects_unknown_oversell_policy() {
        let cli = Cli::parse_from(["avgledger", "--oversell", "short", "check"]);
        assert!(cli.ledger_config().is_err());
    }

    const WORKED_EXAMPLE: &str = "timestamp,asset,market,kind,quantity,unit_price,amount,commission\n\
                                  t1,BTC,KRW,buy,10,100,1000,5\n\
                                  t2,BTC,KRW,buy,10,200,2000,5\n\
                                  t3,BTC,KRW,sell,5,300,1500,2\n";

    fn path_arg(path: &std::path::Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_export_entries_command_writes_profit_column() {
        let temp = tempfile::TempDir::new().unwrap();
        let input = temp.path().join("trades.csv");
        let output = temp.path().join("entries.csv");
        std::fs::write(&input, WORKED_EXAMPLE).unwrap();

        Cli::parse_from([
            "avgledger".to_string(),
            "--oldest-first".to_string(),
            "export".to_string(),
            "entries".to_string(),
            "-i".to_string(),
            path_arg(&input),
            "-o".to_string(),
            path_arg(&output),
        ])
        .run()
        .unwrap();

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[9], "profit");
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(&records[0][0], "t1");
        assert_eq!(&records[0][9], "0");
        assert_eq!(&records[2][9], "748");
    }

    #[test]
    fn test_export_full_command_writes_snapshot() {
        let temp = tempfile::TempDir::new().unwrap();
        let input = temp.path().join("trades.csv");
        let output = temp.path().join("report.json");
        std::fs::write(&input, WORKED_EXAMPLE).unwrap();

        Cli::parse_from([
            "avgledger".to_string(),
            "--oldest-first".to_string(),
            "export".to_string(),
            "full".to_string(),
            "--input".to_string(),
            path_arg(&input),
            "--output".to_string(),
            path_arg(&output),
        ])
        .run()
        .unwrap();

        let snapshot: crate::io::ReportSnapshot =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(snapshot.entries.len(), 3);
        assert_eq!(snapshot.summary.totals.net_profit, 738.0);
        assert_eq!(snapshot.summary.positions.len(), 1);
    }

    #[test]
    fn test_commands_report_missing_input_and_bad_arguments() {
        let temp = tempfile::TempDir::new().unwrap();
        let input = temp.path().join("trades.csv");
        std::fs::write(&input, WORKED_EXAMPLE).unwrap();

        let missing = path_arg(&temp.path().join("missing.csv"));
        let err = Cli::parse_from(["avgledger", "check", missing.as_str()])
            .run()
            .unwrap_err();
        assert!(err.to_string().contains("Failed to open input file"));

        let input = path_arg(&input);
        let output = path_arg(&temp.path().join("out.csv"));
        let err = Cli::parse_from([
            "avgledger",
            "export",
            "ledger",
            "-i",
            input.as_str(),
            "-o",
            output.as_str(),
        ])
        .run()
        .unwrap_err();
        assert!(err.to_string().contains("Invalid export type"));

        let err = Cli::parse_from(["avgledger", "report", input.as_str(), "--format", "xml"])
            .run()
            .unwrap_err();
        assert!(err.to_string().contains("Invalid format"));

        Cli::parse_from(["avgledger", "--oldest-first", "check", input.as_str()])
            .run()
            .unwrap();
    }

    #[test]
    fn test_cli_tsv_delimiter() {
        let cli = Cli::parse_from(["avgledger", "--tsv", "check", "trades.tsv"]);
        assert_eq!(cli.import_options().delimiter, b'\t');
    }
}
