//! Report command - realized gains and fees from standard transactions

use crate::cmd::read_transactions;
use crate::core::{calculate_gains, Algorithm, GainReport, Totals};
use anyhow::Context;
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct ReportCommand {
    /// Date-ordered standard transactions, e.g. the output of `consolidate`
    #[arg(short, long)]
    input_file: PathBuf,

    /// Where to write the open lots and summary
    #[arg(long, default_value = "tax_returns.csv")]
    export_file: PathBuf,

    /// Lot selection: FIHO/HIFO (highest value first), FIFO or LIFO
    #[arg(short, long, default_value = "FIHO")]
    algorithm: Algorithm,

    /// Also write every lot match to this CSV
    #[arg(long)]
    matches: Option<PathBuf>,

    /// Print the summary as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "")]
    label: &'static str,
    #[tabled(rename = "USD")]
    amount: String,
}

#[derive(Debug, Serialize)]
struct SummaryJson<'a> {
    algorithm: String,
    #[serde(flatten)]
    totals: &'a Totals,
    short_term_gain: Decimal,
    long_term_gain: Decimal,
    open_lots: usize,
    matches: usize,
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let transactions = read_transactions(&self.input_file)?;
        let report = calculate_gains(transactions, self.algorithm)
            .context("calculating gains, no report written")?;

        let file = File::create(&self.export_file)
            .with_context(|| format!("creating {}", self.export_file.display()))?;
        report.write_csv(BufWriter::new(file))?;
        log::info!("Wrote report to {}", self.export_file.display());

        if let Some(path) = &self.matches {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            report.write_matches_csv(BufWriter::new(file))?;
        }

        if self.json {
            self.print_json(&report)
        } else {
            self.print_summary(&report);
            Ok(())
        }
    }

    fn print_summary(&self, report: &GainReport) {
        println!();
        println!("GAINS SUMMARY ({})", self.algorithm);
        println!();
        let rows: Vec<SummaryRow> = report
            .summary_rows()
            .into_iter()
            .map(|(label, amount)| SummaryRow {
                label,
                amount: format_usd(amount),
            })
            .collect();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
        println!();
        println!("Open lots: {}", report.open_lots.len());
    }

    fn print_json(&self, report: &GainReport) -> anyhow::Result<()> {
        let summary = SummaryJson {
            algorithm: self.algorithm.to_string(),
            totals: &report.totals,
            short_term_gain: report.totals.short_term_gain(),
            long_term_gain: report.totals.long_term_gain(),
            open_lots: report.open_lots.len(),
            matches: report.matches.len(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        Ok(())
    }
}

fn format_usd(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}
