//! Convert command - exchange exports to standard transactions

use crate::cmd::write_transactions;
use crate::core::Transaction;
use crate::exchanges::Exchange;
use crate::prices::{CoinbaseSpot, PriceSource, PriceTable, ValueAdapter};
use anyhow::Context;
use clap::Args;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ConvertCommand {
    /// Exchange the export was downloaded from
    #[arg(short, long, value_enum)]
    exchange: Exchange,

    /// Exchange CSV export
    #[arg(short, long)]
    input_file: PathBuf,

    /// Where to write the standard transactions
    #[arg(long, default_value = "standard_transactions.csv")]
    export_file: PathBuf,

    /// Price missing values from a `date,currency,price` CSV instead of the Coinbase API
    #[arg(short, long, conflicts_with = "offline")]
    prices: Option<PathBuf>,

    /// Do not fetch prices; only USD amounts are valued
    #[arg(long)]
    offline: bool,
}

impl ConvertCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let file = File::open(&self.input_file)
            .with_context(|| format!("opening {}", self.input_file.display()))?;
        let transactions = self
            .exchange
            .convert(BufReader::new(file))
            .with_context(|| format!("converting {:?} export {}", self.exchange, self.input_file.display()))?;
        log::info!("Converted {} transactions", transactions.len());

        let transactions = if let Some(prices) = &self.prices {
            let file = File::open(prices).with_context(|| format!("opening {}", prices.display()))?;
            fill_values(PriceTable::read_csv(BufReader::new(file))?, transactions)?
        } else if self.offline {
            fill_values(PriceTable::default(), transactions)?
        } else {
            fill_values(CoinbaseSpot::default(), transactions)?
        };

        write_transactions(&self.export_file, &transactions)
    }
}

fn fill_values<S: PriceSource>(source: S, transactions: Vec<Transaction>) -> anyhow::Result<Vec<Transaction>> {
    let mut adapter = ValueAdapter::new(source);
    Ok(adapter.fill_values(transactions)?)
}
