pub mod consolidate;
pub mod convert;
pub mod report;
pub mod schema;

use crate::core::{transaction, Transaction};
use anyhow::Context;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Read a standard transactions CSV.
pub fn read_transactions(path: &Path) -> anyhow::Result<Vec<Transaction>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let transactions = transaction::read_csv(BufReader::new(file))
        .with_context(|| format!("reading {}", path.display()))?;
    log::info!("Read {} transactions from {}", transactions.len(), path.display());
    Ok(transactions)
}

/// Write a standard transactions CSV, replacing any existing file.
pub fn write_transactions(path: &Path, transactions: &[Transaction]) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    transaction::write_csv(transactions, file)?;
    log::info!("Wrote {} transactions to {}", transactions.len(), path.display());
    Ok(())
}
