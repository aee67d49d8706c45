//! Consolidate command - merge standard transaction files

use crate::cmd::{read_transactions, write_transactions};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ConsolidateCommand {
    /// Standard transaction files to merge
    #[arg(short, long, num_args = 1.., required = true)]
    input_files: Vec<PathBuf>,

    /// Where to write the merged transactions
    #[arg(long, default_value = "consolidated_standard_exchange.csv")]
    export_file: PathBuf,
}

impl ConsolidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let mut transactions = Vec::new();
        for path in &self.input_files {
            transactions.extend(read_transactions(path)?);
        }
        // stable, so same-time rows keep their file order
        transactions.sort_by_key(|tx| tx.date);
        write_transactions(&self.export_file, &transactions)
    }
}
