mod cmd;
mod core;
mod exchanges;
mod prices;
mod utils;

use clap::{Parser, Subcommand};

/// Realized capital gains and fees from cryptocurrency transactions
#[derive(Parser, Debug)]
#[command(name = "capgains", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert an exchange export to standard transactions
    Convert(cmd::convert::ConvertCommand),
    /// Merge standard transaction files into one, ordered by date
    Consolidate(cmd::consolidate::ConsolidateCommand),
    /// Match disposals against open lots and write the gains report
    Report(cmd::report::ReportCommand),
    /// Print the standard transaction format
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Convert(convert) => convert.exec(),
        Command::Consolidate(consolidate) => consolidate.exec(),
        Command::Report(report) => report.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
