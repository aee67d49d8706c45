pub mod binance;
pub mod coinbase;
pub mod gdax;
pub mod gemini;

use crate::core::{Transaction, TransactionError};
use crate::utils::parse_decimal;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error("unknown {exchange} transaction type '{kind}'")]
    UnknownType { exchange: &'static str, kind: String },
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
    #[error("no supported quote currency in market '{0}'")]
    UnknownMarket(String),
}

/// Exchange export formats that can be converted to standard transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Exchange {
    Gdax,
    Gemini,
    Coinbase,
    Binance,
}

impl Exchange {
    pub fn convert<R: Read>(self, reader: R) -> Result<Vec<Transaction>, ExchangeError> {
        match self {
            Exchange::Gdax => gdax::import_transactions(reader),
            Exchange::Gemini => gemini::import_transactions(reader),
            Exchange::Coinbase => coinbase::import_transactions(reader),
            Exchange::Binance => binance::import_transactions(reader),
        }
    }
}

/// A single exchange row, which may expand to several transactions (or none).
pub trait IntoTransactions {
    fn into_transactions(self) -> Result<Vec<Transaction>, ExchangeError>;
}

pub fn csv_to_transactions<Record, R>(reader: R) -> Result<Vec<Transaction>, ExchangeError>
where
    Record: DeserializeOwned + IntoTransactions,
    R: Read,
{
    let mut rdr = csv_reader(reader);
    read_records::<Record, R>(&mut rdr)
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn read_records<Record, R>(rdr: &mut csv::Reader<R>) -> Result<Vec<Transaction>, ExchangeError>
where
    Record: DeserializeOwned + IntoTransactions,
    R: Read,
{
    let records = rdr
        .deserialize()
        .collect::<Result<Vec<Record>, _>>()?;
    log::info!("Read {} csv records", records.len());
    let mut transactions = Vec::new();
    for record in records {
        transactions.extend(record.into_transactions()?);
    }
    Ok(transactions)
}

fn amount(text: &str) -> Result<Decimal, ExchangeError> {
    parse_decimal(text).ok_or_else(|| ExchangeError::InvalidAmount(text.to_string()))
}

/// `|total / amount|`, unless the amount is zero.
fn unit_value(total: Decimal, amount: Decimal) -> Option<Decimal> {
    total.checked_div(amount).map(|v| v.abs())
}
