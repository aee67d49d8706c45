use crate::utils::{parse_decimal, CsvColumn};
use capgains_derive::CsvColumns;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Accepted textual date formats, tried in order.
///
/// A single space in a format matches any run of whitespace, so exports with
/// `10/14/17  23:13` parse as well.
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%y %H:%M"];

const OUTPUT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("{0} is not a valid transaction type")]
    InvalidTransactionType(String),
    #[error("none of the accepted date formats match '{0}'")]
    DateFormat(String),
    #[error("invalid {field} '{text}'")]
    InvalidNumber { field: &'static str, text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Trade,
    Transfer,
    Fee,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Trade => "trade",
            TransactionType::Transfer => "transfer",
            TransactionType::Fee => "fee",
        }
    }
}

impl FromStr for TransactionType {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trade" => Ok(TransactionType::Trade),
            "transfer" => Ok(TransactionType::Transfer),
            "fee" => Ok(TransactionType::Fee),
            _ => Err(TransactionError::InvalidTransactionType(s.to_string())),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized currency movement.
///
/// `amount` is signed: positive acquires, negative disposes. `value` is the
/// per-unit USD price, `None` when no price could be found for the date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub date: NaiveDateTime,
    pub transaction_type: TransactionType,
    pub currency: String,
    pub amount: Decimal,
    pub value: Option<Decimal>,
}

impl Transaction {
    pub fn new(
        date: NaiveDateTime,
        transaction_type: TransactionType,
        currency: &str,
        amount: Decimal,
        value: Option<Decimal>,
    ) -> Self {
        Transaction {
            date,
            transaction_type,
            currency: normalize_currency(currency),
            amount,
            value: value.map(|v| v.abs()),
        }
    }

    /// Build a transaction from its text fields, as found in a standard CSV.
    /// An empty `value` leaves the value unset.
    pub fn parse(
        date: &str,
        transaction_type: &str,
        currency: &str,
        amount: &str,
        value: &str,
    ) -> Result<Self, TransactionError> {
        let transaction_type = transaction_type.parse()?;
        let date = parse_date(date)?;
        let amount = parse_decimal(amount).ok_or_else(|| TransactionError::InvalidNumber {
            field: "amount",
            text: amount.to_string(),
        })?;
        let value = if value.trim().is_empty() {
            None
        } else {
            Some(
                parse_decimal(value).ok_or_else(|| TransactionError::InvalidNumber {
                    field: "value",
                    text: value.to_string(),
                })?,
            )
        };
        Ok(Transaction::new(date, transaction_type, currency, amount, value))
    }

    /// Disposals (including zero amounts) and all fees are taxable.
    pub fn is_taxable(&self) -> bool {
        self.amount <= Decimal::ZERO || self.is_fee()
    }

    pub fn is_fee(&self) -> bool {
        self.transaction_type == TransactionType::Fee
    }

    pub fn with_amount(&self, amount: Decimal) -> Self {
        Transaction {
            amount,
            ..self.clone()
        }
    }

    pub fn with_value(self, value: Option<Decimal>) -> Self {
        Transaction {
            value: value.map(|v| v.abs()),
            ..self
        }
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDateTime, TransactionError> {
    let trimmed = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| TransactionError::DateFormat(s.to_string()))
}

pub fn normalize_currency(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Row of the standard transactions CSV.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, CsvColumns)]
pub struct TransactionRecord {
    /// Date and time (YYYY-MM-DD HH:MM:SS, YYYY-MM-DDTHH:MM:SS or MM/DD/YY HH:MM)
    #[serde(rename = "Date")]
    pub date: String,
    /// trade, transfer or fee (case-insensitive)
    #[serde(rename = "Transaction Type")]
    pub transaction_type: String,
    /// Currency code, e.g. btc
    #[serde(rename = "Currency")]
    pub currency: String,
    /// Signed quantity: positive acquires, negative disposes
    #[serde(rename = "Amount")]
    pub amount: String,
    /// Per-unit USD price, empty when unknown
    #[serde(rename = "Value", default)]
    pub value: Option<String>,
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = TransactionError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        Transaction::parse(
            &record.date,
            &record.transaction_type,
            &record.currency,
            &record.amount,
            record.value.as_deref().unwrap_or_default(),
        )
    }
}

impl From<&Transaction> for TransactionRecord {
    fn from(tx: &Transaction) -> Self {
        TransactionRecord {
            date: tx.date.format(OUTPUT_DATE_FORMAT).to_string(),
            transaction_type: tx.transaction_type.to_string(),
            currency: tx.currency.clone(),
            amount: tx.amount.normalize().to_string(),
            value: tx.value.map(|v| v.normalize().to_string()),
        }
    }
}

/// Read standard transactions in file order.
pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut transactions = Vec::new();
    for (i, record) in rdr.deserialize::<TransactionRecord>().enumerate() {
        // header is line 1
        let line = i + 2;
        let record = record.map_err(|e| anyhow::anyhow!("line {}: {}", line, e))?;
        let tx = Transaction::try_from(record).map_err(|e| anyhow::anyhow!("line {}: {}", line, e))?;
        transactions.push(tx);
    }
    Ok(transactions)
}

/// Write standard transactions, always including the header row.
pub fn write_csv<'a, I, W>(transactions: I, writer: W) -> anyhow::Result<()>
where
    I: IntoIterator<Item = &'a Transaction>,
    W: Write,
{
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(TransactionRecord::csv_header())?;
    for tx in transactions {
        wtr.serialize(TransactionRecord::from(tx))?;
    }
    wtr.flush()?;
    Ok(())
}
