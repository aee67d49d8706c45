use super::{unit_value, ExchangeError, IntoTransactions};
use crate::core::{Transaction, TransactionType};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, Clone)]
struct Record {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Time (UTC)", default)]
    time: String,
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "USD Amount", default)]
    usd_amount: String,
    #[serde(rename = "Trading Fee (USD)", default)]
    usd_fee: String,
    #[serde(rename = "BTC Amount", default)]
    btc_amount: String,
    #[serde(rename = "Trading Fee (BTC)", default)]
    btc_fee: String,
    #[serde(rename = "ETH Amount", default)]
    eth_amount: String,
}

impl Record {
    /// `None` for rows that are not transactions, e.g. the trailing totals row.
    fn date(&self) -> Option<NaiveDateTime> {
        // 12:00:18.123
        let time = self.time.split('.').next().unwrap_or_default();
        NaiveDateTime::parse_from_str(&format!("{} {}", self.date, time), "%Y-%m-%d %H:%M:%S").ok()
    }

    fn transaction_type(&self) -> Result<TransactionType, ExchangeError> {
        match self.kind.as_ref() {
            "Credit" | "Debit" => Ok(TransactionType::Transfer),
            "Buy" | "Sell" => Ok(TransactionType::Trade),
            _ => Err(ExchangeError::UnknownType {
                exchange: "gemini",
                kind: self.kind.clone(),
            }),
        }
    }

    fn movement(
        &self,
        date: NaiveDateTime,
        cell: &str,
        currency: &str,
    ) -> Result<Option<Transaction>, ExchangeError> {
        if cell.is_empty() {
            return Ok(None);
        }
        let amount = cell_amount(cell)?;
        let value = if self.usd_amount.is_empty() {
            None
        } else {
            unit_value(cell_amount(&self.usd_amount)?, amount)
        };
        let tx = Transaction::new(date, self.transaction_type()?, currency, amount, value);
        Ok(Some(tx))
    }

    fn fee(date: NaiveDateTime, cell: &str, currency: &str) -> Result<Option<Transaction>, ExchangeError> {
        if cell.is_empty() {
            return Ok(None);
        }
        let tx = Transaction::new(date, TransactionType::Fee, currency, cell_amount(cell)?, None);
        Ok(Some(tx))
    }
}

impl IntoTransactions for Record {
    fn into_transactions(self) -> Result<Vec<Transaction>, ExchangeError> {
        let Some(date) = self.date() else {
            log::warn!("Skipping gemini row dated '{} {}'", self.date, self.time);
            return Ok(Vec::new());
        };
        let transactions = [
            self.movement(date, &self.btc_amount, "btc")?,
            Record::fee(date, &self.btc_fee, "btc")?,
            self.movement(date, &self.eth_amount, "eth")?,
            Record::fee(date, &self.usd_fee, "usd")?,
        ];
        Ok(transactions.into_iter().flatten().collect())
    }
}

/// Amount cells look like `0.5 BTC`, `$1,234.56` or `(0.01 BTC)`; parentheses
/// mark a negative amount.
fn cell_amount(cell: &str) -> Result<Decimal, ExchangeError> {
    let digits: String = cell
        .chars()
        .filter(|c| *c != ',')
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let amount = super::amount(&digits).map_err(|_| ExchangeError::InvalidAmount(cell.to_string()))?;
    Ok(if cell.contains('(') { -amount } else { amount })
}

pub fn import_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>, ExchangeError> {
    super::csv_to_transactions::<Record, R>(reader)
}
