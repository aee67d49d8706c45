use super::{amount, ExchangeError, IntoTransactions};
use crate::core::transaction::parse_date;
use crate::core::{Transaction, TransactionType};
use serde::Deserialize;
use std::io::Read;

/// Quote currencies, checked in order against the end of a market symbol.
const QUOTE_CURRENCIES: &[&str] = &["BTC", "ETH", "BNB", "USDT"];

// Date(UTC),Market,Type,Price,Amount,Total,Fee,Fee Coin
// 2018-01-10 12:00:00,ETHBTC,BUY,0.05,2,0.1,0.002,ETH

#[derive(Debug, Deserialize, Clone)]
struct TradeRecord {
    #[serde(rename = "Date(UTC)")]
    date: String,
    #[serde(rename = "Market")]
    market: String,
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Price")]
    price: String,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Fee")]
    fee: String,
    #[serde(rename = "Fee Coin")]
    fee_coin: String,
}

impl TradeRecord {
    fn pair(&self) -> Result<(&str, &str), ExchangeError> {
        QUOTE_CURRENCIES
            .iter()
            .find_map(|quote| {
                self.market
                    .strip_suffix(quote)
                    .filter(|base| !base.is_empty())
                    .map(|base| (base, *quote))
            })
            .ok_or_else(|| ExchangeError::UnknownMarket(self.market.clone()))
    }
}

impl IntoTransactions for TradeRecord {
    fn into_transactions(self) -> Result<Vec<Transaction>, ExchangeError> {
        let date = parse_date(&self.date)?;
        let (base, quote) = self.pair()?;
        let quantity = amount(&self.amount)?;
        let base_amount = if self.kind.eq_ignore_ascii_case("BUY") {
            quantity
        } else {
            -quantity
        };
        let quote_amount = -base_amount * amount(&self.price)?;

        Ok(vec![
            Transaction::new(date, TransactionType::Fee, &self.fee_coin, amount(&self.fee)?, None),
            Transaction::new(date, TransactionType::Trade, base, base_amount, None),
            Transaction::new(date, TransactionType::Trade, quote, quote_amount, None),
        ])
    }
}

// Date,Coin,Amount,TransactionFee,Address,TXID,SourceAddress,PaymentID,Status
// 2018-01-05 08:00:00,BTC,0.5,0,1Abc...,f00,,,Completed

#[derive(Debug, Deserialize, Clone)]
struct TransferRecord {
    #[serde(rename = "Date", alias = "Date(UTC)")]
    date: String,
    #[serde(rename = "Coin")]
    coin: String,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Type", default)]
    kind: String,
}

impl TransferRecord {
    /// Rows without a `Type` column are withdrawals.
    fn is_deposit(&self) -> bool {
        matches!(self.kind.to_lowercase().as_str(), "deposit" | "buy")
    }
}

impl IntoTransactions for TransferRecord {
    fn into_transactions(self) -> Result<Vec<Transaction>, ExchangeError> {
        let quantity = amount(&self.amount)?.abs();
        let signed = if self.is_deposit() { quantity } else { -quantity };
        Ok(vec![Transaction::new(
            parse_date(&self.date)?,
            TransactionType::Transfer,
            &self.coin,
            signed,
            None,
        )])
    }
}

/// Reads either a trade history or a deposit/withdrawal history; the latter is
/// recognised by its `Coin` column. Rows are returned oldest first.
pub fn import_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>, ExchangeError> {
    let mut rdr = super::csv_reader(reader);
    let is_transfer_history = rdr.headers()?.iter().any(|h| h == "Coin");
    let mut transactions = if is_transfer_history {
        super::read_records::<TransferRecord, R>(&mut rdr)?
    } else {
        super::read_records::<TradeRecord, R>(&mut rdr)?
    };
    // exports are newest first
    transactions.reverse();
    Ok(transactions)
}
