use super::{amount, ExchangeError, IntoTransactions};
use crate::core::{Transaction, TransactionType};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::io::Read;

// type,time,amount,balance,amount/balance unit,transfer id,trade id,order id
// match,2017-11-01T12:00:00.123Z,0.5,0.5,BTC,,1234,5678

#[derive(Debug, Deserialize, Clone)]
struct Record {
    #[serde(rename = "type")]
    kind: String,
    time: String,
    amount: String,
    #[serde(rename = "amount/balance unit", alias = "currency")]
    unit: String,
}

impl Record {
    fn transaction_type(&self) -> Result<TransactionType, ExchangeError> {
        match self.kind.as_ref() {
            "deposit" | "withdrawal" => Ok(TransactionType::Transfer),
            "match" => Ok(TransactionType::Trade),
            "fee" => Ok(TransactionType::Fee),
            _ => Err(ExchangeError::UnknownType {
                exchange: "gdax",
                kind: self.kind.clone(),
            }),
        }
    }

    fn date(&self) -> Result<NaiveDateTime, ExchangeError> {
        // 2017-11-01T12:00:00.123Z, fractional seconds and zone are dropped
        let trimmed = self.time.trim_end_matches('Z');
        let seconds = trimmed.split('.').next().unwrap_or(trimmed);
        Ok(crate::core::transaction::parse_date(seconds)?)
    }
}

impl IntoTransactions for Record {
    fn into_transactions(self) -> Result<Vec<Transaction>, ExchangeError> {
        let tx = Transaction::new(
            self.date()?,
            self.transaction_type()?,
            &self.unit,
            amount(&self.amount)?,
            None,
        );
        Ok(vec![tx])
    }
}

pub fn import_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>, ExchangeError> {
    super::csv_to_transactions::<Record, R>(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn converts_account_history() {
        let data = "\
type,time,amount,balance,amount/balance unit,transfer id,trade id,order id
deposit,2017-11-01T12:00:00.123Z,100.00,100.00,USD,abc,,
match,2017-11-01T12:05:30.500Z,0.01,0.01,BTC,,42,ord1
fee,2017-11-01T12:05:30.500Z,-0.25,99.75,USD,,42,ord1
withdrawal,2017-11-02T08:00:00.000Z,-0.01,0.00,BTC,def,,
";
        let txs = import_transactions(data.as_bytes()).unwrap();
        assert_eq!(txs.len(), 4);

        assert_eq!(txs[0].transaction_type, TransactionType::Transfer);
        assert_eq!(txs[0].currency, "usd");
        assert_eq!(txs[0].amount, dec!(100));
        assert_eq!(txs[0].value, None);

        assert_eq!(txs[1].transaction_type, TransactionType::Trade);
        assert_eq!(
            txs[1].date,
            NaiveDate::from_ymd_opt(2017, 11, 1)
                .unwrap()
                .and_hms_opt(12, 5, 30)
                .unwrap()
        );
        assert_eq!(txs[2].transaction_type, TransactionType::Fee);
        assert_eq!(txs[3].amount, dec!(-0.01));
    }

    #[test]
    fn accepts_currency_column_name() {
        let data = "\
type,time,amount,balance,currency
match,2017-11-01T12:00:00Z,1.5,1.5,ETH
";
        let txs = import_transactions(data.as_bytes()).unwrap();
        assert_eq!(txs[0].currency, "eth");
    }

    #[test]
    fn unknown_type_is_an_error() {
        let data = "\
type,time,amount,balance,amount/balance unit
rebate,2017-11-01T12:00:00.000Z,1,1,BTC
";
        let err = import_transactions(data.as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "unknown gdax transaction type 'rebate'");
    }
}
