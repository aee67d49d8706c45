use super::{amount, unit_value, ExchangeError, IntoTransactions};
use crate::core::transaction::parse_date;
use crate::core::{Transaction, TransactionType};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};

/// Account summary lines preceding the header row.
const PREAMBLE_LINES: usize = 4;

// Timestamp,Balance,Amount,Currency,To,Notes,Instantly Exchanged,Transfer Total,Transfer Total Currency,Transfer Fee,Transfer Fee Currency,...
// 2017-08-02 10:13:36 -0700,0.5,0.5,BTC,,,false,1350.00,USD,13.00,USD

#[derive(Debug, Deserialize, Clone)]
struct Record {
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Currency")]
    currency: String,
    #[serde(rename = "Transfer Total", default)]
    transfer_total: String,
    #[serde(rename = "Transfer Total Currency", default)]
    transfer_total_currency: String,
    #[serde(rename = "Transfer Fee", default)]
    transfer_fee: String,
    #[serde(rename = "Transfer Fee Currency", default)]
    transfer_fee_currency: String,
}

impl IntoTransactions for Record {
    fn into_transactions(self) -> Result<Vec<Transaction>, ExchangeError> {
        // trailing zone offsets are ignored
        let timestamp = self
            .timestamp
            .split_whitespace()
            .take(2)
            .collect::<Vec<_>>()
            .join(" ");
        let date = parse_date(&timestamp)?;
        let quantity = amount(&self.amount)?;

        let value = if !self.transfer_total.is_empty()
            && self.transfer_total_currency.eq_ignore_ascii_case("usd")
        {
            unit_value(amount(&self.transfer_total)?, quantity)
        } else {
            None
        };

        // transfers and trades are not distinguished in this export
        let mut transactions = vec![Transaction::new(
            date,
            TransactionType::Trade,
            &self.currency,
            quantity,
            value,
        )];
        if !self.transfer_fee.is_empty() && !self.transfer_fee_currency.is_empty() {
            transactions.push(Transaction::new(
                date,
                TransactionType::Fee,
                &self.transfer_fee_currency,
                amount(&self.transfer_fee)?,
                None,
            ));
        }
        Ok(transactions)
    }
}

pub fn import_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>, ExchangeError> {
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    for _ in 0..PREAMBLE_LINES {
        line.clear();
        reader.read_line(&mut line)?;
    }
    super::csv_to_transactions::<Record, _>(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    const EXPORT: &str = "\
Transactions
User,someone@example.com,1234
Account,BTC Wallet,5678
,,
Timestamp,Balance,Amount,Currency,To,Notes,Instantly Exchanged,Transfer Total,Transfer Total Currency,Transfer Fee,Transfer Fee Currency
2017-08-02 10:13:36 -0700,0.5,0.5,BTC,,,false,1350.00,USD,13.00,USD
08/05/17  14:02,0.4,-0.1,BTC,,,false,,,,
2017-08-09 09:00:00 -0700,0.4,2.0,ETH,,,false,0.1,BTC,,
";

    #[test]
    fn skips_preamble_and_converts_rows() {
        let txs = import_transactions(EXPORT.as_bytes()).unwrap();
        assert_eq!(txs.len(), 4);

        assert_eq!(txs[0].transaction_type, TransactionType::Trade);
        assert_eq!(txs[0].currency, "btc");
        assert_eq!(txs[0].amount, dec!(0.5));
        assert_eq!(txs[0].value, Some(dec!(2700)));
        assert_eq!(
            txs[0].date,
            NaiveDate::from_ymd_opt(2017, 8, 2)
                .unwrap()
                .and_hms_opt(10, 13, 36)
                .unwrap()
        );

        assert_eq!(txs[1].transaction_type, TransactionType::Fee);
        assert_eq!(txs[1].currency, "usd");
        assert_eq!(txs[1].amount, dec!(13));

        assert_eq!(txs[2].amount, dec!(-0.1));
        assert_eq!(txs[2].value, None);
        assert_eq!(
            txs[2].date,
            NaiveDate::from_ymd_opt(2017, 8, 5)
                .unwrap()
                .and_hms_opt(14, 2, 0)
                .unwrap()
        );

        // totals in another currency are not a USD price
        assert_eq!(txs[3].currency, "eth");
        assert_eq!(txs[3].value, None);
    }
}
