use crate::core::Transaction;
use crate::utils::parse_decimal;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;

const COINBASE_API_URL: &str = "https://api.coinbase.com/v2/prices";
const COINBASE_API_VERSION: &str = "2018-03-22";

#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("price request for {currency} on {date} failed: {message}")]
    Request {
        currency: String,
        date: NaiveDate,
        message: String,
    },
    #[error("invalid price '{0}'")]
    InvalidPrice(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Historic USD spot prices.
pub trait PriceSource {
    /// Price of one unit of `currency` on `date`, `None` if the source has no
    /// price for it.
    fn usd_price(&self, currency: &str, date: NaiveDate) -> Result<Option<Decimal>, PriceError>;
}

/// Daily spot prices from the public Coinbase API. Only btc and eth are priced.
#[derive(Debug, Clone)]
pub struct CoinbaseSpot {
    base_url: String,
}

impl Default for CoinbaseSpot {
    fn default() -> Self {
        CoinbaseSpot {
            base_url: COINBASE_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpotResponse {
    data: SpotPrice,
}

#[derive(Debug, Deserialize)]
struct SpotPrice {
    amount: String,
}

impl CoinbaseSpot {
    pub fn is_priced(currency: &str) -> bool {
        matches!(currency, "btc" | "eth")
    }
}

impl PriceSource for CoinbaseSpot {
    fn usd_price(&self, currency: &str, date: NaiveDate) -> Result<Option<Decimal>, PriceError> {
        if !Self::is_priced(currency) {
            return Ok(None);
        }
        let request_error = |message: String| PriceError::Request {
            currency: currency.to_string(),
            date,
            message,
        };
        let url = format!("{}/{}-usd/spot", self.base_url, currency);
        let response: SpotResponse = ureq::get(&url)
            .set("CB-VERSION", COINBASE_API_VERSION)
            .query("date", &date.format("%Y-%m-%d").to_string())
            .call()
            .map_err(|e| request_error(e.to_string()))?
            .into_json()
            .map_err(|e| request_error(e.to_string()))?;
        log::info!("{} price on {}: {} USD", currency, date, response.data.amount);

        parse_decimal(&response.data.amount)
            .map(Some)
            .ok_or(PriceError::InvalidPrice(response.data.amount))
    }
}

/// Offline prices loaded from a `date,currency,price` CSV.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: HashMap<(NaiveDate, String), Decimal>,
}

#[derive(Debug, Deserialize)]
struct PriceRecord {
    date: NaiveDate,
    currency: String,
    price: String,
}

impl PriceTable {
    pub fn read_csv<R: Read>(reader: R) -> Result<PriceTable, PriceError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut prices = HashMap::new();
        for record in rdr.deserialize::<PriceRecord>() {
            let record = record?;
            let price = parse_decimal(&record.price).ok_or(PriceError::InvalidPrice(record.price))?;
            prices.insert((record.date, record.currency.trim().to_lowercase()), price);
        }
        log::info!("Loaded {} prices", prices.len());
        Ok(PriceTable { prices })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.prices.len()
    }
}

impl PriceSource for PriceTable {
    fn usd_price(&self, currency: &str, date: NaiveDate) -> Result<Option<Decimal>, PriceError> {
        Ok(self.prices.get(&(date, currency.to_string())).copied())
    }
}

/// Fills in missing transaction values, asking the source at most once per
/// currency and day.
pub struct ValueAdapter<S> {
    source: S,
    cache: HashMap<(NaiveDate, String), Option<Decimal>>,
}

impl<S: PriceSource> ValueAdapter<S> {
    pub fn new(source: S) -> Self {
        ValueAdapter {
            source,
            cache: HashMap::new(),
        }
    }

    pub fn price(&mut self, currency: &str, date: NaiveDate) -> Result<Option<Decimal>, PriceError> {
        if currency == "usd" {
            return Ok(Some(Decimal::ONE));
        }
        let key = (date, currency.to_string());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(*cached);
        }
        let price = self.source.usd_price(currency, date)?;
        self.cache.insert(key, price);
        Ok(price)
    }

    /// Transactions that already carry a value are returned unchanged.
    pub fn set_transaction_value(&mut self, tx: Transaction) -> Result<Transaction, PriceError> {
        if tx.value.is_some() {
            return Ok(tx);
        }
        let price = self.price(&tx.currency, tx.date.date())?;
        if price.is_none() {
            log::warn!("No USD price for {} on {}, value left unset", tx.currency, tx.date);
        }
        Ok(tx.with_value(price))
    }

    pub fn fill_values(&mut self, transactions: Vec<Transaction>) -> Result<Vec<Transaction>, PriceError> {
        transactions
            .into_iter()
            .map(|tx| self.set_transaction_value(tx))
            .collect()
    }
}
