use super::lots::{Algorithm, LotBook};
use super::report::GainReport;
use super::transaction::Transaction;
use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GainsError {
    #[error("insufficient {currency} basis for disposal on {date}: {shortfall} units unmatched")]
    InsufficientBasis {
        currency: String,
        date: NaiveDateTime,
        shortfall: Decimal,
    },
    #[error("no USD value for {currency} transaction on {date}")]
    MissingValuation { currency: String, date: NaiveDateTime },
    #[error("USD amount out of range for {currency} transaction on {date}")]
    Overflow { currency: String, date: NaiveDateTime },
}

/// Holding period classification of a realized gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Short,
    Long,
}

impl Term {
    /// Long-term only when held strictly more than 365 days.
    pub fn classify(acquired: NaiveDateTime, disposed: NaiveDateTime) -> Term {
        if disposed > acquired + Duration::days(365) {
            Term::Long
        } else {
            Term::Short
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            Term::Short => "short",
            Term::Long => "long",
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Running totals, all in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub short_term_proceeds: Decimal,
    pub short_term_cost_basis: Decimal,
    pub long_term_proceeds: Decimal,
    pub long_term_cost_basis: Decimal,
    pub fees: Decimal,
}

impl Totals {
    pub fn short_term_gain(&self) -> Decimal {
        self.short_term_proceeds - self.short_term_cost_basis
    }

    pub fn long_term_gain(&self) -> Decimal {
        self.long_term_proceeds - self.long_term_cost_basis
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchKind {
    Disposal {
        proceeds: Decimal,
        cost_basis: Decimal,
        term: Term,
    },
    Fee {
        cost: Decimal,
    },
}

/// One slice of a lot consumed by a disposal or fee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotMatch {
    pub currency: String,
    pub acquired: NaiveDateTime,
    pub disposed: NaiveDateTime,
    pub quantity: Decimal,
    pub kind: MatchKind,
}

/// Single pass gain engine. Transactions must arrive in date order.
#[derive(Debug)]
pub struct GainCalculator {
    book: LotBook,
    totals: Totals,
    matches: Vec<LotMatch>,
}

impl GainCalculator {
    pub fn new(algorithm: Algorithm) -> Self {
        GainCalculator {
            book: LotBook::new(algorithm),
            totals: Totals::default(),
            matches: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    #[cfg(test)]
    pub fn book(&self) -> &LotBook {
        &self.book
    }

    pub fn process(&mut self, tx: Transaction) -> Result<(), GainsError> {
        if !tx.is_taxable() {
            self.book.push(tx);
            return Ok(());
        }

        if tx.is_fee() && tx.currency == "usd" {
            accumulate(&mut self.totals.fees, tx.amount.abs())
                .ok_or_else(|| overflow(&tx.currency, tx.date))?;
            log::debug!("USD fee {} on {}", tx.amount.abs(), tx.date);
            return Ok(());
        }

        let mut remaining = if tx.is_fee() { -tx.amount.abs() } else { tx.amount };

        let proceeds_value = if tx.is_fee() || remaining.is_zero() {
            None
        } else {
            Some(tx.value.ok_or_else(|| missing_valuation(&tx.currency, tx.date))?)
        };

        while remaining < Decimal::ZERO {
            let open = self.book.pop_next(&tx.currency, tx.date, -remaining)?;
            let lot_value = open
                .lot
                .value
                .ok_or_else(|| missing_valuation(&open.lot.currency, open.lot.date))?;
            let matched = open.lot.amount.min(-remaining);
            let out_of_range = || overflow(&tx.currency, tx.date);

            let kind = match proceeds_value {
                None => {
                    let cost = matched.checked_mul(lot_value).ok_or_else(out_of_range)?.abs();
                    accumulate(&mut self.totals.fees, cost).ok_or_else(out_of_range)?;
                    MatchKind::Fee { cost }
                }
                Some(value) => {
                    let proceeds = matched.checked_mul(value).ok_or_else(out_of_range)?;
                    let cost_basis = matched.checked_mul(lot_value).ok_or_else(out_of_range)?;
                    let term = Term::classify(open.lot.date, tx.date);
                    let (proceeds_total, cost_total) = match term {
                        Term::Short => (
                            &mut self.totals.short_term_proceeds,
                            &mut self.totals.short_term_cost_basis,
                        ),
                        Term::Long => (
                            &mut self.totals.long_term_proceeds,
                            &mut self.totals.long_term_cost_basis,
                        ),
                    };
                    accumulate(proceeds_total, proceeds).ok_or_else(out_of_range)?;
                    accumulate(cost_total, cost_basis).ok_or_else(out_of_range)?;
                    MatchKind::Disposal {
                        proceeds,
                        cost_basis,
                        term,
                    }
                }
            };
            log::debug!(
                "Match {} {}: qty={}, acquired={}, disposed={}, {:?}",
                tx.transaction_type,
                tx.currency,
                matched,
                open.lot.date,
                tx.date,
                kind
            );
            self.matches.push(LotMatch {
                currency: tx.currency.clone(),
                acquired: open.lot.date,
                disposed: tx.date,
                quantity: matched,
                kind,
            });

            if open.lot.amount + remaining > Decimal::ZERO {
                self.book.restore(open.reduced(matched));
                remaining = Decimal::ZERO;
            } else {
                remaining += open.lot.amount;
            }
        }
        log::debug!(
            "{} holdings after {} on {}: {}",
            tx.currency,
            tx.transaction_type,
            tx.date,
            self.book.holdings(&tx.currency)
        );
        Ok(())
    }

    pub fn finish(self) -> GainReport {
        GainReport::assemble(self.book, self.totals, self.matches)
    }
}

fn missing_valuation(currency: &str, date: NaiveDateTime) -> GainsError {
    GainsError::MissingValuation {
        currency: currency.to_string(),
        date,
    }
}

fn overflow(currency: &str, date: NaiveDateTime) -> GainsError {
    GainsError::Overflow {
        currency: currency.to_string(),
        date,
    }
}

fn accumulate(total: &mut Decimal, amount: Decimal) -> Option<()> {
    *total = total.checked_add(amount)?;
    Some(())
}

/// Run the whole stream through a fresh calculator.
pub fn calculate_gains(
    transactions: Vec<Transaction>,
    algorithm: Algorithm,
) -> Result<GainReport, GainsError> {
    let count = transactions.len();
    let mut calculator = GainCalculator::new(algorithm);
    for tx in transactions {
        calculator.process(tx)?;
    }
    log::info!("Processed {} transactions using {}", count, algorithm);
    Ok(calculator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::TransactionType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn day(n: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            + Duration::days(n - 1)
    }

    fn trade(d: i64, currency: &str, amount: Decimal, value: Decimal) -> Transaction {
        Transaction::new(day(d), TransactionType::Trade, currency, amount, Some(value))
    }

    fn fee(d: i64, currency: &str, amount: Decimal) -> Transaction {
        Transaction::new(day(d), TransactionType::Fee, currency, amount, None)
    }

    fn run(txs: Vec<Transaction>) -> GainReport {
        calculate_gains(txs, Algorithm::Hifo).unwrap()
    }

    #[test]
    fn end_to_end_long_term_scenario() {
        let report = run(vec![
            trade(1, "btc", dec!(2), dec!(100)),
            trade(2, "btc", dec!(1), dec!(200)),
            trade(400, "btc", dec!(-2), dec!(300)),
        ]);

        assert_eq!(report.totals.long_term_proceeds, dec!(600));
        assert_eq!(report.totals.long_term_cost_basis, dec!(300));
        assert_eq!(report.totals.long_term_gain(), dec!(300));
        assert_eq!(report.totals.short_term_proceeds, Decimal::ZERO);
        // 3 acquired, 2 disposed: half of the cheaper lot is left
        assert_eq!(report.open_lots.len(), 1);
        assert_eq!(report.open_lots[0].amount, dec!(1));
        assert_eq!(report.open_lots[0].value, Some(dec!(100)));
    }

    #[test]
    fn equal_acquisitions_and_disposals_drain_every_lot() {
        let report = run(vec![
            trade(1, "btc", dec!(2), dec!(100)),
            trade(2, "btc", dec!(1), dec!(200)),
            trade(3, "btc", dec!(-1.5), dec!(150)),
            trade(4, "btc", dec!(-1.5), dec!(150)),
        ]);

        assert!(report.open_lots.is_empty());
        let matched: Decimal = report.matches.iter().map(|m| m.quantity).sum();
        assert_eq!(matched, dec!(3));
        // first disposal takes the 200 lot and half of the 100 lot
        assert_eq!(report.matches.len(), 3);
        assert_eq!(report.totals.short_term_cost_basis, dec!(400));
        assert_eq!(report.totals.short_term_proceeds, dec!(450));
    }

    #[test]
    fn highest_value_lot_consumed_first() {
        let report = run(vec![
            trade(1, "btc", dec!(1), dec!(50)),
            trade(2, "btc", dec!(1), dec!(100)),
            trade(3, "btc", dec!(-1), dec!(120)),
        ]);

        assert_eq!(report.totals.short_term_cost_basis, dec!(100));
        assert_eq!(report.open_lots.len(), 1);
        assert_eq!(report.open_lots[0].value, Some(dec!(50)));
    }

    #[test]
    fn lot_quantity_is_conserved() {
        let report = run(vec![
            trade(1, "eth", dec!(4), dec!(10)),
            trade(2, "eth", dec!(3), dec!(20)),
            trade(3, "eth", dec!(-5.5), dec!(15)),
            fee(4, "eth", dec!(0.5)),
        ]);

        let open: Decimal = report.open_lots.iter().map(|lot| lot.amount).sum();
        assert_eq!(open, dec!(1));
        let matched: Decimal = report.matches.iter().map(|m| m.quantity).sum();
        assert_eq!(open + matched, dec!(7));
    }

    #[test]
    fn holding_period_boundary() {
        let acquired = day(1);
        assert_eq!(Term::classify(acquired, acquired + Duration::days(365)), Term::Short);
        assert_eq!(Term::classify(acquired, acquired + Duration::days(366)), Term::Long);

        let report = run(vec![
            trade(1, "btc", dec!(1), dec!(10)),
            trade(1, "eth", dec!(1), dec!(10)),
            trade(366, "btc", dec!(-1), dec!(20)),
            trade(367, "eth", dec!(-1), dec!(20)),
        ]);
        assert_eq!(report.totals.short_term_proceeds, dec!(20));
        assert_eq!(report.totals.long_term_proceeds, dec!(20));
    }

    #[test]
    fn partial_consumption_leaves_remainder() {
        let report = run(vec![
            trade(1, "btc", dec!(10), dec!(40)),
            trade(5, "btc", dec!(-3), dec!(50)),
        ]);

        assert_eq!(report.totals.short_term_cost_basis, dec!(120));
        assert_eq!(report.totals.short_term_proceeds, dec!(150));
        assert_eq!(report.open_lots.len(), 1);
        let remaining = &report.open_lots[0];
        assert_eq!(remaining.amount, dec!(7));
        assert_eq!(remaining.value, Some(dec!(40)));
        assert_eq!(remaining.date, day(1));
    }

    #[test]
    fn usd_fee_bypasses_lots() {
        let mut calculator = GainCalculator::new(Algorithm::Hifo);
        calculator.process(trade(1, "usd", dec!(100), dec!(1))).unwrap();
        calculator.process(fee(2, "USD", dec!(-5))).unwrap();

        assert_eq!(calculator.totals().fees, dec!(5));
        assert_eq!(calculator.book().holdings("usd"), dec!(100));
    }

    #[test]
    fn crypto_fee_uses_lot_value_regardless_of_sign() {
        let report = run(vec![
            trade(1, "btc", dec!(1), dec!(1000)),
            fee(2, "btc", dec!(0.01)),
            fee(3, "btc", dec!(-0.01)),
        ]);

        assert_eq!(report.totals.fees, dec!(20));
        assert_eq!(report.totals.short_term_proceeds, Decimal::ZERO);
        assert_eq!(report.open_lots[0].amount, dec!(0.98));
        assert!(matches!(report.matches[0].kind, MatchKind::Fee { cost } if cost == dec!(10)));
    }

    #[test]
    fn disposal_spanning_several_lots() {
        let report = run(vec![
            trade(1, "btc", dec!(1), dec!(100)),
            trade(2, "btc", dec!(1), dec!(200)),
            trade(3, "btc", dec!(1), dec!(300)),
            trade(4, "btc", dec!(-2.5), dec!(400)),
        ]);

        assert_eq!(report.totals.short_term_proceeds, dec!(1000));
        assert_eq!(report.totals.short_term_cost_basis, dec!(550));
        assert_eq!(report.matches.len(), 3);
        assert_eq!(report.open_lots[0].amount, dec!(0.5));
        assert_eq!(report.open_lots[0].value, Some(dec!(100)));
    }

    #[test]
    fn zero_amount_disposal_is_a_no_op() {
        let report = run(vec![
            trade(1, "btc", dec!(1), dec!(100)),
            Transaction::new(day(2), TransactionType::Transfer, "btc", Decimal::ZERO, None),
        ]);

        assert_eq!(report.totals, Totals::default());
        assert_eq!(report.open_lots.len(), 1);
    }

    #[test]
    fn insufficient_basis_on_empty_book() {
        let err = calculate_gains(vec![trade(3, "btc", dec!(-1), dec!(10))], Algorithm::Hifo)
            .unwrap_err();
        assert_eq!(
            err,
            GainsError::InsufficientBasis {
                currency: "btc".to_string(),
                date: day(3),
                shortfall: dec!(1),
            }
        );
    }

    #[test]
    fn insufficient_basis_reports_unmatched_shortfall() {
        let err = calculate_gains(
            vec![
                trade(1, "btc", dec!(1), dec!(10)),
                trade(3, "btc", dec!(-1.5), dec!(10)),
            ],
            Algorithm::Hifo,
        )
        .unwrap_err();
        assert!(
            matches!(err, GainsError::InsufficientBasis { shortfall, .. } if shortfall == dec!(0.5))
        );
    }

    #[test]
    fn unvalued_disposal_is_rejected() {
        let err = calculate_gains(
            vec![
                trade(1, "btc", dec!(1), dec!(10)),
                Transaction::new(day(2), TransactionType::Transfer, "btc", dec!(-1), None),
            ],
            Algorithm::Hifo,
        )
        .unwrap_err();
        assert_eq!(
            err,
            GainsError::MissingValuation {
                currency: "btc".to_string(),
                date: day(2),
            }
        );
    }

    #[test]
    fn unvalued_lot_is_rejected() {
        let err = calculate_gains(
            vec![
                Transaction::new(day(1), TransactionType::Transfer, "eth", dec!(1), None),
                trade(2, "eth", dec!(-1), dec!(10)),
            ],
            Algorithm::Hifo,
        )
        .unwrap_err();
        assert_eq!(
            err,
            GainsError::MissingValuation {
                currency: "eth".to_string(),
                date: day(1),
            }
        );
    }

    #[test]
    fn out_of_range_proceeds_are_an_error() {
        let err = calculate_gains(
            vec![
                trade(1, "btc", dec!(1000000000000000), dec!(1)),
                trade(2, "btc", dec!(-1000000000000000), dec!(1000000000000000)),
            ],
            Algorithm::Hifo,
        )
        .unwrap_err();
        assert_eq!(
            err,
            GainsError::Overflow {
                currency: "btc".to_string(),
                date: day(2),
            }
        );
    }

    #[test]
    fn fifo_and_lifo_select_by_date() {
        let txs = vec![
            trade(1, "btc", dec!(1), dec!(300)),
            trade(2, "btc", dec!(1), dec!(100)),
            trade(3, "btc", dec!(1), dec!(200)),
            trade(4, "btc", dec!(-1), dec!(250)),
        ];

        let fifo = calculate_gains(txs.clone(), Algorithm::Fifo).unwrap();
        assert_eq!(fifo.totals.short_term_cost_basis, dec!(300));

        let lifo = calculate_gains(txs, Algorithm::Lifo).unwrap();
        assert_eq!(lifo.totals.short_term_cost_basis, dec!(200));
    }

    #[test]
    fn losses_are_negative_gains() {
        let report = run(vec![
            trade(1, "eth", dec!(2), dec!(500)),
            trade(10, "eth", dec!(-2), dec!(300)),
        ]);
        assert_eq!(report.totals.short_term_gain(), dec!(-400));
    }
}
