use super::gains::{LotMatch, MatchKind, Totals};
use super::lots::LotBook;
use super::transaction::{self, Transaction};
use crate::utils;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

pub const SHORT_TERM_PROCEEDS: &str = "Short term proceeds";
pub const SHORT_TERM_COST_BASIS: &str = "Short term cost basis";
pub const SHORT_TERM_GAINS: &str = "Short term capital gains";
pub const LONG_TERM_PROCEEDS: &str = "Long term proceeds";
pub const LONG_TERM_COST_BASIS: &str = "Long term cost basis";
pub const LONG_TERM_GAINS: &str = "Long term capital gains";
pub const FEES_PAID: &str = "Fees paid";

/// Final output of a gains run: what is still held, plus the totals.
#[derive(Debug)]
pub struct GainReport {
    /// Unconsumed lots, oldest first.
    pub open_lots: Vec<Transaction>,
    pub totals: Totals,
    pub matches: Vec<LotMatch>,
}

impl GainReport {
    pub fn assemble(book: LotBook, totals: Totals, matches: Vec<LotMatch>) -> Self {
        GainReport {
            open_lots: book.into_open_lots(),
            totals,
            matches,
        }
    }

    pub fn summary_rows(&self) -> [(&'static str, Decimal); 7] {
        let t = &self.totals;
        [
            (SHORT_TERM_PROCEEDS, t.short_term_proceeds),
            (SHORT_TERM_COST_BASIS, t.short_term_cost_basis),
            (SHORT_TERM_GAINS, t.short_term_gain()),
            (LONG_TERM_PROCEEDS, t.long_term_proceeds),
            (LONG_TERM_COST_BASIS, t.long_term_cost_basis),
            (LONG_TERM_GAINS, t.long_term_gain()),
            (FEES_PAID, t.fees),
        ]
    }

    /// Open lots in the standard transaction layout, a blank line, then one
    /// `label,value` row per summary total.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> anyhow::Result<()> {
        transaction::write_csv(&self.open_lots, &mut writer)?;
        writer.write_all(b"\n")?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        for (label, value) in self.summary_rows() {
            wtr.write_record([label.to_string(), value.normalize().to_string()])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// One row per lot match.
    pub fn write_matches_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        utils::write_csv(self.matches.iter().map(MatchCsvRecord::from), writer)
    }
}

#[derive(Debug, Serialize)]
struct MatchCsvRecord {
    currency: String,
    acquired: String,
    disposed: String,
    quantity: String,
    kind: &'static str,
    term: String,
    proceeds: String,
    cost: String,
    gain: String,
}

impl From<&LotMatch> for MatchCsvRecord {
    fn from(m: &LotMatch) -> Self {
        let (kind, term, proceeds, cost) = match &m.kind {
            MatchKind::Disposal {
                proceeds,
                cost_basis,
                term,
            } => ("disposal", term.to_string(), *proceeds, *cost_basis),
            MatchKind::Fee { cost } => ("fee", String::new(), Decimal::ZERO, *cost),
        };
        MatchCsvRecord {
            currency: m.currency.clone(),
            acquired: m.acquired.format("%Y-%m-%d %H:%M:%S").to_string(),
            disposed: m.disposed.format("%Y-%m-%d %H:%M:%S").to_string(),
            quantity: m.quantity.normalize().to_string(),
            kind,
            term,
            proceeds: proceeds.round_dp(2).to_string(),
            cost: cost.round_dp(2).to_string(),
            gain: (proceeds - cost).round_dp(2).to_string(),
        }
    }
}
