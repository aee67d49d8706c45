use rust_decimal::Decimal;
use std::str::FromStr;

/// Column description generated by `#[derive(CsvColumns)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvColumn {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

pub fn write_csv<I, R, W>(records: I, writer: W) -> anyhow::Result<()>
where
    I: IntoIterator<Item = R>,
    R: serde::Serialize,
    W: std::io::Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records.into_iter() {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parses plain or scientific decimal text, e.g. `0.25` or `1e-05`.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_plain_and_scientific() {
        assert_eq!(parse_decimal(" -1.50 "), Some(dec!(-1.50)));
        assert_eq!(parse_decimal("1e-05"), Some(dec!(0.00001)));
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal(""), None);
    }
}
