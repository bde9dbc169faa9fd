//! Historical exchange rates against the Australian dollar.
//!
//! Every rate held by a [`RateTable`] is expressed as AUD per 1 unit of the
//! foreign currency, so a foreign amount converts to AUD by multiplying:
//! `amount_aud = amount_foreign * rate`. Files quoted the other way round
//! (foreign units per 1 AUD, as the RBA publishes them) are inverted once
//! while loading and never again.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, TaxError};
use crate::parser::{open_table, parse_date};

pub const AUD: &str = "AUD";

/// First cell of the row naming the series in an RBA statistical table.
const RBA_SERIES_ROW: &str = "Series ID";
const RBA_SERIES_PREFIX: &str = "FXR";

/// RBA series codes that differ from the ISO 4217 code.
const RBA_CODES: [(&str, &str); 12] = [
    ("JY", "JPY"),
    ("UKPS", "GBP"),
    ("CR", "CNY"),
    ("SKW", "KRW"),
    ("SD", "SGD"),
    ("SF", "CHF"),
    ("NTD", "TWD"),
    ("IRE", "INR"),
    ("IRR", "IDR"),
    ("MRG", "MYR"),
    ("VD", "VND"),
    ("PNGK", "PGK"),
];

/// How the numbers in a rate file are quoted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateQuote {
    /// AUD value of 1 unit of foreign currency.
    AudPerUnit,
    /// Foreign units bought by 1 AUD.
    UnitsPerAud,
}

impl Default for RateQuote {
    fn default() -> Self {
        RateQuote::AudPerUnit
    }
}

/// Upper-cased ISO code, with RBA series codes such as `JY` mapped across.
pub fn currency_code(currency: &str) -> String {
    let code = currency.trim().to_uppercase();
    RBA_CODES
        .iter()
        .find(|(rba, _)| *rba == code)
        .map(|(_, iso)| iso.to_string())
        .unwrap_or(code)
}

pub fn is_aud(currency: &str) -> bool {
    currency.trim().eq_ignore_ascii_case(AUD)
}

/// Resolves the AUD-per-unit rate effective on a given date.
pub trait RateSource {
    fn rate_for(&self, date: NaiveDate, currency: &str) -> Result<f64>;

    /// Converts a `currency` amount into AUD, returning the rate applied with
    /// the converted value. AUD passes through without a lookup.
    fn aud_value(&self, amount: f64, currency: &str, date: NaiveDate) -> Result<(f64, f64)> {
        if is_aud(currency) {
            return Ok((1.0, amount));
        }
        let rate = self.rate_for(date, currency)?;
        Ok((rate, amount * rate))
    }

    /// Converts between any two currencies through AUD.
    fn convert(&self, amount: f64, from: &str, to: &str, date: NaiveDate) -> Result<f64> {
        if currency_code(from) == currency_code(to) {
            return Ok(amount);
        }
        let (_, aud) = self.aud_value(amount, from, date)?;
        if is_aud(to) {
            return Ok(aud);
        }
        Ok(aud / self.rate_for(date, to)?)
    }
}

#[derive(Clone, Debug, Default)]
pub struct RateTable {
    rates: HashMap<String, BTreeMap<NaiveDate, f64>>,
}

impl RateTable {
    pub fn new() -> RateTable {
        RateTable {
            rates: HashMap::new(),
        }
    }

    /// Adds or replaces the AUD-per-unit rate of `currency` on `date`.
    pub fn insert(&mut self, currency: &str, date: NaiveDate, rate: f64) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(TaxError::Config(format!(
                "rate for {} on {} must be positive, got {}",
                currency, date, rate
            )));
        }
        self.rates
            .entry(currency_code(currency))
            .or_insert_with(BTreeMap::new)
            .insert(date, rate);
        Ok(())
    }

    pub fn currencies(&self) -> Vec<&str> {
        let mut res: Vec<&str> = self.rates.keys().map(String::as_str).collect();
        res.sort_unstable();
        res
    }

    pub fn is_empty(&self) -> bool {
        self.rates.values().all(BTreeMap::is_empty)
    }

    /// Loads a rate sheet from a `.csv` file or the first worksheet of a
    /// spreadsheet, such as the RBA's published `f11.1-data.xls`.
    pub fn from_path<P: AsRef<Path>>(path: P, quote: RateQuote) -> Result<RateTable> {
        let path = path.as_ref();
        let table = RateTable::from_reader(open_table(path)?, quote)?;
        info!(
            "loaded exchange rates for {} from {}",
            table.currencies().join(", "),
            path.display()
        );
        Ok(table)
    }

    /// Reads a wide rate sheet with one row per date and one column per
    /// currency. Two layouts are understood: a plain sheet headed `Date`
    /// followed by currency codes, and the RBA F11.1 table, whose metadata
    /// rows are skipped up to the `Series ID` row of `FXR<code>` columns.
    /// RBA tables quote foreign units per AUD whatever `quote` says.
    /// Blank or non-numeric cells are skipped.
    pub fn from_reader<R: Read>(reader: R, quote: RateQuote) -> Result<RateTable> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut columns: Option<Vec<String>> = None;
        let mut quote = quote;
        let mut table = RateTable::new();

        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line() as usize).unwrap_or(0);

            if columns.is_none() {
                columns = header_columns(&record, &mut quote);
                continue;
            }
            let currencies = match &columns {
                Some(currencies) => currencies,
                None => continue,
            };

            let date = match record.get(0) {
                Some(cell) if !cell.is_empty() => {
                    parse_date(cell).map_err(|reason| TaxError::InvalidRecord { line, reason })?
                }
                _ => continue,
            };

            for (currency, cell) in currencies.iter().zip(record.iter()).skip(1) {
                if currency.is_empty() || cell.is_empty() {
                    continue;
                }
                let value: f64 = match cell.parse() {
                    Ok(value) => value,
                    Err(_) => {
                        debug!("skipping {} rate \"{}\" on {}", currency, cell, date);
                        continue;
                    }
                };
                if !value.is_finite() || value <= 0.0 {
                    return Err(TaxError::InvalidRecord {
                        line,
                        reason: format!("{} rate must be positive, got {}", currency, value),
                    });
                }
                let rate = match quote {
                    RateQuote::AudPerUnit => value,
                    RateQuote::UnitsPerAud => 1.0 / value,
                };
                table.insert(currency, date, rate)?;
            }
        }

        if columns.is_none() {
            return Err(TaxError::MissingColumns(vec!["Date".to_string()]));
        }
        Ok(table)
    }
}

/// Recognises a header row, switching `quote` for RBA tables.
fn header_columns(record: &StringRecord, quote: &mut RateQuote) -> Option<Vec<String>> {
    match record.get(0) {
        Some(first) if first.eq_ignore_ascii_case("date") => Some(column_codes(record, "")),
        Some(first) if first.eq_ignore_ascii_case(RBA_SERIES_ROW) => {
            if *quote != RateQuote::UnitsPerAud {
                warn!("RBA table quotes foreign units per AUD; ignoring configured quote");
                *quote = RateQuote::UnitsPerAud;
            }
            Some(column_codes(record, RBA_SERIES_PREFIX))
        }
        _ => None,
    }
}

/// Currency codes of a header row, `prefix` stripped from each series name.
/// Columns without the prefix are left unnamed and ignored.
fn column_codes(header: &StringRecord, prefix: &str) -> Vec<String> {
    header
        .iter()
        .map(|name| match name.strip_prefix(prefix) {
            Some(code) => code.to_string(),
            None => String::new(),
        })
        .collect()
}

impl RateSource for RateTable {
    fn rate_for(&self, date: NaiveDate, currency: &str) -> Result<f64> {
        let currency = currency_code(currency);
        if currency == AUD {
            return Ok(1.0);
        }

        // most recent rate on or before the date is carried forward
        let rate = self
            .rates
            .get(&currency)
            .and_then(|series| series.range(..=date).next_back())
            .map(|(_, rate)| *rate);
        rate.ok_or(TaxError::RateUnavailable { currency, date })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn aud_is_always_one() {
        let table = RateTable::new();
        assert_eq!(table.rate_for(day(1999, 1, 1), "AUD").unwrap(), 1.0);
        assert_eq!(table.rate_for(day(2024, 6, 30), "aud").unwrap(), 1.0);
    }

    #[test]
    fn carries_latest_prior_rate_forward() {
        let mut table = RateTable::new();
        table.insert("USD", day(2024, 1, 2), 1.50).unwrap();
        table.insert("USD", day(2024, 1, 5), 1.52).unwrap();

        assert_eq!(table.rate_for(day(2024, 1, 2), "USD").unwrap(), 1.50);
        assert_eq!(table.rate_for(day(2024, 1, 4), "USD").unwrap(), 1.50);
        assert_eq!(table.rate_for(day(2024, 1, 5), "USD").unwrap(), 1.52);
        assert_eq!(table.rate_for(day(2025, 3, 1), "usd").unwrap(), 1.52);
    }

    #[test]
    fn fails_before_first_rate_and_for_unknown_currency() {
        let mut table = RateTable::new();
        table.insert("USD", day(2024, 1, 2), 1.50).unwrap();

        match table.rate_for(day(2024, 1, 1), "USD") {
            Err(TaxError::RateUnavailable { currency, date }) => {
                assert_eq!(currency, "USD");
                assert_eq!(date, day(2024, 1, 1));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(table.rate_for(day(2024, 1, 3), "XYZ").is_err());
    }

    #[test]
    fn rejects_non_positive_rates() {
        let mut table = RateTable::new();
        assert!(table.insert("USD", day(2024, 1, 2), 0.0).is_err());
        assert!(table.insert("USD", day(2024, 1, 2), f64::NAN).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn loads_wide_sheet_and_skips_blank_cells() {
        let data = "\
Date,USD,EUR,JPY
2024-01-03,1.49,1.62,
2024-01-02,1.48,Closed,0.0104
";
        let table = RateTable::from_reader(data.as_bytes(), RateQuote::AudPerUnit).unwrap();

        assert_eq!(table.currencies(), vec!["EUR", "JPY", "USD"]);
        assert_eq!(table.rate_for(day(2024, 1, 2), "USD").unwrap(), 1.48);
        assert_eq!(table.rate_for(day(2024, 1, 10), "USD").unwrap(), 1.49);
        assert_eq!(table.rate_for(day(2024, 1, 3), "JPY").unwrap(), 0.0104);
        assert!(table.rate_for(day(2024, 1, 2), "EUR").is_err());
    }

    #[test]
    fn inverts_foreign_per_aud_quotes_once() {
        let data = "Date,USD\n02/01/2024,0.67\n";
        let table = RateTable::from_reader(data.as_bytes(), RateQuote::UnitsPerAud).unwrap();

        let rate = table.rate_for(day(2024, 1, 2), "USD").unwrap();
        assert_relative_eq!(rate, 1.0 / 0.67);
        // 670 USD buys 1000 AUD at 0.67 USD per AUD
        assert_relative_eq!(670.0 * rate, 1000.0, max_relative = 1e-12);
    }

    #[test]
    fn reads_rba_f11_table() {
        let data = "\
F11.1  EXCHANGE RATES,,,,
Title,A$1=USD,Trade-weighted Index May 1970 = 100,A$1=JPY,A$1=GBP
Description,AUD/USD Exchange Rate,TWI,AUD/JPY Exchange Rate,AUD/GBP Exchange Rate
Frequency,Daily,Daily,Daily,Daily
Type,Indicative,Indicative,Indicative,Indicative
Units,USD,Index,JPY,GBP
,,,,
,,,,
Source,WM/Reuters,RBA,WM/Reuters,WM/Reuters
Publication date,05-Jan-2024,05-Jan-2024,05-Jan-2024,05-Jan-2024
Series ID,FXRUSD,FXRTWI,FXRJY,FXRUKPS
02-Jan-2024,0.6812,60.60,95.97,0.5350
03-Jan-2024,0.6750,60.10,,0.5331
";
        // the table is always foreign units per AUD
        let table = RateTable::from_reader(data.as_bytes(), RateQuote::AudPerUnit).unwrap();

        assert_eq!(table.currencies(), vec!["GBP", "JPY", "TWI", "USD"]);
        assert_relative_eq!(table.rate_for(day(2024, 1, 2), "USD").unwrap(), 1.0 / 0.6812);
        assert_relative_eq!(table.rate_for(day(2024, 1, 4), "USD").unwrap(), 1.0 / 0.6750);
        assert_relative_eq!(table.rate_for(day(2024, 1, 3), "JPY").unwrap(), 1.0 / 95.97);
        assert_relative_eq!(table.rate_for(day(2024, 1, 3), "JY").unwrap(), 1.0 / 95.97);
        assert_relative_eq!(table.rate_for(day(2024, 1, 3), "UKPS").unwrap(), 1.0 / 0.5331);
        assert!(table.rate_for(day(2024, 1, 1), "USD").is_err());
    }

    #[test]
    fn loads_rate_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("f11.1-data.csv");
        std::fs::write(&path, "Series ID,FXRUSD\n02-Jan-2024,0.5\n").unwrap();
        let table = RateTable::from_path(&path, RateQuote::UnitsPerAud).unwrap();
        assert_relative_eq!(table.rate_for(day(2024, 1, 2), "USD").unwrap(), 2.0);

        let path = dir.path().join("rates.txt");
        std::fs::write(&path, "Date,USD\n2024-01-02,0.5\n").unwrap();
        assert!(matches!(
            RateTable::from_path(&path, RateQuote::AudPerUnit),
            Err(TaxError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn maps_rba_series_codes() {
        assert_eq!(currency_code(" jy "), "JPY");
        assert_eq!(currency_code("UKPS"), "GBP");
        assert_eq!(currency_code("usd"), "USD");
    }

    #[test]
    fn converts_between_any_two_currencies() {
        let mut table = RateTable::new();
        table.insert("USD", day(2024, 1, 2), 1.5).unwrap();
        table.insert("EUR", day(2024, 1, 2), 1.6).unwrap();
        let on = day(2024, 1, 10);

        assert_relative_eq!(table.convert(1000.0, "USD", "AUD", on).unwrap(), 1500.0);
        assert_relative_eq!(table.convert(1500.0, "AUD", "USD", on).unwrap(), 1000.0);
        assert_relative_eq!(table.convert(160.0, "EUR", "USD", on).unwrap(), 160.0 * 1.6 / 1.5);
        assert_eq!(table.convert(42.0, "XYZ", "xyz", on).unwrap(), 42.0);

        let there = table.convert(1234.5, "AUD", "EUR", on).unwrap();
        let back = table.convert(there, "EUR", "AUD", on).unwrap();
        assert_relative_eq!(back, 1234.5, max_relative = 1e-12);

        assert!(table.convert(1.0, "USD", "AUD", day(2024, 1, 1)).is_err());
        assert!(table.convert(1.0, "AUD", "XYZ", on).is_err());
    }

    #[test]
    fn aud_value_reports_rate_used() {
        let mut table = RateTable::new();
        table.insert("USD", day(2024, 1, 2), 0.67).unwrap();

        assert_eq!(table.aud_value(1000.0, " aud", day(2020, 1, 1)).unwrap(), (1.0, 1000.0));
        let (rate, value) = table.aud_value(1000.0, "USD", day(2024, 1, 2)).unwrap();
        assert_eq!(rate, 0.67);
        assert_relative_eq!(value, 670.0);
    }

    #[test]
    fn requires_date_column() {
        let data = "Day,USD\n2024-01-02,0.67\n";
        match RateTable::from_reader(data.as_bytes(), RateQuote::AudPerUnit) {
            Err(TaxError::MissingColumns(columns)) => assert_eq!(columns, vec!["Date"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_negative_rate_in_sheet() {
        let data = "Date,USD\n2024-01-02,-0.67\n";
        match RateTable::from_reader(data.as_bytes(), RateQuote::AudPerUnit) {
            Err(TaxError::InvalidRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }
    }
}
