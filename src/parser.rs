use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use chrono::NaiveDate;
use csv::StringRecord;
use log::{debug, info};
use serde::Deserialize;

use crate::accounting::{Position, Transaction};
use crate::errors::{Result, TaxError};

const OPENING_BALANCE_COLUMNS: [&str; 3] = ["Symbol", "Quantity", "Total Cost in AUD"];
const TRANSACTION_COLUMNS: [&str; 6] = ["Date", "Symbol", "Quantity", "Unit Price", "Commission", "Currency"];

const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%b-%Y"];

#[derive(Debug, Deserialize)]
struct OpeningBalanceRecord {
    #[serde(rename = "Symbol")]
    symbol: String,
    #[serde(rename = "Quantity")]
    quantity: f64,
    #[serde(rename = "Total Cost in AUD")]
    total_cost: f64,
}

#[derive(Debug, Deserialize)]
struct TransactionRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Symbol")]
    symbol: String,
    #[serde(rename = "Quantity")]
    quantity: f64,
    #[serde(rename = "Unit Price")]
    unit_price: f64,
    #[serde(rename = "Commission")]
    commission: Option<f64>,
    #[serde(rename = "Currency")]
    currency: String,
}

/// Parses a calendar date, ignoring any time of day that follows it.
pub fn parse_date(value: &str) -> std::result::Result<NaiveDate, String> {
    let day = value
        .trim()
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or_default();

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(day, format).ok())
        .ok_or_else(|| format!("unrecognised date \"{}\"", value))
}

pub fn read_opening_balance<P: AsRef<Path>>(path: P) -> Result<Vec<Position>> {
    let path = path.as_ref();
    let positions = opening_balance_from_reader(open_table(path)?)?;
    info!("read {} opening positions from {}", positions.len(), path.display());
    Ok(positions)
}

pub fn read_transactions<P: AsRef<Path>>(path: P) -> Result<Vec<Transaction>> {
    let path = path.as_ref();
    let transactions = transactions_from_reader(open_table(path)?)?;
    info!("read {} transactions from {}", transactions.len(), path.display());
    Ok(transactions)
}

pub fn opening_balance_from_reader<R: Read>(reader: R) -> Result<Vec<Position>> {
    let mut reader = csv_reader(reader);
    let headers = required_headers(&mut reader, &OPENING_BALANCE_COLUMNS)?;

    let mut positions = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = line_of(&record);
        let row: OpeningBalanceRecord = record
            .deserialize(Some(&headers))
            .map_err(|e| invalid(line, e.to_string()))?;

        if row.symbol.is_empty() {
            return Err(invalid(line, "missing symbol"));
        }
        if !row.quantity.is_finite() || row.quantity <= 0.0 {
            return Err(invalid(line, "quantity must be positive for opening balance"));
        }
        if !row.total_cost.is_finite() || row.total_cost < 0.0 {
            return Err(invalid(line, "total cost must not be negative"));
        }

        positions.push(Position::new(&row.symbol, row.quantity, row.total_cost));
    }

    Ok(positions)
}

pub fn transactions_from_reader<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut reader = csv_reader(reader);
    let headers = required_headers(&mut reader, &TRANSACTION_COLUMNS)?;

    let mut transactions = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = line_of(&record);
        let row: TransactionRecord = record
            .deserialize(Some(&headers))
            .map_err(|e| invalid(line, e.to_string()))?;

        let date = parse_date(&row.date).map_err(|reason| invalid(line, reason))?;
        let commission = row.commission.unwrap_or(0f64);

        if row.symbol.is_empty() {
            return Err(invalid(line, "missing symbol"));
        }
        if row.currency.is_empty() {
            return Err(invalid(line, "missing currency"));
        }
        if [row.quantity, row.unit_price, commission].iter().any(|n| !n.is_finite()) {
            return Err(invalid(line, "non-numeric value"));
        }
        if row.quantity == 0f64 {
            return Err(invalid(line, "quantity must not be zero"));
        }

        transactions.push(Transaction::new(
            date,
            &row.symbol,
            row.quantity,
            row.unit_price,
            commission,
            &row.currency,
        ));
    }

    Ok(transactions)
}

/// Opens a `.csv` file, or the first worksheet of a spreadsheet rendered as
/// CSV, so every input flows through the same record readers.
pub fn open_table(path: &Path) -> Result<Box<dyn Read>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if extension == "csv" {
        Ok(Box::new(File::open(path)?))
    } else if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        let mut workbook = open_workbook_auto(path)?;
        let sheet = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| invalid(0, format!("{} has no worksheets", path.display())))??;
        debug!("read {:?} cells from the first sheet of {}", sheet.get_size(), path.display());
        Ok(Box::new(Cursor::new(range_to_csv(&sheet)?)))
    } else {
        Err(TaxError::UnsupportedFormat(path.display().to_string()))
    }
}

fn range_to_csv(sheet: &Range<Data>) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in sheet.rows() {
        writer.write_record(row.iter().map(cell_text))?;
    }
    writer.into_inner().map_err(|e| TaxError::Io(e.into_error()))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) => s.clone(),
        Data::DateTime(_) => cell
            .as_date()
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn required_headers<R: Read>(reader: &mut csv::Reader<R>, required: &[&str]) -> Result<StringRecord> {
    let headers = reader.headers()?.clone();
    let missing: Vec<String> = required
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect();

    if missing.is_empty() {
        Ok(headers)
    } else {
        Err(TaxError::MissingColumns(missing))
    }
}

fn line_of(record: &StringRecord) -> usize {
    record.position().map(|p| p.line() as usize).unwrap_or(0)
}

fn invalid<S: Into<String>>(line: usize, reason: S) -> TaxError {
    TaxError::InvalidRecord {
        line,
        reason: reason.into(),
    }
}
