use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaxError {
    #[error("no exchange rate for {currency} on or before {date}")]
    RateUnavailable { currency: String, date: NaiveDate },

    #[error("sold {shortfall} more {symbol} than held on {date}")]
    OverSell {
        symbol: String,
        date: NaiveDate,
        shortfall: f64,
    },

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("invalid record on line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("unsupported file format \"{0}\", please use CSV or a spreadsheet")]
    UnsupportedFormat(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, TaxError>;
