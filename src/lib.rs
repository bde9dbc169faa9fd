//! Australian trading-income figures for a portfolio of foreign-listed
//! shares: FIFO cost basis, realized cost of shares sold and sales proceeds,
//! all in AUD.

pub mod accounting;
pub mod config;
pub mod errors;
pub mod parser;
pub mod rates;

pub use accounting::accountant::Accountant;
pub use accounting::reports::CalculationResult;
pub use accounting::{OversellPolicy, Position, Shortfall, TradeDetail, Transaction};
pub use errors::{Result, TaxError};
pub use rates::{RateQuote, RateSource, RateTable};
