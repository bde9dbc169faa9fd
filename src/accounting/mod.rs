pub mod accountant;
pub mod reports;
pub mod calculation;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A buy (positive quantity) or sell (negative quantity) of one symbol.
///
/// `gross_value` and `net_value` carry the sign of `quantity`. The commission
/// is stored as a magnitude and always counts against the trader: it raises
/// the net value of a buy and lowers the net proceeds of a sale. Currency
/// codes are trimmed and upper-cased.
#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub symbol: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub gross_value: f64,
    pub commission: f64,
    pub net_value: f64,
    pub currency: String,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        symbol: &str,
        quantity: f64,
        unit_price: f64,
        commission: f64,
        currency: &str,
    ) -> Transaction {
        let gross_value = quantity * unit_price;
        let commission = commission.abs();
        Transaction {
            date,
            symbol: symbol.to_string(),
            quantity,
            unit_price,
            gross_value,
            commission,
            net_value: gross_value + commission,
            currency: currency.trim().to_uppercase(),
        }
    }

    pub fn is_buy(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_sell(&self) -> bool {
        self.quantity < 0.0
    }
}

/// Aggregate holding of one symbol, as supplied in an opening balance or
/// reported in the closing balance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Quantity")]
    pub quantity: f64,
    #[serde(rename = "Total Cost in AUD")]
    pub total_cost: f64,
}

impl Position {
    pub fn new(symbol: &str, quantity: f64, total_cost: f64) -> Position {
        Position {
            symbol: symbol.to_string(),
            quantity,
            total_cost,
        }
    }
}

/// One acquisition batch, costed in AUD.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Lot {
    pub quantity: f64,
    pub cost_per_unit: f64,
    pub total_cost: f64,
}

impl Lot {
    pub fn new(quantity: f64, total_cost: f64) -> Lot {
        let cost_per_unit = if quantity > 0.0 {
            total_cost / quantity
        } else {
            0.0
        };
        Lot {
            quantity,
            cost_per_unit,
            total_cost,
        }
    }
}

/// Itemized purchase or sale. All magnitudes are absolute; an
/// `exchange_rate` of exactly 1.0 on a foreign currency row means no rate
/// could be resolved and the raw amount was taken as AUD.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TradeDetail {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Quantity")]
    pub quantity: f64,
    #[serde(rename = "Unit Price")]
    pub unit_price: f64,
    #[serde(rename = "Gross Value")]
    pub gross_value: f64,
    #[serde(rename = "Commission")]
    pub commission: f64,
    #[serde(rename = "Net Value")]
    pub net_value: f64,
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "Exchange Rate")]
    pub exchange_rate: f64,
    #[serde(rename = "Value in AUD")]
    pub value_aud: f64,
}

/// Quantity sold beyond what the portfolio held.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Shortfall {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Quantity")]
    pub quantity: f64,
}

/// What to do when a sale exceeds the quantity held.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversellPolicy {
    /// Consume what is held and record a [`Shortfall`].
    Clamp,
    /// Abort the calculation.
    Reject,
}

impl Default for OversellPolicy {
    fn default() -> Self {
        OversellPolicy::Clamp
    }
}
