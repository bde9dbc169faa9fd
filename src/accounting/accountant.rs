use chrono::Local;
use log::info;

use crate::accounting::calculation;
use crate::accounting::reports::CalculationResult;
use crate::accounting::{OversellPolicy, Position, Transaction};
use crate::errors::{Result, TaxError};
use crate::rates::RateSource;

pub const DEFAULT_PRECISION: f64 = 0.000000001f64;

/// Runs calculations against one snapshot of exchange rates.
pub struct Accountant<'a, R: RateSource + ?Sized> {
    rates: &'a R,
    oversell: OversellPolicy,
    precision: f64,
}

impl<'a, R: RateSource + ?Sized> Accountant<'a, R> {
    pub fn new(rates: &'a R) -> Accountant<'a, R> {
        Accountant {
            rates,
            oversell: OversellPolicy::Clamp,
            precision: DEFAULT_PRECISION,
        }
    }

    pub fn oversell(&mut self, policy: OversellPolicy) -> &mut Accountant<'a, R> {
        self.oversell = policy;
        self
    }

    pub fn precision(&mut self, precision: f64) -> &mut Accountant<'a, R> {
        self.precision = precision;
        self
    }

    /// Computes closing positions and trading income figures. The opening
    /// balance may be empty. Malformed input rejects the whole batch.
    pub fn calculate(
        &self,
        opening_balance: &[Position],
        transactions: &[Transaction],
    ) -> Result<CalculationResult> {
        validate_opening_balance(opening_balance)?;
        validate_transactions(transactions)?;

        info!(
            "calculating {} transactions over {} opening positions",
            transactions.len(),
            opening_balance.len()
        );

        let outcome = calculation::process(
            opening_balance,
            transactions,
            self.rates,
            self.oversell,
            self.precision,
        )?;

        let result = CalculationResult::new(
            opening_balance.to_vec(),
            outcome,
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        );

        info!(
            "cost of shares sold {:.2} AUD, sales {:.2} AUD, gross trading income {:.2} AUD",
            result.cost_of_shares_sold(),
            result.sales_aud(),
            result.gross_trading_income()
        );

        Ok(result)
    }
}

fn validate_opening_balance(opening_balance: &[Position]) -> Result<()> {
    for (i, position) in opening_balance.iter().enumerate() {
        let reason = if position.symbol.trim().is_empty() {
            "missing symbol".to_string()
        } else if !position.quantity.is_finite() || position.quantity < 0.0 {
            format!("invalid quantity {}", position.quantity)
        } else if !position.total_cost.is_finite() || position.total_cost < 0.0 {
            format!("invalid total cost {}", position.total_cost)
        } else {
            continue;
        };
        return Err(TaxError::InvalidRecord { line: i + 1, reason });
    }
    Ok(())
}

fn validate_transactions(transactions: &[Transaction]) -> Result<()> {
    for (i, tx) in transactions.iter().enumerate() {
        let numbers = [tx.quantity, tx.unit_price, tx.gross_value, tx.commission, tx.net_value];
        let reason = if tx.symbol.trim().is_empty() {
            "missing symbol".to_string()
        } else if tx.currency.trim().is_empty() {
            "missing currency".to_string()
        } else if numbers.iter().any(|n| !n.is_finite()) {
            "non-numeric value".to_string()
        } else {
            continue;
        };
        return Err(TaxError::InvalidRecord { line: i + 1, reason });
    }
    Ok(())
}
