pub mod inventory;

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::accounting::calculation::inventory::Inventory;
use crate::accounting::{Lot, OversellPolicy, Position, Shortfall, TradeDetail, Transaction};
use crate::errors::{Result, TaxError};
use crate::rates::RateSource;

/// Output of one pass of the lot engine over a transaction batch.
#[derive(Clone, Debug)]
pub struct LotOutcome {
    pub closing_positions: Vec<Position>,
    pub cost_of_shares_sold: f64,
    pub sales_aud: f64,
    pub sales_details: Vec<TradeDetail>,
    pub purchases_details: Vec<TradeDetail>,
    pub shortfalls: Vec<Shortfall>,
}

/// Runs the FIFO lot engine.
///
/// Transactions are applied in date order; same-day transactions keep their
/// input order. Rates are only requested for non-AUD transactions, and a
/// rate that cannot be resolved degrades to 1.0 for that transaction alone.
pub fn process<R: RateSource + ?Sized>(
    opening_positions: &[Position],
    transactions: &[Transaction],
    rates: &R,
    oversell: OversellPolicy,
    precision: f64,
) -> Result<LotOutcome> {
    let mut calculation = LotCalculation::new(rates, oversell, precision);

    for position in opening_positions {
        calculation
            .inventory(&position.symbol)
            .deposit(Lot::new(position.quantity, position.total_cost));
    }

    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by_key(|tx| tx.date);

    for (i, tx) in sorted.into_iter().enumerate() {
        debug!(
            "processing transaction #{}: {} {} {} on {}",
            i + 1,
            tx.quantity,
            tx.symbol,
            tx.currency,
            tx.date
        );
        calculation.process_transaction(tx)?;
    }

    Ok(calculation.finish())
}

struct LotCalculation<'a, R: RateSource + ?Sized> {
    rates: &'a R,
    assets: BTreeMap<String, Inventory>,
    oversell: OversellPolicy,
    precision: f64,
    cost_of_shares_sold: f64,
    sales_aud: f64,
    sales_details: Vec<TradeDetail>,
    purchases_details: Vec<TradeDetail>,
    shortfalls: Vec<Shortfall>,
}

impl<'a, R: RateSource + ?Sized> LotCalculation<'a, R> {
    fn new(rates: &'a R, oversell: OversellPolicy, precision: f64) -> LotCalculation<'a, R> {
        LotCalculation {
            rates,
            assets: BTreeMap::new(),
            oversell,
            precision,
            cost_of_shares_sold: 0f64,
            sales_aud: 0f64,
            sales_details: Vec::new(),
            purchases_details: Vec::new(),
            shortfalls: Vec::new(),
        }
    }

    fn inventory(&mut self, symbol: &str) -> &mut Inventory {
        let precision = self.precision;
        self.assets
            .entry(symbol.to_string())
            .or_insert_with(|| Inventory::new(precision))
    }

    fn process_transaction(&mut self, tx: &Transaction) -> Result<()> {
        if tx.is_buy() {
            self.process_purchase(tx);
        } else if tx.is_sell() {
            self.process_sale(tx)?;
        } else {
            debug!("ignoring zero quantity {} transaction on {}", tx.symbol, tx.date);
        }
        Ok(())
    }

    /// Converts `amount` of the transaction's currency into AUD, returning
    /// the rate used alongside the converted value.
    fn to_aud(&self, tx: &Transaction, amount: f64) -> (f64, f64) {
        match self.rates.aud_value(amount, &tx.currency, tx.date) {
            Ok(converted) => converted,
            Err(e) => {
                warn!("{}; taking the {} amount of {} {} as AUD", e, tx.symbol, amount, tx.currency);
                (1.0, amount)
            }
        }
    }

    fn detail(&self, tx: &Transaction, exchange_rate: f64, value_aud: f64) -> TradeDetail {
        TradeDetail {
            date: tx.date,
            symbol: tx.symbol.clone(),
            quantity: tx.quantity.abs(),
            unit_price: tx.unit_price,
            gross_value: tx.gross_value.abs(),
            commission: tx.commission.abs(),
            net_value: tx.net_value.abs(),
            currency: tx.currency.clone(),
            exchange_rate,
            value_aud,
        }
    }

    fn process_purchase(&mut self, tx: &Transaction) {
        let (exchange_rate, value_aud) = self.to_aud(tx, tx.net_value);

        self.inventory(&tx.symbol)
            .deposit(Lot::new(tx.quantity, value_aud));

        let detail = self.detail(tx, exchange_rate, value_aud);
        self.purchases_details.push(detail);
    }

    fn process_sale(&mut self, tx: &Transaction) -> Result<()> {
        let (exchange_rate, value_aud) = self.to_aud(tx, tx.net_value.abs());
        self.sales_aud += value_aud;
        let detail = self.detail(tx, exchange_rate, value_aud);
        self.sales_details.push(detail);

        let withdrawal = self.inventory(&tx.symbol).withdraw(tx.quantity.abs());
        self.cost_of_shares_sold += withdrawal.cost;

        if withdrawal.shortfall > 0.0 {
            match self.oversell {
                OversellPolicy::Reject => {
                    return Err(TaxError::OverSell {
                        symbol: tx.symbol.clone(),
                        date: tx.date,
                        shortfall: withdrawal.shortfall,
                    });
                }
                OversellPolicy::Clamp => {
                    warn!(
                        "sold {} more {} than held on {}; no cost recorded for the excess",
                        withdrawal.shortfall, tx.symbol, tx.date
                    );
                    self.shortfalls.push(Shortfall {
                        date: tx.date,
                        symbol: tx.symbol.clone(),
                        quantity: withdrawal.shortfall,
                    });
                }
            }
        }

        Ok(())
    }

    fn finish(self) -> LotOutcome {
        let closing_positions = self
            .assets
            .iter()
            .filter_map(|(symbol, inventory)| {
                let quantity = inventory.quantity();
                if quantity > 0.0 {
                    Some(Position::new(symbol, quantity, inventory.total_cost()))
                } else {
                    None
                }
            })
            .collect();

        LotOutcome {
            closing_positions,
            cost_of_shares_sold: self.cost_of_shares_sold,
            sales_aud: self.sales_aud,
            sales_details: self.sales_details,
            purchases_details: self.purchases_details,
            shortfalls: self.shortfalls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::RateTable;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use std::cell::Cell;

    const PRECISION: f64 = 1e-9;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn aud(date: NaiveDate, symbol: &str, quantity: f64, net: f64) -> Transaction {
        Transaction::new(date, symbol, quantity, net / quantity.abs(), 0.0, "AUD")
    }

    struct CountingRates {
        calls: Cell<usize>,
    }

    impl RateSource for CountingRates {
        fn rate_for(&self, _date: NaiveDate, _currency: &str) -> Result<f64> {
            self.calls.set(self.calls.get() + 1);
            Ok(2.0)
        }
    }

    #[test]
    fn same_day_transactions_keep_input_order() {
        let txs = vec![
            aud(day(3), "X", 5.0, 600.0),
            aud(day(2), "X", 5.0, 500.0),
            aud(day(3), "X", -5.0, 700.0),
        ];
        let out = process(&[], &txs, &RateTable::new(), OversellPolicy::Clamp, PRECISION).unwrap();

        // the day 2 lot is consumed, the day 3 buy is left
        assert_relative_eq!(out.cost_of_shares_sold, 500.0);
        assert_eq!(out.closing_positions, vec![Position::new("X", 5.0, 600.0)]);
        assert_eq!(out.purchases_details[0].date, day(2));
    }

    #[test]
    fn sell_before_same_day_buy_is_a_shortfall() {
        let txs = vec![aud(day(2), "X", -5.0, 700.0), aud(day(2), "X", 5.0, 500.0)];
        let out = process(&[], &txs, &RateTable::new(), OversellPolicy::Clamp, PRECISION).unwrap();

        assert_eq!(out.cost_of_shares_sold, 0.0);
        assert_relative_eq!(out.sales_aud, 700.0);
        assert_eq!(out.shortfalls.len(), 1);
        assert_relative_eq!(out.shortfalls[0].quantity, 5.0);
        assert_eq!(out.closing_positions, vec![Position::new("X", 5.0, 500.0)]);
    }

    #[test]
    fn reject_policy_fails_on_oversell() {
        let opening = vec![Position::new("X", 2.0, 200.0)];
        let txs = vec![aud(day(2), "X", -3.0, 450.0)];
        match process(&opening, &txs, &RateTable::new(), OversellPolicy::Reject, PRECISION) {
            Err(TaxError::OverSell { symbol, shortfall, .. }) => {
                assert_eq!(symbol, "X");
                assert_relative_eq!(shortfall, 1.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn aud_transactions_skip_rate_lookup() {
        let rates = CountingRates { calls: Cell::new(0) };
        let txs = vec![
            aud(day(2), "X", 10.0, 1000.0),
            aud(day(3), "X", -4.0, 500.0),
            Transaction::new(day(4), "Y", 1.0, 100.0, 0.0, "USD"),
            Transaction::new(day(5), "Z", 2.0, 10.0, 0.0, " aud "),
        ];
        let out = process(&[], &txs, &rates, OversellPolicy::Clamp, PRECISION).unwrap();

        assert_eq!(rates.calls.get(), 1);
        assert_relative_eq!(out.sales_aud, 500.0);
        assert_relative_eq!(out.purchases_details[1].value_aud, 200.0);
        assert_eq!(out.purchases_details[1].exchange_rate, 2.0);
        assert_eq!(out.purchases_details[2].currency, "AUD");
        assert_relative_eq!(out.purchases_details[2].value_aud, 20.0);
    }

    #[test]
    fn liquidated_symbols_leave_closing_balance() {
        let opening = vec![
            Position::new("B", 3.0, 300.0),
            Position::new("A", 2.0, 50.0),
            Position::new("C", 1.0, 10.0),
        ];
        let txs = vec![aud(day(5), "A", -2.0, 80.0)];
        let out = process(&opening, &txs, &RateTable::new(), OversellPolicy::Clamp, PRECISION).unwrap();

        assert_eq!(
            out.closing_positions,
            vec![Position::new("B", 3.0, 300.0), Position::new("C", 1.0, 10.0)]
        );
        assert_relative_eq!(out.cost_of_shares_sold, 50.0);
    }

    #[test]
    fn sale_detail_records_magnitudes() {
        let opening = vec![Position::new("X", 10.0, 1000.0)];
        let txs = vec![Transaction::new(day(9), "X", -4.0, 125.0, -10.0, "AUD")];
        let out = process(&opening, &txs, &RateTable::new(), OversellPolicy::Clamp, PRECISION).unwrap();

        let sale = &out.sales_details[0];
        assert_eq!(sale.quantity, 4.0);
        assert_eq!(sale.gross_value, 500.0);
        assert_eq!(sale.commission, 10.0);
        assert_eq!(sale.net_value, 490.0);
        assert_eq!(sale.exchange_rate, 1.0);
        assert_relative_eq!(sale.value_aud, 490.0);
        assert_relative_eq!(out.sales_aud, 490.0);
    }
}
