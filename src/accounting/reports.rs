use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use csv::Writer;
use log::info;
use serde::Serialize;

use crate::accounting::calculation::LotOutcome;
use crate::accounting::{Position, Shortfall, TradeDetail};
use crate::errors::Result;

/// Figures for one tax report, fixed at construction.
#[derive(Clone, Debug)]
pub struct CalculationResult {
    opening_balance: Vec<Position>,
    closing_balance: Vec<Position>,
    cost_of_shares_sold: f64,
    sales_aud: f64,
    gross_trading_income: f64,
    opening_stock_value: f64,
    closing_stock_value: f64,
    purchases_value: f64,
    sales_details: Vec<TradeDetail>,
    purchases_details: Vec<TradeDetail>,
    shortfalls: Vec<Shortfall>,
    calculation_date: String,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    #[serde(rename = "Item")]
    item: &'a str,
    #[serde(rename = "Value")]
    value: String,
}

impl CalculationResult {
    pub fn new(
        opening_balance: Vec<Position>,
        outcome: LotOutcome,
        calculation_date: String,
    ) -> CalculationResult {
        let opening_stock_value = stock_value(&opening_balance);
        let closing_stock_value = stock_value(&outcome.closing_positions);

        // opening stock + purchases - closing stock = cost of shares sold
        let purchases_value = outcome.cost_of_shares_sold + closing_stock_value - opening_stock_value;

        CalculationResult {
            opening_balance,
            closing_balance: outcome.closing_positions,
            cost_of_shares_sold: outcome.cost_of_shares_sold,
            sales_aud: outcome.sales_aud,
            gross_trading_income: outcome.sales_aud - outcome.cost_of_shares_sold,
            opening_stock_value,
            closing_stock_value,
            purchases_value,
            sales_details: outcome.sales_details,
            purchases_details: outcome.purchases_details,
            shortfalls: outcome.shortfalls,
            calculation_date,
        }
    }

    pub fn opening_balance(&self) -> &[Position] { &self.opening_balance }
    pub fn closing_balance(&self) -> &[Position] { &self.closing_balance }
    pub fn cost_of_shares_sold(&self) -> f64 { self.cost_of_shares_sold }
    pub fn sales_aud(&self) -> f64 { self.sales_aud }
    pub fn gross_trading_income(&self) -> f64 { self.gross_trading_income }
    pub fn opening_stock_value(&self) -> f64 { self.opening_stock_value }
    pub fn closing_stock_value(&self) -> f64 { self.closing_stock_value }
    pub fn purchases_value(&self) -> f64 { self.purchases_value }
    pub fn sales_details(&self) -> &[TradeDetail] { &self.sales_details }
    pub fn purchases_details(&self) -> &[TradeDetail] { &self.purchases_details }
    pub fn shortfalls(&self) -> &[Shortfall] { &self.shortfalls }
    pub fn calculation_date(&self) -> &str { &self.calculation_date }

    /// Writes the closing balance, itemized trades and summary as CSV files
    /// into `dir`, returning the paths written.
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut written = vec![
            write_records(dir.join("closing_balance.csv"), &self.closing_balance)?,
            write_records(dir.join("purchases.csv"), &self.purchases_details)?,
            write_records(dir.join("sales.csv"), &self.sales_details)?,
            write_records(dir.join("summary.csv"), &self.summary_rows())?,
        ];
        if !self.shortfalls.is_empty() {
            written.push(write_records(dir.join("shortfalls.csv"), &self.shortfalls)?);
        }

        info!("wrote {} report files to {}", written.len(), dir.display());
        Ok(written)
    }

    fn summary_rows(&self) -> Vec<SummaryRow<'static>> {
        let figures = [
            ("Opening Stock Value", self.opening_stock_value),
            ("Purchases Value", self.purchases_value),
            ("Closing Stock Value", self.closing_stock_value),
            ("Cost of Shares Sold", self.cost_of_shares_sold),
            ("Sales in AUD", self.sales_aud),
            ("Gross Trading Income", self.gross_trading_income),
        ];
        let mut rows: Vec<SummaryRow<'static>> = figures
            .iter()
            .map(|(item, value)| SummaryRow {
                item: *item,
                value: value.to_string(),
            })
            .collect();
        rows.push(SummaryRow {
            item: "Calculation Date",
            value: self.calculation_date.clone(),
        });
        rows
    }
}

// starts from +0.0; an empty f64 `sum()` yields -0.0
fn stock_value(positions: &[Position]) -> f64 {
    positions.iter().fold(0f64, |acc, p| acc + p.total_cost)
}

fn write_records<T: Serialize>(path: PathBuf, records: &[T]) -> Result<PathBuf> {
    let mut writer = Writer::from_path(&path)?;
    for entry in records.iter() {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(path)
}

impl fmt::Display for CalculationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trading income statement ({})", self.calculation_date)?;
        writeln!(f, "  Opening stock value   {:>14.2}", self.opening_stock_value)?;
        writeln!(f, "  Purchases value       {:>14.2}", self.purchases_value)?;
        writeln!(f, "  Closing stock value   {:>14.2}", self.closing_stock_value)?;
        writeln!(f, "  Cost of shares sold   {:>14.2}", self.cost_of_shares_sold)?;
        writeln!(f, "  Sales (AUD)           {:>14.2}", self.sales_aud)?;
        write!(f, "  Gross trading income  {:>14.2}", self.gross_trading_income)?;
        if !self.shortfalls.is_empty() {
            write!(
                f,
                "\n  WARNING: {} sale(s) exceeded holdings; see shortfalls.csv",
                self.shortfalls.len()
            )?;
        }
        Ok(())
    }
}
