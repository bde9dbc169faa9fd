mod app;

use std::process;

use au_trading_tax::config::Config;
use au_trading_tax::parser;
use au_trading_tax::{Accountant, OversellPolicy, RateTable, Result};

use crate::app::App;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = App::new();
    if let Err(e) = run(&app) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(app: &App) -> Result<()> {
    let mut config = Config::load_or_default(app.get_config_path())?;
    if let Some(rates_path) = app.get_rates_path() {
        config.rates_path = rates_path.to_string();
    }
    if let Some(output_dir) = app.get_output_dir() {
        config.output_dir = output_dir.to_string();
    }
    if app.get_reject_oversell() {
        config.oversell = OversellPolicy::Reject;
    }

    let opening_balance = match app.get_opening_path() {
        Some(path) => parser::read_opening_balance(path)?,
        None => Vec::new(),
    };
    let transactions = parser::read_transactions(app.get_transactions_path())?;

    // one snapshot of rates serves the whole calculation
    let rates = RateTable::from_path(&config.rates_path, config.rate_quote)?;

    let result = Accountant::new(&rates)
        .oversell(config.oversell)
        .precision(config.precision)
        .calculate(&opening_balance, &transactions)?;

    result.write_to_dir(&config.output_dir)?;
    println!("{}", result);

    Ok(())
}
