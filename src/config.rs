use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::accounting::accountant::DEFAULT_PRECISION;
use crate::accounting::OversellPolicy;
use crate::errors::{Result, TaxError};
use crate::rates::RateQuote;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rates_path: String,
    pub rate_quote: RateQuote,
    pub precision: f64,
    pub oversell: OversellPolicy,
    pub output_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rates_path: "rates.csv".to_string(),
            rate_quote: RateQuote::AudPerUnit,
            precision: DEFAULT_PRECISION,
            oversell: OversellPolicy::Clamp,
            output_dir: ".".to_string(),
        }
    }
}

impl Config {
    pub fn new<P: AsRef<Path>>(config_path: P) -> Result<Config> {
        let file = std::fs::File::open(config_path)?;
        let config: Config = ::serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the config file, falling back to defaults when it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(config_path: P) -> Result<Config> {
        let config_path = config_path.as_ref();
        if config_path.exists() {
            Config::new(config_path)
        } else {
            info!("no config file at {}, using defaults", config_path.display());
            Ok(Config::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.precision.is_finite() || self.precision < 0.0 {
            return Err(TaxError::Config(format!(
                "precision must be a small non-negative number, got {}",
                self.precision
            )));
        }
        if self.rates_path.trim().is_empty() {
            return Err(TaxError::Config("rates_path must not be empty".to_string()));
        }
        Ok(())
    }
}
