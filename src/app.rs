use clap::Arg;

pub struct App {
    opening_path: Option<String>,
    transactions_path: String,
    rates_path: Option<String>,
    conf_path: String,
    output_dir: Option<String>,
    reject_oversell: bool,
}

impl App {
    pub fn new() -> App {
        let matches = clap::App::new("au_trading_tax")
            .version("0.1.0")
            .about("Computes Australian trading income for foreign share portfolios using FIFO cost basis")
            .arg(Arg::with_name("opening_path")
                .short("b")
                .long("opening")
                .takes_value(true)
                .help("Opening balance CSV (Symbol, Quantity, Total Cost in AUD)"))
            .arg(Arg::with_name("transactions_path")
                .short("t")
                .long("transactions")
                .takes_value(true)
                .help("Trade transactions CSV to process"))
            .arg(Arg::with_name("rates_path")
                .short("r")
                .long("rates")
                .takes_value(true)
                .help("Exchange rate CSV, overrides rates_path from the config"))
            .arg(Arg::with_name("config_path")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("Config file"))
            .arg(Arg::with_name("output_dir")
                .short("o")
                .long("output")
                .takes_value(true)
                .help("Directory to write reports to"))
            .arg(Arg::with_name("reject_oversell")
                .long("reject-oversell")
                .takes_value(false)
                .help("Fail when a sale exceeds the shares held"))
            .get_matches();

        App {
            opening_path: matches.value_of("opening_path").map(str::to_string),
            transactions_path: matches.value_of("transactions_path")
                .unwrap_or("transactions.csv")
                .to_string(),
            rates_path: matches.value_of("rates_path").map(str::to_string),
            conf_path: matches.value_of("config_path")
                .unwrap_or("config.yaml")
                .to_string(),
            output_dir: matches.value_of("output_dir").map(str::to_string),
            reject_oversell: matches.is_present("reject_oversell"),
        }
    }

    pub fn get_opening_path(&self) -> Option<&str> { self.opening_path.as_deref() }
    pub fn get_transactions_path(&self) -> &str { &self.transactions_path }
    pub fn get_rates_path(&self) -> Option<&str> { self.rates_path.as_deref() }
    pub fn get_config_path(&self) -> &str { &self.conf_path }
    pub fn get_output_dir(&self) -> Option<&str> { self.output_dir.as_deref() }
    pub fn get_reject_oversell(&self) -> bool { self.reject_oversell }
}
