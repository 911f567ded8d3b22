/*!
Generate a fake daily market data CSV, for offline training runs
*/
use chrono::NaiveDate;
use clap::{App, Arg};
use coinburn::data::csvfile::write_ohlcv;
use coinburn::data::fake::random_walk;
use rand::rngs::StdRng;
use rand::{thread_rng, SeedableRng};
use std::fs::File;
use std::io;

fn main() -> anyhow::Result<()> {
    let matches = App::new("coinburn-fakegen")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Writes a random walk of daily market data as CSV")
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .help("Output file, e.g. BTC-USD.csv. Defaults to standard output")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("start")
                .long("start")
                .help("First day, as YYYY-MM-DD")
                .default_value("2018-01-01"),
        )
        .arg(
            Arg::with_name("days")
                .short("n")
                .long("days")
                .help("Days to generate")
                .default_value("1000"),
        )
        .arg(
            Arg::with_name("price")
                .long("price")
                .help("Starting price")
                .default_value("100"),
        )
        .arg(
            Arg::with_name("sigma")
                .long("sigma")
                .help("Daily log-return volatility")
                .default_value("0.03"),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .help("RNG seed. Defaults to a random seed")
                .takes_value(true),
        )
        .get_matches();

    let start = NaiveDate::parse_from_str(
        matches.value_of("start").unwrap_or_default(),
        "%Y-%m-%d",
    )?;
    let days: usize = matches.value_of("days").unwrap_or_default().parse()?;
    let price: f64 = matches.value_of("price").unwrap_or_default().parse()?;
    let sigma: f64 = matches.value_of("sigma").unwrap_or_default().parse()?;
    let rng = match matches.value_of("seed") {
        Some(seed) => StdRng::seed_from_u64(seed.parse()?),
        None => StdRng::from_rng(thread_rng())?,
    };

    let records = random_walk(rng, start, price, sigma)?.take(days);
    let written = match matches.value_of("output") {
        Some(path) => write_ohlcv(File::create(path)?, records)?,
        None => write_ohlcv(io::stdout(), records)?,
    };
    eprintln!("Wrote {} days", written);
    Ok(())
}
