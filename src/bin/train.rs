/*!
Train per-asset models and save their artifacts
*/
use anyhow::format_err;
use chrono::{NaiveDate, Utc};
use clap::{App, Arg};
use coinburn::artifacts::ArtifactStore;
use coinburn::config::AppConfig;
use coinburn::model::default_trainer;
use coinburn::pipeline::TrainingPipeline;
use coinburn::sentiment::SentimentAnnotator;
use std::path::{Path, PathBuf};
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = App::new("coinburn-train")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Trains price models on market data and Wikipedia edit sentiment")
        .arg(
            Arg::with_name("ASSETS")
                .help("Symbols to train, e.g. BTC ETH. Defaults to every configured asset")
                .multiple(true),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .help("Configuration file. Defaults to config/Config.toml")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("artifacts")
                .short("a")
                .long("artifacts")
                .help("Artifact directory")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("csv-dir")
                .long("csv-dir")
                .help("Read market data from <TICKER>.csv files in this directory")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("epochs")
                .short("e")
                .long("epochs")
                .help("Training epochs")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("today")
                .long("today")
                .help("Last day of data to use, as YYYY-MM-DD. Defaults to today")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("Hide progress bars"),
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load(matches.value_of("config").map(Path::new))?;
    if let Some(dir) = matches.value_of("artifacts") {
        config.artifacts_dir = PathBuf::from(dir);
    }
    if let Some(dir) = matches.value_of("csv-dir") {
        config.market.csv_dir = Some(PathBuf::from(dir));
    }
    if let Some(epochs) = matches.value_of("epochs") {
        config.training.epochs = epochs.parse()?;
    }
    let today = match matches.value_of("today") {
        Some(today) => NaiveDate::parse_from_str(today, "%Y-%m-%d")?,
        None => Utc::now().date_naive(),
    };
    let progress = !matches.is_present("quiet");

    let assets = match matches.values_of("ASSETS") {
        Some(symbols) => symbols
            .map(|symbol| {
                config
                    .asset(symbol)
                    .cloned()
                    .ok_or_else(|| format_err!("Asset {:?} is not configured", symbol))
            })
            .collect::<anyhow::Result<Vec<_>>>()?,
        None => config.assets.clone(),
    };

    let pipeline = TrainingPipeline::new(
        config.market_source()?,
        config.revision_source()?,
        SentimentAnnotator::new(config.classifier()?),
        ArtifactStore::new(config.artifacts_dir.clone()),
        default_trainer(&config.training, progress),
    )
    .configure(&config)
    .with_progress(progress);

    let mut failures = 0;
    for asset in &assets {
        match pipeline.run(asset, today).await {
            Ok(report) => println!("{}", serde_json::to_string(&report)?),
            Err(err) => {
                error!(symbol = %asset.symbol, error = %err, "training failed");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        return Err(format_err!(
            "{} of {} assets failed to train",
            failures,
            assets.len()
        ));
    }
    Ok(())
}
