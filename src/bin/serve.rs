/*!
Serve next-day predictions for every asset with saved artifacts
*/
use anyhow::format_err;
use clap::{App, Arg};
use coinburn::artifacts::ArtifactStore;
use coinburn::config::AppConfig;
use coinburn::serve::http::serve;
use coinburn::serve::{InferenceService, ModelRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = App::new("coinburn-serve")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Serves next-day price predictions over HTTP")
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
            Arg::with_name("host")
                .long("host")
                .help("Address to bind")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .help("Port to bind")
                .takes_value(true),
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = AppConfig::load(matches.value_of("config").map(Path::new))?;
    if let Some(dir) = matches.value_of("artifacts") {
        config.artifacts_dir = PathBuf::from(dir);
    }
    if let Some(dir) = matches.value_of("csv-dir") {
        config.market.csv_dir = Some(PathBuf::from(dir));
    }
    if let Some(host) = matches.value_of("host") {
        config.server.host = host.to_owned();
    }
    if let Some(port) = matches.value_of("port") {
        config.server.port = port.parse()?;
    }

    let store = ArtifactStore::new(config.artifacts_dir.clone());
    let registry = ModelRegistry::load(&store, &config.assets);
    if registry.is_empty() {
        return Err(format_err!(
            "No trained assets found under {}",
            store.root().display()
        ));
    }
    let service = Arc::new(InferenceService::from_config(
        &config,
        registry,
        config.market_source()?,
    ));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    serve(service, &addr).await?;
    Ok(())
}
