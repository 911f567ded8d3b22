/*!
Layered application configuration

Values come from built-in defaults, then a TOML file, then `COINBURN_`-prefixed environment
variables, with `__` separating nested keys (`COINBURN_SERVER__PORT=8080`).
*/
use crate::data::csvfile::CsvMarketData;
use crate::data::wiki::mediawiki::{MediaWiki, WIKIPEDIA_API};
use crate::data::wiki::RevisionSource;
use crate::data::yahoo::{YahooFinance, YAHOO_CHART_API};
use crate::data::MarketDataSource;
use crate::error::{Error, Result};
use crate::model::TrainingParams;
use crate::sentiment::huggingface::DEFAULT_MODEL_URL;
use crate::sentiment::{HuggingFaceClassifier, LexiconClassifier, SentimentClassifier};
use crate::window::{DEFAULT_TRAIN_FRACTION, DEFAULT_WINDOW_SIZE};
use chrono::NaiveDate;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// The configuration file read when no other is given
pub const DEFAULT_CONFIG_FILE: &str = "config/Config.toml";

/// The prefix of configuration environment variables
pub const ENV_PREFIX: &str = "COINBURN_";

/// The default fraction of the actual price a prediction must move to count as a change
pub const DEFAULT_DIRECTION_THRESHOLD: f64 = 0.0005;

/// The default number of extra days fetched beyond a window when serving
pub const DEFAULT_LIVE_BUFFER_DAYS: usize = 30;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Where per-asset artifacts are kept
    pub artifacts_dir: PathBuf,
    /// Days per window
    pub window_size: usize,
    /// Extra days fetched beyond a window when serving, to ride out gaps
    pub live_buffer_days: usize,
    /// Fraction of aligned rows used for training
    pub train_fraction: f64,
    /// Fraction of the actual price a prediction must move to count as `Alta` or `Queda`
    pub direction_threshold: f64,
    /// Training hyperparameters
    pub training: TrainingParams,
    /// Sentiment classifier settings
    pub sentiment: SentimentConfig,
    /// Market data settings
    pub market: MarketConfig,
    /// Wiki settings
    pub wiki: WikiConfig,
    /// The assets to train and serve
    pub assets: Vec<AssetConfig>,
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
}

/// Which sentiment classifier to use
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentBackend {
    /// The built-in lexicon classifier
    Lexicon,
    /// A hosted Hugging Face text-classification model
    HuggingFace,
}

/// Sentiment classifier settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentConfig {
    /// The classifier to use
    pub backend: SentimentBackend,
    /// The inference endpoint of the `huggingface` backend
    pub url: String,
    /// Bearer token for the `huggingface` backend
    pub token: Option<String>,
    /// Request timeout, in seconds
    pub timeout_secs: u64,
}

/// Market data settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// The chart API base URL
    pub base_url: String,
    /// Request timeout, in seconds
    pub timeout_secs: u64,
    /// Read `<ticker>.csv` files from this directory instead of the chart API
    pub csv_dir: Option<PathBuf>,
}

/// Wiki settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiConfig {
    /// The MediaWiki API endpoint
    pub api_url: String,
    /// Request timeout, in seconds
    pub timeout_secs: u64,
}

/// An asset to train and serve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// The asset's symbol, e.g. `BTC`
    pub symbol: String,
    /// The quote currency, e.g. `USD`
    pub quote: String,
    /// The wiki page whose edits are scored
    pub wiki_page: String,
    /// The most revisions fetched from the wiki
    pub max_revisions: usize,
    /// The first day of market data used for training
    pub start: NaiveDate,
}

impl AssetConfig {
    /// The market data ticker, e.g. `BTC-USD`
    pub fn ticker(&self) -> String {
        format!("{}-{}", self.symbol, self.quote)
    }
}

fn asset(
    symbol: &str,
    wiki_page: &str,
    max_revisions: usize,
    start: (i32, u32, u32),
) -> AssetConfig {
    AssetConfig {
        symbol: symbol.to_owned(),
        quote: "USD".to_owned(),
        wiki_page: wiki_page.to_owned(),
        max_revisions,
        start: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap_or_default(),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig {
                host: "0.0.0.0".to_owned(),
                port: 5001,
            },
            artifacts_dir: PathBuf::from("artifacts"),
            window_size: DEFAULT_WINDOW_SIZE,
            live_buffer_days: DEFAULT_LIVE_BUFFER_DAYS,
            train_fraction: DEFAULT_TRAIN_FRACTION,
            direction_threshold: DEFAULT_DIRECTION_THRESHOLD,
            training: TrainingParams::default(),
            sentiment: SentimentConfig {
                backend: SentimentBackend::Lexicon,
                url: DEFAULT_MODEL_URL.to_owned(),
                token: None,
                timeout_secs: 30,
            },
            market: MarketConfig {
                base_url: YAHOO_CHART_API.to_owned(),
                timeout_secs: 30,
                csv_dir: None,
            },
            wiki: WikiConfig {
                api_url: WIKIPEDIA_API.to_owned(),
                timeout_secs: 30,
            },
            assets: vec![
                asset("BTC", "Bitcoin", 2000, (2018, 1, 1)),
                asset("ETH", "Ethereum", 3000, (2017, 1, 1)),
                asset("DOGE", "Dogecoin", 3000, (2018, 1, 1)),
            ],
        }
    }
}

impl AppConfig {
    /// The layered configuration: defaults, then `file` if it exists, then the environment
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
    /// Load the configuration, reading `file` or `DEFAULT_CONFIG_FILE`
    pub fn load(file: Option<&Path>) -> Result<AppConfig> {
        let file = file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let config: AppConfig = Self::figment(file).extract()?;
        config.validate()?;
        Ok(config)
    }
    /// Check value ranges which serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::InvalidParameter("window_size must be positive".to_owned()));
        }
        if !(self.train_fraction > 0.0 && self.train_fraction <= 1.0) {
            return Err(Error::InvalidParameter(format!(
                "train_fraction {} is not in (0, 1]",
                self.train_fraction
            )));
        }
        if !(self.direction_threshold >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "direction_threshold {} is negative",
                self.direction_threshold
            )));
        }
        Ok(())
    }
    /// Find a configured asset by symbol, ignoring case
    pub fn asset(&self, symbol: &str) -> Option<&AssetConfig> {
        self.assets
            .iter()
            .find(|asset| asset.symbol.eq_ignore_ascii_case(symbol))
    }
    /// The configured market data source
    pub fn market_source(&self) -> Result<Arc<dyn MarketDataSource>> {
        Ok(match &self.market.csv_dir {
            Some(dir) => Arc::new(CsvMarketData::new(dir.clone())),
            None => Arc::new(YahooFinance::new(
                self.market.base_url.clone(),
                Duration::from_secs(self.market.timeout_secs),
            )?),
        })
    }
    /// The configured revision source
    pub fn revision_source(&self) -> Result<Arc<dyn RevisionSource>> {
        Ok(Arc::new(MediaWiki::new(
            self.wiki.api_url.clone(),
            Duration::from_secs(self.wiki.timeout_secs),
        )?))
    }
    /// The configured sentiment classifier
    pub fn classifier(&self) -> Result<Arc<dyn SentimentClassifier>> {
        Ok(match self.sentiment.backend {
            SentimentBackend::Lexicon => Arc::new(LexiconClassifier::new()),
            SentimentBackend::HuggingFace => Arc::new(HuggingFaceClassifier::new(
                self.sentiment.url.clone(),
                self.sentiment.token.clone(),
                Duration::from_secs(self.sentiment.timeout_secs),
            )?),
        })
    }
}
