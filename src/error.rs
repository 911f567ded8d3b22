/*!
Error types shared by the data pipeline, the models and the inference service
*/
use thiserror::Error;

/// A `Result` specialized to this crate's `Error`
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while building datasets, training or predicting
#[derive(Debug, Error)]
pub enum Error {
    /// An upstream fetch returned nothing
    #[error("no data available for {ticker}")]
    DataUnavailable {
        /// The ticker or page which came back empty
        ticker: String,
    },
    /// Fewer rows than a full lookback window
    #[error("insufficient data for prediction: required {required}, obtained {obtained}")]
    InsufficientData {
        /// Rows needed
        required: usize,
        /// Rows actually available
        obtained: usize,
    },
    /// An asset which has no loaded model was requested
    #[error("asset {requested:?} not found, available: {}", .available.join(", "))]
    AssetNotFound {
        /// The symbol asked for
        requested: String,
        /// Symbols currently loaded
        available: Vec<String>,
    },
    /// No symbol was given and no single default asset exists
    #[error("no symbol given, available: {}", .available.join(", "))]
    MissingSymbol {
        /// Symbols currently loaded
        available: Vec<String>,
    },
    /// A caller-supplied parameter is out of range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Sentiment scoring failed; recovered as a neutral score by the annotator
    #[error("sentiment scoring failed: {0}")]
    Scoring(String),
    /// A persisted artifact could not be interpreted
    #[error("bad artifact format: {0}")]
    ArtifactFormat(String),
    /// The model backend failed
    #[error("model error: {0}")]
    Model(String),
    /// IO error
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// CSV error
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// JSON error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// HTTP client error
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// Configuration error
    #[error(transparent)]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Error {
        Error::Config(Box::new(err))
    }
}

#[cfg(feature = "torch")]
impl From<tch::TchError> for Error {
    fn from(err: tch::TchError) -> Error {
        Error::Model(err.to_string())
    }
}
