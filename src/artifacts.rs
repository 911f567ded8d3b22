/*!
On-disk layout of per-asset training artifacts
*/
use crate::data::scale::{load_scaler, save_scaler, MinMaxScaler};
use crate::error::Result;
use crate::model::{load_model, PredictionModel, MODEL_FILE};
use std::path::{Path, PathBuf};
use tracing::info;

/// The feature scaler's file name
pub const FEATURE_SCALER_FILE: &str = "scaler_features.json";

/// The target scaler's file name
pub const TARGET_SCALER_FILE: &str = "scaler_target.json";

/// The wiki series cache's file name
pub const WIKI_CACHE_FILE: &str = "wikipedia_edits.csv";

/// A model together with the scalers it was trained with
pub struct AssetArtifacts {
    /// The trained model
    pub model: Box<dyn PredictionModel>,
    /// Scales feature rows
    pub feature_scaler: MinMaxScaler,
    /// Scales and unscales closing prices
    pub target_scaler: MinMaxScaler,
}

/// A directory holding one subdirectory of artifacts per asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Use `root` as the artifact directory
    pub fn new(root: impl Into<PathBuf>) -> ArtifactStore {
        ArtifactStore { root: root.into() }
    }
    /// The artifact directory
    pub fn root(&self) -> &Path {
        &self.root
    }
    /// The directory of an asset's artifacts. Symbols are case-insensitive.
    pub fn asset_dir(&self, symbol: &str) -> PathBuf {
        self.root.join(symbol.to_lowercase())
    }
    /// Where an asset's model lives
    pub fn model_path(&self, symbol: &str) -> PathBuf {
        self.asset_dir(symbol).join(MODEL_FILE)
    }
    /// Where an asset's feature scaler lives
    pub fn feature_scaler_path(&self, symbol: &str) -> PathBuf {
        self.asset_dir(symbol).join(FEATURE_SCALER_FILE)
    }
    /// Where an asset's target scaler lives
    pub fn target_scaler_path(&self, symbol: &str) -> PathBuf {
        self.asset_dir(symbol).join(TARGET_SCALER_FILE)
    }
    /// Where an asset's wiki series is cached
    pub fn wiki_cache_path(&self, symbol: &str) -> PathBuf {
        self.asset_dir(symbol).join(WIKI_CACHE_FILE)
    }
    /// Whether a complete set of artifacts exists for an asset
    pub fn has_asset(&self, symbol: &str) -> bool {
        self.model_path(symbol).is_file()
            && self.feature_scaler_path(symbol).is_file()
            && self.target_scaler_path(symbol).is_file()
    }
    /// Persist a model and its scalers
    pub fn save(
        &self,
        symbol: &str,
        model: &dyn PredictionModel,
        feature_scaler: &MinMaxScaler,
        target_scaler: &MinMaxScaler,
    ) -> Result<()> {
        let dir = self.asset_dir(symbol);
        std::fs::create_dir_all(&dir)?;
        model.save(&self.model_path(symbol))?;
        save_scaler(&self.feature_scaler_path(symbol), feature_scaler)?;
        save_scaler(&self.target_scaler_path(symbol), target_scaler)?;
        info!(symbol, dir = %dir.display(), "saved artifacts");
        Ok(())
    }
    /// Load a model and its scalers
    pub fn load(&self, symbol: &str) -> Result<AssetArtifacts> {
        Ok(AssetArtifacts {
            model: load_model(&self.model_path(symbol))?,
            feature_scaler: load_scaler(&self.feature_scaler_path(symbol))?,
            target_scaler: load_scaler(&self.target_scaler_path(symbol))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_lower_case_per_asset() {
        let store = ArtifactStore::new("/tmp/artifacts");
        assert_eq!(store.asset_dir("BTC"), Path::new("/tmp/artifacts/btc"));
        assert_eq!(
            store.wiki_cache_path("Eth"),
            Path::new("/tmp/artifacts/eth/wikipedia_edits.csv")
        );
        assert_eq!(
            store.feature_scaler_path("doge"),
            Path::new("/tmp/artifacts/doge/scaler_features.json")
        );
        assert!(store.model_path("btc").ends_with(MODEL_FILE));
    }

    #[cfg(not(feature = "torch"))]
    #[test]
    fn save_then_load() {
        use crate::model::LinearWindowModel;
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(!store.has_asset("BTC"));
        let mut model = LinearWindowModel::zeros(3);
        model.bias = 0.25;
        let features: MinMaxScaler = MinMaxScaler::fit(&[[0.0, 1.0], [2.0, 3.0]], 2);
        let target: MinMaxScaler = MinMaxScaler::fit_column(&[10.0, 20.0]);
        store.save("BTC", &model, &features, &target).unwrap();
        assert!(store.has_asset("btc"));

        let loaded = store.load("BTC").unwrap();
        assert_eq!(loaded.feature_scaler, features);
        assert_eq!(loaded.target_scaler, target);
        let window = vec![[0.0; crate::data::FEATURES]; 3];
        let prediction = loaded.model.predict(&[window]).unwrap();
        assert!((prediction[0] - 0.25).abs() < 1e-12);
    }
}
