use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detect::ScorePolicy;
use crate::error::{Error, Result};
use crate::tensor::PreprocessConfig;

/// Model artifact looked up when nothing else is configured.
pub const DEFAULT_MODEL_PATH: &str = "plant_disease_model.json";

/// Runtime settings shared by the CLI and the app server.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model_path: PathBuf,
    pub preprocess: PreprocessConfig,
    pub score_policy: ScorePolicy,
    /// Listen address of the app server.
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            preprocess: PreprocessConfig::default(),
            score_policy: ScorePolicy::default(),
            bind_addr: "127.0.0.1:7878".to_owned(),
        }
    }
}

impl Config {
    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// `load` when a path is given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(p) => Config::load(p),
            None => Ok(Config::default()),
        }
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
