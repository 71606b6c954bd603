use crate::error::Result;
use crate::logger::LogSink;

use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One entry of the model catalog (`models.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    #[serde(default)]
    pub url: String,
    pub dockerfile: String,
    pub scripts: String,
    #[serde(default)]
    pub n_gpus: String,
    #[serde(default)]
    pub training_precision: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Partial model settings layered over a catalog entry.
///
/// Present scalar fields replace their counterpart; the `env` mapping
/// deep-merges key-wise; `tags` replaces wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelOverlay {
    pub url: Option<String>,
    pub dockerfile: Option<String>,
    pub scripts: Option<String>,
    pub n_gpus: Option<String>,
    pub training_precision: Option<String>,
    pub tags: Option<Vec<String>>,
    pub args: Option<String>,
    pub env: Option<BTreeMap<String, String>>,
    pub timeout: Option<u64>,
}

impl ModelDefinition {
    pub fn apply_overlay(&mut self, overlay: &ModelOverlay) {
        if let Some(url) = &overlay.url {
            self.url = url.clone();
        }
        if let Some(dockerfile) = &overlay.dockerfile {
            self.dockerfile = dockerfile.clone();
        }
        if let Some(scripts) = &overlay.scripts {
            self.scripts = scripts.clone();
        }
        if let Some(n_gpus) = &overlay.n_gpus {
            self.n_gpus = n_gpus.clone();
        }
        if let Some(training_precision) = &overlay.training_precision {
            self.training_precision = training_precision.clone();
        }
        if let Some(tags) = &overlay.tags {
            self.tags = tags.clone();
        }
        if let Some(args) = &overlay.args {
            self.args = args.clone();
        }
        if let Some(env) = &overlay.env {
            for (key, value) in env {
                self.env.insert(key.clone(), value.clone());
            }
        }
        if let Some(timeout) = overlay.timeout {
            self.timeout = Some(timeout);
        }
    }
}

/// Load the model catalog.
pub fn load_models(path: &Path, log: &dyn LogSink) -> Result<Vec<ModelDefinition>> {
    let content = fs::read_to_string(path)?;
    let models: Vec<ModelDefinition> = serde_json::from_str(&content)?;
    log.debug(&format!(
        "Loaded {} model definitions from {}",
        models.len(),
        path.display()
    ));
    Ok(models)
}
