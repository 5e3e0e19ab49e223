use crate::catalog::{CatalogEntry, StaticCatalog};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DB: &str = "MODELCERT_DB";
pub const ENV_REGION: &str = "MODELCERT_REGION";
pub const ENV_LOG: &str = "MODELCERT_LOG";
pub const ENV_VALIDITY_DAYS: &str = "MODELCERT_VALIDITY_DAYS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub validity_days: i64,
    pub default_region: String,
    pub categorization_budget_us: u64,
    pub store_path: Option<PathBuf>,
    pub log_level: String,
    pub models: Vec<CatalogEntry>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            validity_days: 7,
            default_region: "us-east-1".to_string(),
            categorization_budget_us: 1000,
            store_path: None,
            log_level: "info".to_string(),
            models: Vec::new(),
        }
    }
}

impl EngineSettings {
    pub fn categorization_budget(&self) -> Duration {
        Duration::from_micros(self.categorization_budget_us)
    }

    pub fn catalog(&self) -> StaticCatalog {
        StaticCatalog::new(self.models.clone())
    }

    /// Overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|k| std::env::var(k).ok());
    }

    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_DB) {
            self.store_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup(ENV_REGION) {
            self.default_region = v;
        }
        if let Some(v) = lookup(ENV_LOG) {
            self.log_level = v;
        }
        if let Some(v) = lookup(ENV_VALIDITY_DAYS) {
            if let Ok(n) = v.parse() {
                self.validity_days = n;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validity_days <= 0 {
            return Err(ConfigError(format!(
                "validity_days must be positive (got {})",
                self.validity_days
            )));
        }
        if self.default_region.trim().is_empty() {
            return Err(ConfigError("default_region must not be empty".into()));
        }
        let mut seen = BTreeSet::new();
        for m in &self.models {
            if !seen.insert(m.model_id.as_str()) {
                return Err(ConfigError(format!(
                    "model {} is listed more than once",
                    m.model_id
                )));
            }
        }
        Ok(())
    }
}

pub fn load_settings(path: &Path, strict: bool) -> Result<EngineSettings, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    load_settings_str(&raw, strict)
        .map_err(|e| ConfigError(format!("{} (file: {})", e.0, path.display())))
}

/// Unknown keys are an error when `strict`, a warning otherwise.
pub fn load_settings_str(raw: &str, strict: bool) -> Result<EngineSettings, ConfigError> {
    let mut ignored = BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);
    let settings: EngineSettings = serde_ignored::deserialize(deserializer, |path| {
        ignored.insert(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    // anchors and extension keys are allowed anywhere
    let unknown: Vec<&String> = ignored
        .iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();
    if !unknown.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "unknown fields detected in strict mode: {:?}",
                unknown
            )));
        }
        tracing::warn!(
            event = "modelcert.config.unknown_fields",
            fields = ?unknown,
            "ignoring unknown config fields"
        );
    }

    settings.validate()?;
    Ok(settings)
}
