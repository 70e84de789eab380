use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tuning for a function collection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Functions enriched at the same time; each one issues up to three facade calls
    pub max_concurrent_records: usize,
    /// Regions collected when none are given on the command line
    pub regions: Vec<String>,
    /// Tracing filter used by the binary when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_records: 20,
            regions: vec!["us-east-1".to_string()],
            log_filter: "awsaudit=info,aws_config=warn,aws_smithy_runtime=warn,hyper=warn"
                .to_string(),
        }
    }
}

impl CollectorConfig {
    /// Default location: `config.toml` in the per-user config directory
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "", "awsaudit")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load a TOML config file; missing keys keep their defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: CollectorConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, falling back to defaults when no file exists
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file {}", path.as_ref().display()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent_records == 0 {
            anyhow::bail!("max_concurrent_records must be at least 1");
        }
        if let Some(region) = self.regions.iter().find(|r| r.trim().is_empty()) {
            anyhow::bail!("invalid region {:?} in config", region);
        }
        Ok(())
    }
}
