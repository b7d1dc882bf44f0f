use crate::error::{Result, RuleError};
use serde::{Deserialize, Serialize};
use std::path::Path;

const MAX_WORKER_THREADS: usize = 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ParserConfig {
    /// What to do with option keywords the parser does not model
    #[serde(default)]
    pub unknown_keywords: UnknownKeywords,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKeywords {
    /// Discard silently (debug log only)
    #[default]
    Ignore,
    /// Discard with a warning
    Warn,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Parser threads for batch parsing, 0 = one per CPU
    #[serde(default)]
    pub worker_threads: usize,
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;

        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.worker_threads > MAX_WORKER_THREADS {
            return Err(RuleError::ConfigError(format!(
                "Worker threads cannot exceed {}",
                MAX_WORKER_THREADS
            )));
        }

        Ok(())
    }

    pub fn default_config() -> Self {
        Settings {
            parser: ParserConfig {
                unknown_keywords: UnknownKeywords::Ignore,
            },
            batch: BatchConfig { worker_threads: 0 },
        }
    }
}
