use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::LitError;

pub const DEFAULT_CONFIG_FILE: &str = "placenta-lit.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub max_threads: Option<usize>,
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub placenta_keywords: Option<Vec<String>>,
    #[serde(default)]
    pub query_terms: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub ocr: Option<bool>,
    #[serde(default)]
    pub min_mention_count: Option<usize>,
    #[serde(default)]
    pub max_mentions_per_document: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub max_threads: usize,
    pub output_file: String,
    pub column: String,
    pub placenta_keywords: Vec<String>,
    pub query_terms: String,
    pub request_timeout_secs: u64,
    pub ocr: bool,
    pub min_mention_count: usize,
    pub max_mentions_per_document: usize,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ConfigLoader::resolve_config(Config::default())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Explicit paths must exist; the default file is optional.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, LitError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| LitError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| LitError::ConfigParse(err.to_string()))?;

        tracing::debug!(path = %config_path.display(), "loaded config");
        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        let placenta_keywords = config
            .placenta_keywords
            .map(|keywords| {
                keywords
                    .into_iter()
                    .map(|keyword| keyword.trim().to_lowercase())
                    .filter(|keyword| !keyword.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|keywords| !keywords.is_empty())
            .unwrap_or_else(default_placenta_keywords);

        ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            max_threads: config.max_threads.unwrap_or(6).max(1),
            output_file: config
                .output_file
                .unwrap_or_else(|| "analysis_results.xlsx".to_string()),
            column: config.column.unwrap_or_else(|| "Gene".to_string()),
            placenta_keywords,
            query_terms: config
                .query_terms
                .unwrap_or_else(|| "placenta human".to_string()),
            request_timeout_secs: config.request_timeout_secs.unwrap_or(15),
            ocr: config.ocr.unwrap_or(true),
            min_mention_count: config.min_mention_count.unwrap_or(2),
            max_mentions_per_document: config.max_mentions_per_document.unwrap_or(25),
        }
    }
}

pub fn default_placenta_keywords() -> Vec<String> {
    vec![
        "placenta".to_string(),
        "placental".to_string(),
        "trophoblast".to_string(),
        "chorionic".to_string(),
        "fetal maternal interface".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default());
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.max_threads, 6);
        assert_eq!(resolved.column, "Gene");
        assert_eq!(resolved.output_file, "analysis_results.xlsx");
        assert_eq!(resolved.placenta_keywords, default_placenta_keywords());
    }

    #[test]
    fn zero_threads_clamped() {
        let config = Config {
            max_threads: Some(0),
            ..Config::default()
        };
        assert_eq!(ConfigLoader::resolve_config(config).max_threads, 1);
    }
}
