// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration for the source model

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ModelError, ModelResult};
use crate::parser::NativeKeywords;

/// Scope tree cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether scope trees are cached at all
    pub enabled: bool,
    /// Maximum number of cached trees; the oldest is evicted beyond this
    pub max_entries: usize,
    /// Always rebuild the tree of the active document
    pub always_rebuild_active: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
            always_rebuild_active: true,
        }
    }
}

/// Where native keyword names come from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordSource {
    /// The built-in table only
    #[default]
    Builtin,
    /// The built-in table plus a JSON keyword list on disk
    File(PathBuf),
    /// The built-in table plus the given names
    Inline(Vec<String>),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Scope tree cache settings
    pub cache: CacheConfig,
    /// Native keyword source
    pub keywords: KeywordSource,
}

impl ModelConfig {
    /// Create a config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache settings
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the keyword source
    pub fn with_keywords(mut self, keywords: KeywordSource) -> Self {
        self.keywords = keywords;
        self
    }

    /// Set the maximum number of cached scope trees
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.cache.max_entries = max_entries;
        self
    }

    /// Enable or disable the scope tree cache
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
        Self::from_json_str(&json)
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> ModelResult<()> {
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ModelError::config(
                "cache.max_entries must be positive when the cache is enabled",
            ));
        }
        Ok(())
    }

    /// Build the keyword oracle described by `keywords`
    pub fn load_keywords(&self) -> ModelResult<NativeKeywords> {
        match &self.keywords {
            KeywordSource::Builtin => Ok(NativeKeywords::builtin()),
            KeywordSource::File(path) => NativeKeywords::from_json_file(path),
            KeywordSource::Inline(names) => Ok(NativeKeywords::builtin().with_names(names)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::KeywordOracle;

    #[test]
    fn test_defaults() {
        let config = ModelConfig::new();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.keywords, KeywordSource::Builtin);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ModelConfig::new()
            .with_max_entries(5)
            .with_cache_enabled(false)
            .with_keywords(KeywordSource::Inline(vec!["MyFn".into()]));
        assert_eq!(config.cache.max_entries, 5);
        assert!(!config.cache.enabled);
        assert!(config.load_keywords().unwrap().is_native("myfn"));
    }

    #[test]
    fn test_from_json() {
        let config = ModelConfig::from_json_str(
            r#"{ "cache": { "max_entries": 10 }, "keywords": { "inline": ["a-b"] } }"#,
        )
        .unwrap();
        assert_eq!(config.cache.max_entries, 10);
        assert!(config.cache.always_rebuild_active);
        assert_eq!(config.keywords, KeywordSource::Inline(vec!["a-b".into()]));

        let config = ModelConfig::from_json_str(r#"{ "keywords": "builtin" }"#).unwrap();
        assert_eq!(config.keywords, KeywordSource::Builtin);
    }

    #[test]
    fn test_invalid_config() {
        let result = ModelConfig::from_json_str(r#"{ "cache": { "max_entries": 0 } }"#);
        assert!(matches!(result, Err(ModelError::Config { .. })));
        assert!(matches!(
            ModelConfig::from_json_str("{ nope"),
            Err(ModelError::Json(_))
        ));
    }
}
