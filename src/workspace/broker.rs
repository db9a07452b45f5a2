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

//! Cross-document scope tree cache
//!
//! The broker owns one cache of scope trees keyed by normalized file path.
//! Trees are immutable once built and shared through `Arc`; replacing or
//! invalidating an entry disposes the old tree so every holder sees
//! `is_valid() == false` right away.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::document::{LispDocument, normalize_file_path};
use crate::analyzer::ScopeTree;
use crate::config::{CacheConfig, ModelConfig};
use crate::error::ModelResult;
use crate::parser::{KeywordOracle, NativeKeywords};

/// Statistics about the scope tree cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that built a tree
    pub misses: u64,
    /// Trees currently cached
    pub entries: usize,
    /// Trees dropped to stay under the size limit
    pub evictions: u64,
}

impl BrokerStats {
    /// Cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            (self.hits as f64) / ((self.hits + self.misses) as f64) * 100.0
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    tree: Arc<ScopeTree>,
    created_at: Instant,
}

/// Caches one scope tree per document and answers cross-document queries
pub struct SymbolBroker {
    cache: DashMap<String, CacheEntry>,
    config: CacheConfig,
    oracle: Arc<dyn KeywordOracle>,
    active: RwLock<Option<String>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl SymbolBroker {
    /// Broker with default cache settings and the built-in keyword table
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default(), Arc::new(NativeKeywords::builtin()))
    }

    /// Broker with custom settings and keyword oracle
    pub fn with_config(config: CacheConfig, oracle: Arc<dyn KeywordOracle>) -> Self {
        Self {
            cache: DashMap::new(),
            config,
            oracle,
            active: RwLock::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Broker built from a validated configuration, loading its keyword list
    pub fn from_config(config: &ModelConfig) -> ModelResult<Self> {
        config.validate()?;
        let keywords = config.load_keywords()?;
        log::debug!("symbol broker using {} native keywords", keywords.len());
        Ok(Self::with_config(config.cache.clone(), Arc::new(keywords)))
    }

    /// Cache settings
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Mark the document being edited; its tree is rebuilt on every request
    pub fn set_active_document(&self, path: Option<&str>) {
        *self.active.write() = path.map(normalize_file_path);
    }

    /// Normalized path of the active document
    pub fn active_document(&self) -> Option<String> {
        self.active.read().clone()
    }

    /// Scope tree of `document`, rebuilt when forced, missing, disposed or
    /// active
    pub fn get_scope_tree(&self, document: &LispDocument, force_update: bool) -> Arc<ScopeTree> {
        let key = document.normalized_path();
        let is_active = self.config.always_rebuild_active
            && self.active.read().as_deref() == Some(key.as_str());

        if self.config.enabled && !force_update && !is_active {
            if let Some(entry) = self.cache.get(&key) {
                if entry.tree.is_valid() {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    log::trace!("scope tree cache hit for {key}");
                    return Arc::clone(&entry.tree);
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let tree = Arc::new(ScopeTree::build(
            document.file_name(),
            document.model(),
            self.oracle.as_ref(),
        ));
        if !self.config.enabled {
            return tree;
        }

        if !self.cache.contains_key(&key) && self.cache.len() >= self.config.max_entries {
            self.evict_oldest();
        }
        let entry = CacheEntry {
            tree: Arc::clone(&tree),
            created_at: Instant::now(),
        };
        if let Some(previous) = self.cache.insert(key, entry) {
            previous.tree.dispose();
        }
        tree
    }

    /// Cached tree for `path`, if any
    pub fn cached(&self, path: &str) -> Option<Arc<ScopeTree>> {
        self.cache
            .get(&normalize_file_path(path))
            .map(|entry| Arc::clone(&entry.tree))
    }

    /// Dispose and drop every cached tree; returns how many there were
    pub fn invalidate(&self) -> usize {
        let count = self.cache.len();
        for entry in self.cache.iter() {
            entry.tree.dispose();
        }
        self.cache.clear();
        log::debug!("invalidated {count} cached scope trees");
        count
    }

    /// Dispose and drop the tree of one document
    pub fn invalidate_document(&self, path: &str) -> bool {
        match self.cache.remove(&normalize_file_path(path)) {
            Some((_, entry)) => {
                entry.tree.dispose();
                true
            }
            None => false,
        }
    }

    /// Cache statistics
    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Whether any user symbol of a Lisp document carries an export flag
    pub fn has_unverified_exports(&self, document: &LispDocument) -> bool {
        if !document.is_lisp() {
            return false;
        }
        let atoms = document.model().flatten();
        document
            .model()
            .symbol_table()
            .values()
            .flatten()
            .any(|&index| atoms[index].has_export_flag())
    }

    /// Flat indices of export-flagged occurrences of `lower_key`
    ///
    /// Unverified: the flag alone does not prove the binding is global.
    pub fn unverified_export_list(&self, document: &LispDocument, lower_key: &str) -> Vec<usize> {
        let atoms = document.model().flatten();
        document
            .model()
            .occurrences(lower_key)
            .iter()
            .copied()
            .filter(|&index| atoms[index].has_export_flag())
            .collect()
    }

    /// Whether `lower_key` has an export-flagged occurrence that resolves to
    /// the document root scope
    pub fn has_exported_target_key(&self, document: &LispDocument, lower_key: &str) -> bool {
        let flagged = self.unverified_export_list(document, lower_key);
        if flagged.is_empty() {
            return false;
        }
        let tree = self.get_scope_tree(document, true);
        flagged.into_iter().any(|index| {
            tree.reference_at(index)
                .and_then(|id| tree.reference_localizing_parent(id))
                .is_some_and(|host| host == tree.root())
        })
    }

    fn evict_oldest(&self) {
        let oldest = self
            .cache
            .iter()
            .min_by_key(|entry| entry.value().created_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            if let Some((_, entry)) = self.cache.remove(&key) {
                entry.tree.dispose();
                self.evictions.fetch_add(1, Ordering::Relaxed);
                log::debug!("evicted scope tree for {key}");
            }
        }
    }
}

impl Default for SymbolBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SymbolBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolBroker")
            .field("config", &self.config)
            .field("entries", &self.cache.len())
            .field("active", &*self.active.read())
            .finish()
    }
}
