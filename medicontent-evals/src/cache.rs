// Copyright 2025 Medicontent Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Shared cache of compiled checklists, keyed by rule-source content hash

use crate::checklist::{CompiledChecklist, RuleSource};
use medicontent_core::{EvalMode, ItemId};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Read-only compiled checklists shared across concurrent evaluations
#[derive(Clone)]
pub struct PatternCache {
    cache: Cache<String, Arc<CompiledChecklist>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl PatternCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_capacity).build(),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return the compiled checklist for this rule-source version, compiling
    /// it on first use
    pub fn get_or_compile(
        &self,
        mode: EvalMode,
        source: &RuleSource,
        weights: &BTreeMap<ItemId, f64>,
    ) -> Arc<CompiledChecklist> {
        let key = source.fingerprint(mode, weights);

        let short_key = key[..12].to_string();

        // Concurrent callers for one key wait on a single compile
        let mut compiled_here = false;
        let compiled = self.cache.get_with(key, || {
            compiled_here = true;
            debug!(%mode, key = %short_key, "compiling checklist");
            Arc::new(CompiledChecklist::compile(mode, source, weights))
        });

        let counter = if compiled_here { &self.misses } else { &self.hits };
        counter.fetch_add(1, Ordering::Relaxed);
        compiled
    }

    /// Clear entire cache
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            entry_count: self.cache.entry_count(),
        }
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entry_count: u64,
}
