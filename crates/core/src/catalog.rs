//! Catalog / content repository.
//!
//! A catalog is an ordered, immutable-after-load list of named entries read
//! from a JSON array. Lookups go through a single [`MatchPolicy`] so the
//! matching rule can change without touching callers.

use crate::error::{CoreError, Result};
use crate::store::write_pretty;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Anything that can be looked up by display name.
pub trait Named {
    fn name(&self) -> &str;
}

/// A purchasable or selectable item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Named for CatalogEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Decides which candidate name a spoken query refers to.
pub trait MatchPolicy: Send + Sync {
    /// Returns the index of the chosen candidate, if any.
    fn select(&self, query: &str, candidates: &[&str]) -> Option<usize>;
}

/// Case-insensitive substring match, first hit wins, no ranking.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatch;

impl MatchPolicy for SubstringMatch {
    fn select(&self, query: &str, candidates: &[&str]) -> Option<usize> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        candidates
            .iter()
            .position(|name| name.to_lowercase().contains(&needle))
    }
}

/// Case-insensitive whole-name match.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl MatchPolicy for ExactMatch {
    fn select(&self, query: &str, candidates: &[&str]) -> Option<usize> {
        let needle = query.trim();
        candidates
            .iter()
            .position(|name| name.eq_ignore_ascii_case(needle))
    }
}

/// Skim-style fuzzy scoring; the best score wins, ties go to the earlier entry.
#[derive(Default)]
pub struct FuzzyMatch {
    matcher: SkimMatcherV2,
}

impl MatchPolicy for FuzzyMatch {
    fn select(&self, query: &str, candidates: &[&str]) -> Option<usize> {
        let needle = query.trim();
        if needle.is_empty() {
            return None;
        }
        let mut best: Option<(usize, i64)> = None;
        for (idx, name) in candidates.iter().enumerate() {
            if let Some(score) = self.matcher.fuzzy_match(name, needle) {
                if best.is_none_or(|(_, top)| score > top) {
                    best = Some((idx, score));
                }
            }
        }
        best.map(|(idx, _)| idx)
    }
}

/// An ordered list of entries with a pluggable lookup rule.
#[derive(Clone)]
pub struct Catalog<T> {
    entries: Vec<T>,
    policy: Arc<dyn MatchPolicy>,
    source: Option<PathBuf>,
}

impl<T> fmt::Debug for Catalog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("entries", &self.entries.len())
            .field("source", &self.source)
            .finish()
    }
}

impl<T: Named> Catalog<T> {
    /// Builds an in-memory catalog that is not backed by a file.
    pub fn from_entries(entries: Vec<T>) -> Self {
        Self {
            entries,
            policy: Arc::new(SubstringMatch),
            source: None,
        }
    }

    /// Swaps the matching rule used by [`Catalog::lookup`].
    pub fn with_policy(mut self, policy: Arc<dyn MatchPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn lookup(&self, query: &str) -> Option<&T> {
        let names: Vec<&str> = self.entries.iter().map(Named::name).collect();
        self.policy
            .select(query, &names)
            .and_then(|idx| self.entries.get(idx))
    }

    pub fn all(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Named + Serialize + DeserializeOwned> Catalog<T> {
    /// Reads a JSON array from `path`. A missing or malformed file is fatal
    /// for the caller; there is no fallback content.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| CoreError::ContentLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let entries: Vec<T> = serde_json::from_str(&raw).map_err(|e| CoreError::ContentLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!(path = %path.display(), count = entries.len(), "Catalog loaded");
        Ok(Self {
            entries,
            policy: Arc::new(SubstringMatch),
            source: Some(path.to_path_buf()),
        })
    }

    /// Adds an entry and rewrites the whole backing file.
    pub fn append(&mut self, entry: T) -> Result<()> {
        self.entries.push(entry);
        if let Some(path) = &self.source {
            write_pretty(path, &self.entries)?;
        }
        Ok(())
    }
}
