//! Content-addressed memo of the path-independent transform phase.

use std::collections::HashMap;

use crate::config::FrontMatterField;
use crate::transform::{self, Prepared};
use crate::types::Checksum;

/// Memoizes [`transform::prepare`] by content checksum for one run.
///
/// Only path- and version-independent work is cached; the render pass runs
/// for every document. Run-wide options are fixed at construction so a
/// cached entry never outlives the options it was computed with.
#[derive(Debug)]
pub struct ContentCache {
    /// Entries by checksum.
    entries: HashMap<Checksum, Prepared>,
    /// Front-matter fields the prepare phase rewrites.
    front_matter: Vec<FrontMatterField>,
    /// Lookups answered from the cache.
    hits: usize,
    /// Lookups that ran the prepare phase.
    misses: usize,
}

impl ContentCache {
    /// An empty cache for a run with the given front-matter policy.
    pub fn new(front_matter: Vec<FrontMatterField>) -> Self {
        return Self {
            entries: HashMap::new(),
            front_matter,
            hits: 0,
            misses: 0,
        };
    }

    /// Look up a prepared document.
    pub fn get(&self, checksum: &Checksum) -> Option<&Prepared> {
        return self.entries.get(checksum);
    }

    /// Store a prepared document.
    pub fn put(&mut self, checksum: Checksum, entry: Prepared) {
        self.entries.insert(checksum, entry);
    }

    /// Return the prepared document for `content`, running the prepare
    /// phase only on a miss.
    pub fn prepare(&mut self, checksum: &Checksum, content: &str) -> Prepared {
        if let Some(entry) = self.get(checksum).cloned() {
            self.hits = self.hits.saturating_add(1);
            log::trace!("cache hit {}", checksum.0);
            return entry;
        }

        self.misses = self.misses.saturating_add(1);
        let entry = transform::prepare(content, &self.front_matter);
        self.put(checksum.clone(), entry.clone());
        return entry;
    }

    /// Lookups answered from the cache.
    pub const fn hits(&self) -> usize {
        return self.hits;
    }

    /// Times the prepare phase actually ran.
    pub const fn misses(&self) -> usize {
        return self.misses;
    }

    /// Number of distinct checksums stored.
    pub fn distinct(&self) -> usize {
        return self.entries.len();
    }
}
