//! Deduplication of output paths.
//!
//! Overlapping regions routinely select the same catalogue entry more than
//! once, and several recipes may render to the same drain. The [`DedupCache`]
//! is the gate that guarantees at most one task per drain path for the whole
//! run: the first claim wins, every later claim is a duplicate.
//!
//! The cache lives for the process lifetime and is never evicted or persisted.
//! Work already done by an earlier run is detected from the filesystem instead.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashSet;

/// Set of claimed drain paths with race-free claim semantics.
#[derive(Debug, Default)]
pub struct DedupCache {
    claimed: DashSet<PathBuf>,
    rejected: AtomicU64,
}

impl DedupCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `path`.
    ///
    /// Returns true the first time a path is seen and false on every later
    /// call for the same path, including concurrent ones.
    pub fn claim(&self, path: &Path) -> bool {
        let first = self.claimed.insert(path.to_path_buf());
        if !first {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
        first
    }

    /// Returns true if `path` has been claimed.
    pub fn is_claimed(&self, path: &Path) -> bool {
        self.claimed.contains(path)
    }

    /// Number of distinct claimed paths.
    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    /// Returns true if nothing has been claimed.
    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }

    /// Number of rejected (duplicate) claims.
    pub fn duplicates(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_claim_wins() {
        let cache = DedupCache::new();
        let path = Path::new("/m/laz/b_35/TM_462_101.laz");

        assert!(cache.claim(path));
        assert!(!cache.claim(path));
        assert!(!cache.claim(path));

        assert!(cache.is_claimed(path));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.duplicates(), 2);
    }

    #[test]
    fn test_distinct_paths_are_independent() {
        let cache = DedupCache::new();
        assert!(cache.claim(Path::new("/m/a.png")));
        assert!(cache.claim(Path::new("/m/b.png")));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.duplicates(), 0);
    }

    #[test]
    fn test_concurrent_claims_admit_exactly_one() {
        let cache = Arc::new(DedupCache::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.claim(Path::new("/m/shared.bin")))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(cache.duplicates(), 15);
    }
}
