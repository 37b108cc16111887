//! The process-wide directory cache.
//!
//! Maps logical paths to [`DirectoryEntry`] values, populating lazily from
//! disk. Lookups and inserts are concurrent; a racing duplicate insert is
//! resolved by the map's insert-if-absent (first writer wins, the loser's
//! scan is discarded). Directory scans run outside the map lock, so two
//! threads may redundantly scan a cold path; that is an accepted, bounded
//! cost.
//!
//! # Hit/miss accounting
//!
//! A hit is a direct map lookup success for the literal key queried. A miss
//! is charged when the literal key is absent, and reversed if the
//! file-to-parent-directory fallback finds the parent already cached: an
//! indirect lookup through a warm key is not a cold miss. The counters are
//! monitoring aids only and are approximate under concurrent races.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::{parent_path, DirectoryEntry, FileClass, FileEntry, ScanRoots};

// =============================================================================
// Counters
// =============================================================================

/// Shared cache statistics.
///
/// Injected at cache construction so independent caches (and tests) stay
/// isolated; never used for control decisions.
#[derive(Debug, Default)]
pub struct CacheCounters {
    /// Approximate number of files indexed across all entries
    files: AtomicUsize,

    /// Direct lookup successes
    hits: AtomicUsize,

    /// Cold misses (indirect warm lookups are reversed)
    misses: AtomicUsize,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> usize {
        self.files.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    fn add_files(&self, n: usize) {
        self.files.fetch_add(n, Ordering::Relaxed);
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Take back a charged miss: the fallback resolution was already warm.
    fn reverse_miss(&self) {
        self.misses.fetch_sub(1, Ordering::Relaxed);
    }
}

// =============================================================================
// Directory Cache
// =============================================================================

/// Concurrent logical-path -> [`DirectoryEntry`] store with lazy population.
pub struct DirectoryCache {
    map: RwLock<HashMap<String, Arc<DirectoryEntry>>>,

    roots: Arc<ScanRoots>,

    counters: Arc<CacheCounters>,
}

impl DirectoryCache {
    /// Create a cache over the given base directories (highest resolution
    /// first) with its own counters.
    pub fn new(base_dirs: Vec<PathBuf>, file_class: FileClass) -> Self {
        Self::with_counters(base_dirs, file_class, Arc::new(CacheCounters::new()))
    }

    /// Create a cache sharing an externally owned counters struct.
    pub fn with_counters(
        base_dirs: Vec<PathBuf>,
        file_class: FileClass,
        counters: Arc<CacheCounters>,
    ) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            roots: Arc::new(ScanRoots::new(base_dirs, file_class)),
            counters,
        }
    }

    /// Number of cached directory entries.
    pub fn size(&self) -> usize {
        self.map.read().expect("cache map lock").len()
    }

    pub fn counters(&self) -> &Arc<CacheCounters> {
        &self.counters
    }

    pub fn roots(&self) -> &Arc<ScanRoots> {
        &self.roots
    }

    /// Direct map lookup without accounting.
    fn lookup(&self, key: &str) -> Option<Arc<DirectoryEntry>> {
        self.map.read().expect("cache map lock").get(key).cloned()
    }

    /// Insert an entry if its path is not cached yet.
    ///
    /// Always returns the canonical entry: on a concurrent duplicate insert
    /// the new entry is discarded and the cached one returned. The global
    /// file counter grows only on a successful first insert.
    pub fn put(&self, entry: Arc<DirectoryEntry>) -> Arc<DirectoryEntry> {
        debug!("cache put for '{}'", entry.path());
        let mut map = self.map.write().expect("cache map lock");
        match map.entry(entry.path().to_string()) {
            Entry::Occupied(existing) => {
                warn!(
                    "duplicate cache insert for '{}', keeping the existing entry",
                    entry.path()
                );
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                self.counters.add_files(entry.file_count());
                slot.insert(entry.clone());
                entry
            }
        }
    }

    /// Insert an entry and materialize its ancestor chain.
    ///
    /// If the canonical entry has no parent link yet, the parent directory
    /// is looked up (recursively inserted when missing) and linked by cache
    /// key, so every cached entry eventually reaches a top-level directory
    /// without further disk walks.
    pub fn put_with_parent(&self, entry: Arc<DirectoryEntry>) -> Arc<DirectoryEntry> {
        let entry = self.put(entry);
        if entry.parent().is_none() {
            let parent = parent_path(entry.path());
            if !parent.is_empty() {
                let parent_entry = match self.lookup(parent) {
                    Some(found) => found,
                    None => {
                        let scanned = Arc::new(DirectoryEntry::scan(parent, self.roots.clone()));
                        self.put_with_parent(scanned)
                    }
                };
                entry.set_parent(parent_entry.path().to_string());
            }
        }
        entry
    }

    /// Resolve a logical path and 1-based file number to a directory
    /// member.
    ///
    /// `path` may name a directory (the member at `index` is returned) or a
    /// file inside one (the file's own position is used and `index` is
    /// ignored). The 1-based to 0-based translation happens here and only
    /// here. Returns `None` if nothing exists under any base root or the
    /// index is out of range.
    pub fn get_file(&self, path: &str, index: usize) -> Option<Arc<FileEntry>> {
        let path = normalize(path);
        // file numbers are 1-based, member positions are 0-based
        let mut position = index.saturating_sub(1);

        let dir = match self.lookup(&path) {
            Some(found) => {
                self.counters.record_hit();
                found
            }
            None => {
                self.counters.record_miss();
                let probe = self.roots.resolve(self.roots.primary(), &path);
                if probe.is_dir() {
                    let scanned = Arc::new(DirectoryEntry::scan(&path, self.roots.clone()));
                    if scanned.is_valid() {
                        self.put_with_parent(scanned)
                    } else {
                        scanned
                    }
                } else {
                    // maybe a file inside a cached or scannable directory
                    let (dirname, filename) = split_path(&path);
                    let dir = match self.lookup(dirname) {
                        Some(found) => {
                            // not a real cache miss after all
                            self.counters.reverse_miss();
                            found
                        }
                        None => {
                            let scanned =
                                Arc::new(DirectoryEntry::scan(dirname, self.roots.clone()));
                            if !scanned.is_valid() {
                                return None;
                            }
                            self.put_with_parent(scanned)
                        }
                    };
                    position = dir.index_of(filename)?;
                    dir
                }
            }
        };

        dir.refresh();
        if dir.is_valid() {
            dir.get(position)
        } else {
            None
        }
    }

    /// Resolve a logical path to its directory entry.
    ///
    /// If `path` names a file, its parent directory is returned. Returns
    /// `None` if the path resolves to nothing under any base root.
    pub fn get_directory(&self, path: &str) -> Option<Arc<DirectoryEntry>> {
        let path = normalize(path);

        let dir = match self.lookup(&path) {
            Some(found) => {
                self.counters.record_hit();
                found
            }
            None => {
                self.counters.record_miss();
                let probe = self.roots.resolve(self.roots.primary(), &path);
                if probe.is_dir() {
                    let scanned = Arc::new(DirectoryEntry::scan(&path, self.roots.clone()));
                    if scanned.is_valid() {
                        self.put_with_parent(scanned)
                    } else {
                        scanned
                    }
                } else if probe.is_file() {
                    let (dirname, _) = split_path(&path);
                    match self.lookup(dirname) {
                        Some(found) => {
                            // not a real cache miss then
                            self.counters.reverse_miss();
                            found
                        }
                        None => {
                            let scanned =
                                Arc::new(DirectoryEntry::scan(dirname, self.roots.clone()));
                            if !scanned.is_valid() {
                                return None;
                            }
                            self.put_with_parent(scanned)
                        }
                    }
                } else {
                    // not even a file
                    return None;
                }
            }
        };

        dir.refresh();
        if dir.is_valid() {
            Some(dir)
        } else {
            None
        }
    }
}

/// Canonical cache key: no leading or trailing separators.
fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// Split a logical path into its parent directory and final segment.
fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    /// One base root with book/p001.jpg, book/p002.jpg.
    fn fixture() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let book = tmp.path().join("book");
        fs::create_dir(&book).unwrap();
        touch(&book.join("p001.jpg"));
        touch(&book.join("p002.jpg"));
        tmp
    }

    fn cache_for(tmp: &tempfile::TempDir) -> DirectoryCache {
        DirectoryCache::new(vec![tmp.path().to_path_buf()], FileClass::Image)
    }

    #[test]
    fn test_get_file_by_directory_and_index() {
        let tmp = fixture();
        let cache = cache_for(&tmp);

        // file numbers are 1-based
        let first = cache.get_file("book", 1).unwrap();
        assert_eq!(first.name(), "p001");
        let second = cache.get_file("book", 2).unwrap();
        assert_eq!(second.name(), "p002");
        assert!(cache.get_file("book", 3).is_none());
    }

    #[test]
    fn test_get_file_by_file_path_ignores_index() {
        let tmp = fixture();
        let cache = cache_for(&tmp);

        let entry = cache.get_file("book/p002.jpg", 1).unwrap();
        assert_eq!(entry.name(), "p002");
        // stem spelling works too
        let entry = cache.get_file("book/p001", 7).unwrap();
        assert_eq!(entry.name(), "p001");
    }

    #[test]
    fn test_not_found_paths_yield_none() {
        let tmp = fixture();
        let cache = cache_for(&tmp);

        assert!(cache.get_file("missing", 1).is_none());
        assert!(cache.get_file("book/p099.jpg", 1).is_none());
        assert!(cache.get_directory("missing").is_none());
    }

    #[test]
    fn test_hit_and_miss_accounting() {
        let tmp = fixture();
        let cache = cache_for(&tmp);

        assert!(cache.get_directory("book").is_some());
        assert_eq!(cache.counters().misses(), 1);
        assert_eq!(cache.counters().hits(), 0);

        // warm now: a hit, and no further miss
        assert!(cache.get_directory("book").is_some());
        assert_eq!(cache.counters().misses(), 1);
        assert_eq!(cache.counters().hits(), 1);
    }

    #[test]
    fn test_file_lookup_through_warm_parent_reverses_miss() {
        let tmp = fixture();
        let cache = cache_for(&tmp);

        cache.get_directory("book").unwrap();
        assert_eq!(cache.counters().misses(), 1);

        // the literal key "book/p001.jpg" is absent, but the parent is
        // warm: the charged miss is reversed, and no hit is recorded for
        // the indirect lookup either
        cache.get_file("book/p001.jpg", 1).unwrap();
        assert_eq!(cache.counters().misses(), 1);
        assert_eq!(cache.counters().hits(), 0);
    }

    #[test]
    fn test_cold_file_lookup_stays_a_miss() {
        let tmp = fixture();
        let cache = cache_for(&tmp);

        cache.get_file("book/p001.jpg", 1).unwrap();
        assert_eq!(cache.counters().misses(), 1);
        assert_eq!(cache.counters().hits(), 0);
    }

    #[test]
    fn test_repeated_get_is_idempotent() {
        let tmp = fixture();
        let cache = cache_for(&tmp);

        let first = cache.get_directory("book").unwrap();
        let member_before = first.get(0).unwrap();
        let second = cache.get_directory("book").unwrap();

        // same entry, same members, no rescan
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&member_before, &second.get(0).unwrap()));
        assert_eq!(cache.counters().misses(), 1);
    }

    #[test]
    fn test_put_duplicate_keeps_first_entry() {
        let tmp = fixture();
        let cache = cache_for(&tmp);
        let roots = cache.roots().clone();

        let a = Arc::new(DirectoryEntry::scan("book", roots.clone()));
        let b = Arc::new(DirectoryEntry::scan("book", roots));

        let kept = cache.put(a.clone());
        assert!(Arc::ptr_eq(&kept, &a));

        // the racing insert is discarded in favor of the cached entry
        let kept = cache.put(b.clone());
        assert!(Arc::ptr_eq(&kept, &a));
        assert!(!Arc::ptr_eq(&kept, &b));

        // file counter reflects a's files only
        assert_eq!(cache.counters().files(), 2);
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_put_with_parent_builds_ancestor_chain() {
        let tmp = tempfile::tempdir().unwrap();
        let deep = tmp.path().join("a/b/c");
        fs::create_dir_all(&deep).unwrap();
        touch(&deep.join("p001.jpg"));

        let cache = cache_for(&tmp);
        let leaf = Arc::new(DirectoryEntry::scan("a/b/c", cache.roots().clone()));
        let leaf = cache.put_with_parent(leaf);

        // exactly leaf + 2 ancestors, each linked to its immediate parent
        assert_eq!(cache.size(), 3);
        assert_eq!(leaf.parent().as_deref(), Some("a/b"));
        let mid = cache.get_directory("a/b").unwrap();
        assert_eq!(mid.parent().as_deref(), Some("a"));
        let top = cache.get_directory("a").unwrap();
        assert_eq!(top.parent(), None);

        // repeating the insert creates no duplicates
        let again = Arc::new(DirectoryEntry::scan("a/b/c", cache.roots().clone()));
        let again = cache.put_with_parent(again);
        assert!(Arc::ptr_eq(&again, &leaf));
        assert_eq!(cache.size(), 3);
    }

    #[test]
    fn test_file_counter_aggregates_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let one = tmp.path().join("one");
        let two = tmp.path().join("two");
        fs::create_dir(&one).unwrap();
        fs::create_dir(&two).unwrap();
        touch(&one.join("a.jpg"));
        touch(&two.join("b.jpg"));
        touch(&two.join("c.jpg"));

        let cache = cache_for(&tmp);
        cache.get_directory("one").unwrap();
        cache.get_directory("two").unwrap();
        assert_eq!(cache.counters().files(), 3);
    }

    #[test]
    fn test_leading_slash_is_normalized() {
        let tmp = fixture();
        let cache = cache_for(&tmp);

        cache.get_directory("/book").unwrap();
        // same key as the bare form: a hit, not a second scan
        cache.get_directory("book").unwrap();
        assert_eq!(cache.counters().hits(), 1);
        assert_eq!(cache.counters().misses(), 1);
    }
}
