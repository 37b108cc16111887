//! One logical directory of the image tree.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use tracing::{debug, warn};

use super::{mime_for_extension, FileClass, ImageVariant, ResolutionSet};

// =============================================================================
// Scan Roots
// =============================================================================

/// The ordered base directories a store indexes, highest resolution first,
/// plus the class of files it cares about.
#[derive(Debug)]
pub struct ScanRoots {
    dirs: Vec<PathBuf>,
    file_class: FileClass,
}

impl ScanRoots {
    pub fn new(dirs: Vec<PathBuf>, file_class: FileClass) -> Self {
        Self { dirs, file_class }
    }

    /// The first base directory. Existence and timestamps of a logical
    /// directory are keyed to this root.
    pub fn primary(&self) -> &Path {
        &self.dirs[0]
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn file_class(&self) -> FileClass {
        self.file_class
    }

    /// Filesystem path of a logical path under one base root.
    pub fn resolve(&self, base: &Path, logical: &str) -> PathBuf {
        if logical.is_empty() {
            base.to_path_buf()
        } else {
            base.join(logical)
        }
    }
}

// =============================================================================
// File Entries
// =============================================================================

/// A non-image file indexed by a text-class store.
#[derive(Debug)]
pub struct OtherFile {
    name: String,
    path: PathBuf,
    mime: &'static str,
}

impl OtherFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }
}

/// A directory member, tagged by capability instead of subclassed.
#[derive(Debug)]
pub enum FileEntry {
    /// A logical image with its resolution variants
    Image(ResolutionSet),
    /// Any other indexed file
    Other(OtherFile),
}

impl FileEntry {
    /// Logical name of the member.
    pub fn name(&self) -> &str {
        match self {
            FileEntry::Image(set) => set.name(),
            FileEntry::Other(f) => f.name(),
        }
    }

    /// The resolution set, if this member is an image.
    pub fn as_image(&self) -> Option<&ResolutionSet> {
        match self {
            FileEntry::Image(set) => Some(set),
            FileEntry::Other(_) => None,
        }
    }
}

// =============================================================================
// Directory Entry
// =============================================================================

/// Mutable scan state of a directory entry.
#[derive(Debug)]
struct DirState {
    /// False if the primary root has no such directory
    valid: bool,

    /// Last observed modification time of the primary directory
    mtime: Option<SystemTime>,

    /// Members sorted by logical name
    entries: Vec<Arc<FileEntry>>,

    /// Logical name -> position in `entries`
    index: HashMap<String, usize>,

    /// Cache key of the parent entry, backfilled by the cache
    parent: Option<String>,
}

/// One logical directory: its indexed members and their scan state.
///
/// Entries are created on a cache miss and owned by the
/// [`DirectoryCache`](super::DirectoryCache); the parent link is a key into
/// the same cache, not a reference. All mutation goes through
/// [`refresh`](DirectoryEntry::refresh) and the parent backfill.
#[derive(Debug)]
pub struct DirectoryEntry {
    /// Logical path relative to the base roots ("" is the root itself)
    path: String,

    roots: Arc<ScanRoots>,

    state: RwLock<DirState>,
}

impl DirectoryEntry {
    /// Create an entry for a logical path and scan it from disk.
    pub fn scan(path: &str, roots: Arc<ScanRoots>) -> Self {
        let state = read_state(path, &roots);
        debug!(
            "scanned directory '{}': valid={} files={}",
            path,
            state.valid,
            state.entries.len()
        );
        Self {
            path: path.to_string(),
            roots,
            state: RwLock::new(state),
        }
    }

    /// Logical path of this directory.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// False if the directory does not exist under the primary root.
    pub fn is_valid(&self) -> bool {
        self.state.read().expect("dir state lock").valid
    }

    /// Last observed modification time of the primary directory.
    pub fn mtime(&self) -> Option<SystemTime> {
        self.state.read().expect("dir state lock").mtime
    }

    /// Number of indexed members.
    pub fn file_count(&self) -> usize {
        self.state.read().expect("dir state lock").entries.len()
    }

    /// Member at a 0-based position in logical-name order.
    pub fn get(&self, index: usize) -> Option<Arc<FileEntry>> {
        self.state
            .read()
            .expect("dir state lock")
            .entries
            .get(index)
            .cloned()
    }

    /// Position of a member by name. Accepts the logical name or a file
    /// name with extension.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        let state = self.state.read().expect("dir state lock");
        if let Some(&i) = state.index.get(name) {
            return Some(i);
        }
        // a file name: retry with the extension stripped
        let stem = match name.rfind('.') {
            Some(dot) => &name[..dot],
            None => name,
        };
        state.index.get(stem).copied()
    }

    /// Cache key of the parent directory, if linked.
    pub fn parent(&self) -> Option<String> {
        self.state.read().expect("dir state lock").parent.clone()
    }

    /// Link the parent directory by cache key. Only the first link sticks.
    pub fn set_parent(&self, key: String) {
        let mut state = self.state.write().expect("dir state lock");
        if state.parent.is_none() {
            state.parent = Some(key);
        }
    }

    /// Re-stat the primary directory and rescan the members if its
    /// modification time changed. A no-op when nothing changed, so calling
    /// this on every access is cheap.
    pub fn refresh(&self) {
        let primary = self.roots.resolve(self.roots.primary(), &self.path);
        let current = match fs::metadata(&primary) {
            Ok(meta) if meta.is_dir() => meta.modified().ok(),
            _ => {
                let mut state = self.state.write().expect("dir state lock");
                if state.valid {
                    warn!("directory '{}' disappeared", self.path);
                    state.valid = false;
                    state.entries.clear();
                    state.index.clear();
                }
                return;
            }
        };

        let stale = {
            let state = self.state.read().expect("dir state lock");
            !state.valid || state.mtime != current
        };
        if !stale {
            return;
        }

        debug!("rescanning directory '{}'", self.path);
        let fresh = read_state(&self.path, &self.roots);
        let mut state = self.state.write().expect("dir state lock");
        let parent = state.parent.take();
        *state = fresh;
        state.parent = parent;
    }
}

// =============================================================================
// Disk Scan
// =============================================================================

/// Read the members of a logical directory from all base roots.
///
/// Files are unioned across roots by stem; within one logical image the
/// variant order follows base-root order (highest resolution first), which
/// fixes the resolution-set ordering invariant.
fn read_state(logical: &str, roots: &ScanRoots) -> DirState {
    let primary = roots.resolve(roots.primary(), logical);
    let mtime = match fs::metadata(&primary) {
        Ok(meta) if meta.is_dir() => meta.modified().ok(),
        _ => {
            return DirState {
                valid: false,
                mtime: None,
                entries: Vec::new(),
                index: HashMap::new(),
                parent: None,
            }
        }
    };

    // stem -> files in base-root order
    let mut members: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for base in roots.dirs() {
        let dir = roots.resolve(base, logical);
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(_) => continue,
        };
        // collect and sort for a deterministic order within one root
        let mut files: Vec<PathBuf> = listing
            .filter_map(|res| res.ok())
            .map(|d| d.path())
            .filter(|p| p.is_file() && matches_class(p, roots.file_class()))
            .collect();
        files.sort();
        for file in files {
            let stem = match file.file_stem() {
                Some(stem) => stem.to_string_lossy().into_owned(),
                None => continue,
            };
            members.entry(stem).or_default().push(file);
        }
    }

    let mut entries = Vec::with_capacity(members.len());
    let mut index = HashMap::with_capacity(members.len());
    for (stem, files) in members {
        let entry = match roots.file_class() {
            FileClass::Image => {
                let variants = files.into_iter().map(ImageVariant::new).collect();
                match ResolutionSet::new(variants) {
                    Some(set) => FileEntry::Image(set),
                    None => continue,
                }
            }
            FileClass::Text => {
                // text files have no resolution variants; the first root wins
                let path = files.into_iter().next().expect("non-empty member list");
                let mime = path
                    .extension()
                    .map(|e| mime_for_extension(&e.to_string_lossy()))
                    .unwrap_or("application/octet-stream");
                FileEntry::Other(OtherFile {
                    name: stem.clone(),
                    path,
                    mime,
                })
            }
        };
        index.insert(stem, entries.len());
        entries.push(Arc::new(entry));
    }

    DirState {
        valid: true,
        mtime,
        entries,
        index,
        parent: None,
    }
}

fn matches_class(path: &Path, class: FileClass) -> bool {
    path.extension()
        .map(|e| class.matches_extension(&e.to_string_lossy()))
        .unwrap_or(false)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    fn image_roots(dirs: Vec<PathBuf>) -> Arc<ScanRoots> {
        Arc::new(ScanRoots::new(dirs, FileClass::Image))
    }

    #[test]
    fn test_scan_sorts_and_indexes_members() {
        let tmp = tempfile::tempdir().unwrap();
        let book = tmp.path().join("book");
        fs::create_dir(&book).unwrap();
        touch(&book.join("p002.jpg"));
        touch(&book.join("p001.jpg"));
        touch(&book.join("notes.txt"));

        let entry = DirectoryEntry::scan("book", image_roots(vec![tmp.path().to_path_buf()]));
        assert!(entry.is_valid());
        assert_eq!(entry.file_count(), 2);
        assert_eq!(entry.get(0).unwrap().name(), "p001");
        assert_eq!(entry.get(1).unwrap().name(), "p002");
        assert_eq!(entry.index_of("p002"), Some(1));
        assert_eq!(entry.index_of("p002.jpg"), Some(1));
        assert_eq!(entry.index_of("p999"), None);
    }

    #[test]
    fn test_scan_unions_variants_across_roots() {
        let tmp = tempfile::tempdir().unwrap();
        let hires = tmp.path().join("hires");
        let small = tmp.path().join("small");
        fs::create_dir_all(hires.join("book")).unwrap();
        fs::create_dir_all(small.join("book")).unwrap();
        touch(&hires.join("book/p001.tif"));
        touch(&small.join("book/p001.jpg"));
        // present only in the scaled root
        touch(&small.join("book/p002.jpg"));

        let entry = DirectoryEntry::scan("book", image_roots(vec![hires, small.clone()]));
        assert_eq!(entry.file_count(), 2);

        let p001 = entry.get(0).unwrap();
        let set = p001.as_image().unwrap();
        assert_eq!(set.len(), 2);
        // base-root order: hires variant first
        assert!(set.biggest().path().to_string_lossy().contains("hires"));
        assert!(set.smallest().path().to_string_lossy().contains("small"));

        let p002 = entry.get(1).unwrap();
        assert_eq!(p002.as_image().unwrap().len(), 1);
    }

    #[test]
    fn test_scan_missing_directory_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = DirectoryEntry::scan("nowhere", image_roots(vec![tmp.path().to_path_buf()]));
        assert!(!entry.is_valid());
        assert_eq!(entry.file_count(), 0);
    }

    #[test]
    fn test_refresh_without_change_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let book = tmp.path().join("book");
        fs::create_dir(&book).unwrap();
        touch(&book.join("p001.jpg"));

        let entry = DirectoryEntry::scan("book", image_roots(vec![tmp.path().to_path_buf()]));
        let before = entry.get(0).unwrap();
        let mtime = entry.mtime();

        entry.refresh();
        let after = entry.get(0).unwrap();
        assert_eq!(entry.mtime(), mtime);
        // no rescan happened: still the same member allocation
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_refresh_detects_removed_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let book = tmp.path().join("book");
        fs::create_dir(&book).unwrap();
        touch(&book.join("p001.jpg"));

        let entry = DirectoryEntry::scan("book", image_roots(vec![tmp.path().to_path_buf()]));
        assert!(entry.is_valid());

        fs::remove_dir_all(&book).unwrap();
        entry.refresh();
        assert!(!entry.is_valid());
        assert_eq!(entry.file_count(), 0);
    }

    #[test]
    fn test_parent_link_first_writer_wins() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("book")).unwrap();
        let entry = DirectoryEntry::scan("book", image_roots(vec![tmp.path().to_path_buf()]));

        assert_eq!(entry.parent(), None);
        entry.set_parent("".to_string());
        entry.set_parent("other".to_string());
        assert_eq!(entry.parent(), Some(String::new()));
    }

    #[test]
    fn test_text_class_indexes_other_files() {
        let tmp = tempfile::tempdir().unwrap();
        let book = tmp.path().join("book");
        fs::create_dir(&book).unwrap();
        touch(&book.join("p001.jpg"));
        touch(&book.join("about.txt"));

        let roots = Arc::new(ScanRoots::new(
            vec![tmp.path().to_path_buf()],
            FileClass::Text,
        ));
        let entry = DirectoryEntry::scan("book", roots);
        assert_eq!(entry.file_count(), 1);
        let member = entry.get(0).unwrap();
        assert_eq!(member.name(), "about");
        assert!(member.as_image().is_none());
        if let FileEntry::Other(f) = member.as_ref() {
            assert_eq!(f.mime(), "text/plain");
        }
    }
}
