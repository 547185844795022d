//! Line-content hashing for drift-tolerant issue tracking.
//!
//! Each issue location stores a hash of its line's current text so the
//! issue can be re-anchored later if the file changes slightly. Hashing is
//! whitespace-insensitive: indentation-only edits keep the anchor valid.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Access to current file contents.
///
/// Used only for hash computation, never for protocol correctness. The
/// host IDE backs this with its open-document buffers; the CLI reads from
/// disk.
pub trait TextSnapshot: Send + Sync {
    /// The text of a one-based line, or None when unavailable.
    fn line_text(&self, file: &Path, line: u32) -> Option<String>;
}

/// Filesystem-backed snapshot provider.
pub struct FsSnapshot;

impl TextSnapshot for FsSnapshot {
    fn line_text(&self, file: &Path, line: u32) -> Option<String> {
        if line == 0 {
            return None;
        }
        let content = fs::read_to_string(file).ok()?;
        content
            .lines()
            .nth(line as usize - 1)
            .map(str::to_string)
    }
}

/// Memoizing wrapper around a snapshot provider.
///
/// Private to one issue converter; must not be shared across concurrent
/// analyses of different files.
pub struct ContentCache {
    provider: std::sync::Arc<dyn TextSnapshot>,
    lines: HashMap<(PathBuf, u32), Option<String>>,
}

impl ContentCache {
    pub fn new(provider: std::sync::Arc<dyn TextSnapshot>) -> Self {
        Self {
            provider,
            lines: HashMap::new(),
        }
    }

    /// Hash of a one-based line's current content, None when unavailable.
    pub fn line_hash(&mut self, file: &Path, line: u32) -> Option<String> {
        let key = (file.to_path_buf(), line);
        if !self.lines.contains_key(&key) {
            let text = self.provider.line_text(file, line);
            self.lines.insert(key.clone(), text);
        }
        self.lines[&key].as_deref().map(hash_line)
    }
}

/// Hash a line's text with all whitespace removed.
pub fn hash_line(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let mut hasher = Sha256::new();
    hasher.update(stripped.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_whitespace_insensitive() {
        assert_eq!(hash_line("int x = 1;"), hash_line("  int  x=1;\t"));
        assert_ne!(hash_line("int x = 1;"), hash_line("int y = 1;"));
    }

    #[test]
    fn test_fs_snapshot_reads_one_based_lines() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.cpp");
        std::fs::write(&file, "first\nsecond\nthird\n").unwrap();

        let snapshot = FsSnapshot;
        assert_eq!(snapshot.line_text(&file, 1).as_deref(), Some("first"));
        assert_eq!(snapshot.line_text(&file, 3).as_deref(), Some("third"));
        assert_eq!(snapshot.line_text(&file, 4), None);
        assert_eq!(snapshot.line_text(&file, 0), None);
    }

    #[test]
    fn test_fs_snapshot_missing_file_is_unavailable() {
        let snapshot = FsSnapshot;
        assert_eq!(snapshot.line_text(Path::new("/nonexistent/a.cpp"), 1), None);
    }

    #[test]
    fn test_cache_consults_provider_once_per_line() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct Counting(Arc<AtomicUsize>);
        impl TextSnapshot for Counting {
            fn line_text(&self, _file: &Path, _line: u32) -> Option<String> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Some("int x;".to_string())
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let mut cache = ContentCache::new(Arc::new(Counting(count.clone())));

        let first = cache.line_hash(Path::new("a.cpp"), 7);
        let second = cache.line_hash(Path::new("a.cpp"), 7);
        assert_eq!(first, second);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
