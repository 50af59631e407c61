use serde::{Deserialize, Serialize, Serializer};
use std::ffi::OsString;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Default upper bound for one comparison window (64 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Smallest comparison window accepted from configuration
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// Outcome of classifying one relative path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffStatus {
    /// The status could not be determined (I/O failure, vanished file, ...)
    Error,
    /// Both files exist and have the same bytes
    Identical,
    /// Both files exist and differ in size or content
    Modified,
    /// File exists only on the right side
    Added,
    /// File exists only on the left side
    Deleted,
}

impl DiffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffStatus::Error => "Error",
            DiffStatus::Identical => "Identical",
            DiffStatus::Modified => "Modified",
            DiffStatus::Added => "Added",
            DiffStatus::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file location relative to a tree root.
///
/// Rendered with a leading `/` and `/` between components regardless of
/// the host separator, e.g. `/sub/a.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelPath(PathBuf);

impl RelPath {
    /// Build from a path already stripped of its root.
    ///
    /// Root, prefix and `.` components are dropped so the result can
    /// always be joined onto another root.
    pub fn new(relative: impl AsRef<Path>) -> Self {
        let cleaned = relative
            .as_ref()
            .components()
            .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
            .collect();
        Self(cleaned)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_os_str().is_empty()
    }

    /// Absolute location of this path under `root`
    pub fn resolve(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }

    /// Identity key used to decide whether two paths name the same entity
    pub fn identity_key(&self, casing: PathCasing) -> PathKey {
        let raw = self.0.as_os_str();
        match (casing, raw.to_str()) {
            (PathCasing::Insensitive, Some(s)) => PathKey(OsString::from(s.to_lowercase())),
            _ => PathKey(raw.to_os_string()),
        }
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("/");
        }
        for component in self.0.components() {
            write!(f, "/{}", component.as_os_str().to_string_lossy())?;
        }
        Ok(())
    }
}

impl Serialize for RelPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Normalized form of a [`RelPath`] under a [`PathCasing`] policy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathKey(OsString);

/// One classified path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub path: RelPath,
    pub status: DiffStatus,
}

impl DiffResult {
    pub fn new(path: RelPath, status: DiffStatus) -> Self {
        Self { path, status }
    }
}

impl fmt::Display for DiffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} >>> {}", self.path, self.status)
    }
}

/// Per-status counters for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub identical: usize,
    pub modified: usize,
    pub added: usize,
    pub deleted: usize,
    pub errors: usize,
}

impl DiffSummary {
    pub fn record(&mut self, status: DiffStatus) {
        match status {
            DiffStatus::Error => self.errors += 1,
            DiffStatus::Identical => self.identical += 1,
            DiffStatus::Modified => self.modified += 1,
            DiffStatus::Added => self.added += 1,
            DiffStatus::Deleted => self.deleted += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.identical + self.modified + self.added + self.deleted + self.errors
    }

    /// True when any path is not `Identical`
    pub fn has_differences(&self) -> bool {
        self.total() != self.identical
    }
}

/// How relative paths from the two trees are matched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathCasing {
    /// `/A/b.txt` and `/a/B.TXT` are the same entity
    #[default]
    Insensitive,
    /// Paths must match byte for byte
    Sensitive,
}

/// Strategy used to compare the content of two same-sized files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMethod {
    /// Map bounded windows of both files and compare them in place.
    ///
    /// Faster on local disks, but a file truncated by another process while
    /// its window is mapped raises `SIGBUS` on Unix, which ends the process.
    Mmap,
    /// Read bounded blocks into reusable buffers; truncation is reported as
    /// an error for that path only
    #[default]
    Buffered,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Ignore patterns (e.g., "*.o", "node_modules/")
    pub ignore_patterns: Vec<String>,

    /// Whether to follow symbolic links while enumerating
    pub follow_symlinks: bool,

    /// Path identity policy
    pub path_casing: PathCasing,

    /// Content comparison strategy
    pub compare_method: CompareMethod,

    /// Maximum bytes compared per window
    pub chunk_size: usize,

    /// Classification worker count; `None` uses one per CPU
    pub worker_threads: Option<usize>,
}

impl AppConfig {
    /// Configured chunk size, never below [`MIN_CHUNK_SIZE`]
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(MIN_CHUNK_SIZE)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            follow_symlinks: false,
            path_casing: PathCasing::default(),
            compare_method: CompareMethod::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            worker_threads: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rel_path_display_has_leading_separator() {
        let path = RelPath::new(Path::new("sub").join("a.txt"));
        assert_eq!(path.to_string(), "/sub/a.txt");
    }

    #[test]
    fn test_rel_path_drops_root_components() {
        let path = RelPath::new("/./dir/file.txt");
        assert_eq!(path.as_path(), Path::new("dir/file.txt"));
        assert_eq!(path.resolve(Path::new("/tmp/root")), PathBuf::from("/tmp/root/dir/file.txt"));
    }

    #[test]
    fn test_identity_key_casing() {
        let upper = RelPath::new("Dir/File.TXT");
        let lower = RelPath::new("dir/file.txt");

        assert_eq!(
            upper.identity_key(PathCasing::Insensitive),
            lower.identity_key(PathCasing::Insensitive)
        );
        assert_ne!(
            upper.identity_key(PathCasing::Sensitive),
            lower.identity_key(PathCasing::Sensitive)
        );
    }

    #[test]
    fn test_diff_result_display() {
        let result = DiffResult::new(RelPath::new("a.txt"), DiffStatus::Identical);
        assert_eq!(result.to_string(), "/a.txt >>> Identical");
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = DiffSummary::default();
        summary.record(DiffStatus::Identical);
        summary.record(DiffStatus::Identical);
        assert!(!summary.has_differences());

        summary.record(DiffStatus::Error);
        summary.record(DiffStatus::Added);
        assert_eq!(summary.total(), 4);
        assert_eq!(summary.errors, 1);
        assert!(summary.has_differences());
    }

    #[test]
    fn test_default_compare_method_is_buffered() {
        assert_eq!(AppConfig::default().compare_method, CompareMethod::Buffered);
    }

    #[test]
    fn test_config_defaults_from_partial_toml() {
        let config: AppConfig = toml::from_str("compare_method = \"mmap\"\nchunk_size = 16").unwrap();
        assert_eq!(config.compare_method, CompareMethod::Mmap);
        assert_eq!(config.path_casing, PathCasing::Insensitive);
        assert_eq!(config.effective_chunk_size(), MIN_CHUNK_SIZE);
        assert!(config.ignore_patterns.is_empty());
    }
}
