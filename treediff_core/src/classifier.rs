use crate::byte_compare::ByteComparator;
use std::any::Any;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::ErrorKind;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use treediff_common::{CompareError, DiffStatus, PathCasing, RelPath};
use tracing::debug;

/// Assigns one [`DiffStatus`] to one relative path.
///
/// Cheap metadata checks run first; content is only read when both files
/// exist with the same non-zero size.
pub struct FileClassifier {
    left_root: PathBuf,
    right_root: PathBuf,
    comparator: ByteComparator,
    casing: PathCasing,
}

impl FileClassifier {
    pub fn new(left_root: PathBuf, right_root: PathBuf, comparator: ByteComparator) -> Self {
        Self {
            left_root,
            right_root,
            comparator,
            casing: PathCasing::default(),
        }
    }

    pub fn with_casing(mut self, casing: PathCasing) -> Self {
        self.casing = casing;
        self
    }

    /// Classify `path`. Never fails: any problem yields `DiffStatus::Error`.
    pub fn classify(&self, path: &RelPath) -> DiffStatus {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_classify(path)))
            .unwrap_or_else(|payload| Err(CompareError::Panicked(panic_message(payload))));

        match outcome {
            Ok(status) => status,
            Err(e) => {
                debug!("Failed to classify {}: {}", path, e);
                DiffStatus::Error
            }
        }
    }

    fn try_classify(&self, path: &RelPath) -> Result<DiffStatus, CompareError> {
        let left = self.locate(&self.left_root, path);
        let right = self.locate(&self.right_root, path);

        let (left_len, right_len) = match (file_len(&left)?, file_len(&right)?) {
            (Some(_), None) => return Ok(DiffStatus::Deleted),
            (None, Some(_)) => return Ok(DiffStatus::Added),
            (None, None) => {
                debug!("{} vanished from both trees before classification", path);
                return Ok(DiffStatus::Error);
            }
            (Some(l), Some(r)) => (l, r),
        };

        if left_len != right_len {
            return Ok(DiffStatus::Modified);
        }
        if left_len == 0 {
            return Ok(DiffStatus::Identical);
        }

        let same = self.comparator.files_equal(&left, &right, left_len)?;
        Ok(if same { DiffStatus::Identical } else { DiffStatus::Modified })
    }

    /// Location of `path` under `root`.
    ///
    /// Under [`PathCasing::Insensitive`] a spelling that is not a regular file
    /// verbatim is looked up component by component ignoring case, so the
    /// other tree's casing is found on case-sensitive filesystems too.
    fn locate(&self, root: &Path, path: &RelPath) -> PathBuf {
        let exact = path.resolve(root);
        if self.casing == PathCasing::Sensitive || is_regular_file(&exact) {
            return exact;
        }

        let components: Vec<&OsStr> = path.as_path().iter().collect();
        resolve_folded(root.to_path_buf(), &components).unwrap_or(exact)
    }
}

/// First regular file reachable from `current` by case-insensitive matches
/// of `remaining`, trying the verbatim spelling of each component first.
fn resolve_folded(current: PathBuf, remaining: &[&OsStr]) -> Option<PathBuf> {
    let Some((name, rest)) = remaining.split_first() else {
        return is_regular_file(&current).then_some(current);
    };

    case_variants(&current, name)
        .into_iter()
        .find_map(|variant| resolve_folded(current.join(variant), rest))
}

/// Entries of `dir` equal to `name` ignoring case, verbatim spelling first
fn case_variants(dir: &Path, name: &OsStr) -> Vec<OsString> {
    let mut variants = Vec::new();
    if fs::symlink_metadata(dir.join(name)).is_ok() {
        variants.push(name.to_os_string());
    }

    let Some(wanted) = name.to_str().map(str::to_lowercase) else {
        return variants;
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return variants;
    };

    let mut folded: Vec<OsString> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name())
        .filter(|found| found.as_os_str() != name)
        .filter(|found| found.to_str().map_or(false, |found| found.to_lowercase() == wanted))
        .collect();

    // Several spellings can coexist on a case-sensitive filesystem.
    folded.sort();
    variants.extend(folded);
    variants
}

fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map_or(false, |metadata| metadata.is_file())
}

/// Size of the regular file at `path`, or `None` when there is no such file
fn file_len(path: &Path) -> Result<Option<u64>, CompareError> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        // A non-directory ancestor means the file cannot exist on this side.
        Err(_) if path.parent().map_or(false, |parent| !parent.is_dir()) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treediff_common::CompareMethod;
    use tempfile::TempDir;

    struct Trees {
        _temp: TempDir,
        left: PathBuf,
        right: PathBuf,
    }

    impl Trees {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let left = temp.path().join("left");
            let right = temp.path().join("right");
            fs::create_dir(&left).unwrap();
            fs::create_dir(&right).unwrap();
            Self { _temp: temp, left, right }
        }

        fn write(root: &Path, name: &str, content: &[u8]) {
            let path = root.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }

        fn classifier(&self, method: CompareMethod) -> FileClassifier {
            FileClassifier::new(
                self.left.clone(),
                self.right.clone(),
                ByteComparator::new(method, 4096),
            )
        }

        fn classify_with(&self, name: &str, casing: PathCasing) -> DiffStatus {
            self.classifier(CompareMethod::Buffered)
                .with_casing(casing)
                .classify(&RelPath::new(name))
        }

        fn classify(&self, name: &str) -> DiffStatus {
            self.classifier(CompareMethod::Buffered).classify(&RelPath::new(name))
        }
    }

    #[test]
    fn test_left_only_is_deleted() {
        let trees = Trees::new();
        Trees::write(&trees.left, "gone.txt", b"old");
        assert_eq!(trees.classify("gone.txt"), DiffStatus::Deleted);
    }

    #[test]
    fn test_right_only_is_added() {
        let trees = Trees::new();
        Trees::write(&trees.right, "sub/new.txt", b"new");
        assert_eq!(trees.classify("sub/new.txt"), DiffStatus::Added);
    }

    #[test]
    fn test_missing_on_both_sides_is_error() {
        let trees = Trees::new();
        assert_eq!(trees.classify("vanished.txt"), DiffStatus::Error);
    }

    #[test]
    fn test_size_mismatch_is_modified() {
        let trees = Trees::new();
        Trees::write(&trees.left, "a.txt", b"short");
        Trees::write(&trees.right, "a.txt", b"much longer");
        assert_eq!(trees.classify("a.txt"), DiffStatus::Modified);
    }

    #[test]
    fn test_empty_files_are_identical() {
        let trees = Trees::new();
        Trees::write(&trees.left, "empty", b"");
        Trees::write(&trees.right, "empty", b"");
        assert_eq!(trees.classify("empty"), DiffStatus::Identical);
    }

    #[test]
    fn test_content_comparison() {
        let trees = Trees::new();
        Trees::write(&trees.left, "same.txt", b"hello");
        Trees::write(&trees.right, "same.txt", b"hello");
        Trees::write(&trees.left, "diff.txt", b"hello");
        Trees::write(&trees.right, "diff.txt", b"hellO");

        for method in [CompareMethod::Mmap, CompareMethod::Buffered] {
            let classifier = trees.classifier(method);
            assert_eq!(classifier.classify(&RelPath::new("same.txt")), DiffStatus::Identical);
            assert_eq!(classifier.classify(&RelPath::new("diff.txt")), DiffStatus::Modified);
        }
    }

    #[test]
    fn test_directory_on_one_side_counts_as_missing() {
        let trees = Trees::new();
        Trees::write(&trees.left, "entry", b"file");
        fs::create_dir(trees.right.join("entry")).unwrap();
        assert_eq!(trees.classify("entry"), DiffStatus::Deleted);
    }

    #[test]
    fn test_file_in_place_of_parent_directory() {
        let trees = Trees::new();
        Trees::write(&trees.left, "x/y.txt", b"nested");
        Trees::write(&trees.right, "x", b"plain file");
        assert_eq!(trees.classify("x/y.txt"), DiffStatus::Deleted);
    }

    #[test]
    fn test_other_casing_is_found_when_insensitive() {
        let trees = Trees::new();
        Trees::write(&trees.left, "Dir/File.txt", b"same");
        Trees::write(&trees.right, "dir/file.TXT", b"same");

        assert_eq!(trees.classify_with("Dir/File.txt", PathCasing::Insensitive), DiffStatus::Identical);
        assert_eq!(trees.classify_with("dir/file.TXT", PathCasing::Insensitive), DiffStatus::Identical);
    }

    #[test]
    fn test_folded_lookup_backtracks_past_verbatim_directory() {
        let trees = Trees::new();
        Trees::write(&trees.left, "Dir/File.txt", b"same");
        Trees::write(&trees.right, "Dir/other.txt", b"unrelated");
        Trees::write(&trees.right, "dir/file.txt", b"same");

        assert_eq!(trees.classify_with("Dir/File.txt", PathCasing::Insensitive), DiffStatus::Identical);
    }

    #[test]
    fn test_folded_lookup_skips_directory_with_file_name() {
        let trees = Trees::new();
        Trees::write(&trees.left, "notes.txt", b"text");
        fs::create_dir(trees.right.join("notes.txt")).unwrap();
        if trees.right.join("NOTES.txt").exists() {
            // Case-insensitive filesystem: both spellings are the directory.
            return;
        }
        Trees::write(&trees.right, "NOTES.txt", b"text");

        assert_eq!(trees.classify_with("notes.txt", PathCasing::Insensitive), DiffStatus::Identical);
    }

    #[test]
    fn test_other_casing_is_missing_when_sensitive() {
        let trees = Trees::new();
        Trees::write(&trees.left, "Dir/File.txt", b"same");
        Trees::write(&trees.right, "dir/file.TXT", b"same");

        // On a case-insensitive filesystem both spellings resolve anyway.
        let status = trees.classify_with("Dir/File.txt", PathCasing::Sensitive);
        assert!(matches!(status, DiffStatus::Deleted | DiffStatus::Identical));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload), "boom 1");
    }
}
