use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;
use std::path::{Path, PathBuf};
use treediff_common::{AppConfig, RelPath};
use tracing::{debug, warn};

/// Lazy recursive file lister built on jwalk.
///
/// Yields every regular file under a root as a [`RelPath`]. Directories are
/// descended into but never yielded themselves.
pub struct FolderScanner {
    follow_symlinks: bool,
    custom_ignore: Option<Gitignore>,
}

impl FolderScanner {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            follow_symlinks: config.follow_symlinks,
            custom_ignore: Self::build_custom_ignore(config),
        }
    }

    /// Build a Gitignore from custom ignore patterns in config
    fn build_custom_ignore(config: &AppConfig) -> Option<Gitignore> {
        if config.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new("");
        for pattern in &config.ignore_patterns {
            if let Err(err) = builder.add_line(None, pattern) {
                warn!("Failed to add ignore pattern '{}': {}", pattern, err);
            } else {
                debug!("Added custom ignore pattern: {}", pattern);
            }
        }

        match builder.build() {
            Ok(ignore) => {
                debug!("Built custom ignore with {} patterns", config.ignore_patterns.len());
                Some(ignore)
            }
            Err(e) => {
                warn!("Failed to build custom ignore: {}", e);
                None
            }
        }
    }

    /// Enumerate the files under `root`.
    ///
    /// A root that is missing or not a directory enumerates as empty.
    /// Entries the walker cannot read are logged and skipped.
    pub fn scan<'a>(&'a self, root: &Path) -> Box<dyn Iterator<Item = RelPath> + 'a> {
        if !root.is_dir() {
            debug!("Root {:?} is not a directory; nothing to enumerate", root);
            return Box::new(std::iter::empty());
        }

        let root: PathBuf = root.to_path_buf();
        let walker = self.walker(&root);

        Box::new(walker.into_iter().filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {:?}: {}", root, e);
                    return None;
                }
            };

            if !entry.file_type().is_file() {
                return None;
            }

            let path = entry.path();
            let relative = match path.strip_prefix(&root) {
                Ok(relative) => RelPath::new(relative),
                Err(e) => {
                    warn!("Entry {:?} escaped root {:?}: {}", path, root, e);
                    return None;
                }
            };

            if relative.is_empty() || self.should_ignore_with_parents(relative.as_path()) {
                return None;
            }

            Some(relative)
        }))
    }

    /// Walker over `root` that never descends into ignored directories
    fn walker(&self, root: &Path) -> WalkDir {
        let walker = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .skip_hidden(false)
            .sort(false);

        let Some(custom_ignore) = self.custom_ignore.clone() else {
            return walker;
        };

        let base = root.to_path_buf();
        walker.process_read_dir(move |_depth, _dir, _state, children| {
            children.retain(|child| match child {
                Ok(entry) if entry.file_type().is_dir() => {
                    let path = entry.path();
                    let relative = path.strip_prefix(&base).unwrap_or(path.as_path());
                    let ignored = custom_ignore.matched(relative, true).is_ignore();
                    if ignored {
                        debug!("Pruning ignored directory {:?}", relative);
                    }
                    !ignored
                }
                _ => true,
            });
        })
    }

    /// Check if a file or any of its parent directories should be ignored
    fn should_ignore_with_parents(&self, path: &Path) -> bool {
        let Some(ref custom_ignore) = self.custom_ignore else {
            return false;
        };

        if custom_ignore.matched(path, false).is_ignore() {
            return true;
        }

        let mut current = path;
        while let Some(parent) = current.parent() {
            if !parent.as_os_str().is_empty() && custom_ignore.matched(parent, true).is_ignore() {
                return true;
            }
            current = parent;
        }
        false
    }
}
