use std::collections::HashSet;
use treediff_common::{PathCasing, PathKey, RelPath};

/// Union of two path enumerations, each distinct path yielded once.
///
/// The first spelling seen wins, so left-tree casing takes precedence over
/// the right tree's when both contain the path.
pub struct MergedPaths<I> {
    inner: I,
    casing: PathCasing,
    seen: HashSet<PathKey>,
}

impl<I> MergedPaths<I>
where
    I: Iterator<Item = RelPath>,
{
    /// Number of distinct paths yielded so far
    pub fn distinct(&self) -> usize {
        self.seen.len()
    }
}

impl<I> Iterator for MergedPaths<I>
where
    I: Iterator<Item = RelPath>,
{
    type Item = RelPath;

    fn next(&mut self) -> Option<RelPath> {
        for path in self.inner.by_ref() {
            if self.seen.insert(path.identity_key(self.casing)) {
                return Some(path);
            }
        }
        None
    }
}

/// Chain `left` then `right`, dropping paths already seen under `casing`
pub fn merge_paths<L, R>(left: L, right: R, casing: PathCasing) -> MergedPaths<std::iter::Chain<L, R>>
where
    L: Iterator<Item = RelPath>,
    R: Iterator<Item = RelPath>,
{
    MergedPaths {
        inner: left.chain(right),
        casing,
        seen: HashSet::new(),
    }
}
