use crate::byte_compare::ByteComparator;
use crate::classifier::FileClassifier;
use crate::merger::merge_paths;
use crate::scanner::FolderScanner;
use crate::stream::{result_stream, ResultSink, ResultStream};
use crossbeam::sync::WaitGroup;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use treediff_common::{AppConfig, DiffResult, DiffSummary, TreeDiffError};
use tracing::{debug, info, warn};

/// One comparison run of a left tree against a right tree.
///
/// `start` returns immediately with a [`ResultStream`]. A coordinator thread
/// enumerates both trees and hands each distinct path to a rayon pool; the
/// stream closes once every classification has been published.
pub struct TreeDiff {
    left: PathBuf,
    right: PathBuf,
    config: AppConfig,
}

impl TreeDiff {
    pub fn new(left: impl Into<PathBuf>, right: impl Into<PathBuf>, config: AppConfig) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            config,
        }
    }

    /// Begin the run and return the stream its results arrive on
    pub fn start(self) -> Result<ResultStream, TreeDiffError> {
        for (side, root) in [("Left", &self.left), ("Right", &self.right)] {
            if !root.is_dir() {
                warn!("{} root is not a directory, treating it as empty: {}", side, root.display());
            }
        }

        let pool = self.build_pool()?;
        let (sink, stream) = result_stream();

        thread::Builder::new()
            .name("treediff-coordinator".to_string())
            .spawn(move || self.coordinate(pool, sink))
            .map_err(|e| TreeDiffError::Runtime(format!("Failed to spawn coordinator: {}", e)))?;

        Ok(stream)
    }

    /// Run to completion and return every result sorted by path, with counts
    pub fn collect(self) -> Result<(Vec<DiffResult>, DiffSummary), TreeDiffError> {
        let stream = self.start()?;

        let mut summary = DiffSummary::default();
        let mut results: Vec<DiffResult> = stream
            .inspect(|result| summary.record(result.status))
            .collect();
        results.sort_by_cached_key(|result| result.path.to_string());

        Ok((results, summary))
    }

    fn build_pool(&self) -> Result<ThreadPool, TreeDiffError> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("treediff-worker-{}", i));
        if let Some(threads) = self.config.worker_threads {
            builder = builder.num_threads(threads.max(1));
        }

        builder
            .build()
            .map_err(|e| TreeDiffError::Runtime(format!("Failed to build worker pool: {}", e)))
    }

    fn coordinate(self, pool: ThreadPool, sink: ResultSink) {
        let started = Instant::now();
        info!("Comparing {} with {}", self.left.display(), self.right.display());

        let scanner = FolderScanner::new(&self.config);
        let comparator = ByteComparator::new(self.config.compare_method, self.config.effective_chunk_size());
        let classifier = Arc::new(
            FileClassifier::new(self.left.clone(), self.right.clone(), comparator)
                .with_casing(self.config.path_casing),
        );
        debug!(
            "Using {} worker threads, {:?} comparison in {} byte windows",
            pool.current_num_threads(),
            comparator.method(),
            comparator.chunk_size()
        );

        let latch = WaitGroup::new();
        let mut paths = merge_paths(
            scanner.scan(&self.left),
            scanner.scan(&self.right),
            self.config.path_casing,
        );

        for path in paths.by_ref() {
            let classifier = Arc::clone(&classifier);
            let sink = sink.clone();
            let latch = latch.clone();

            pool.spawn(move || {
                let status = classifier.classify(&path);
                debug!("{} classified as {}", path, status);
                sink.publish(DiffResult::new(path, status));
                drop(latch);
            });
        }

        let dispatched = paths.distinct();
        debug!("Dispatched {} paths, waiting for workers", dispatched);
        latch.wait();

        info!("Classified {} paths in {:.2?}", dispatched, started.elapsed());
        drop(sink);
    }
}
