pub mod byte_compare;
pub mod classifier;
pub mod engine;
pub mod merger;
pub mod scanner;
pub mod stream;

pub use byte_compare::ByteComparator;
pub use classifier::FileClassifier;
pub use engine::TreeDiff;
pub use merger::{merge_paths, MergedPaths};
pub use scanner::FolderScanner;
pub use stream::{result_stream, RecvTimeoutError, ResultSink, ResultStream};
