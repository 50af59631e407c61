use crossbeam::channel::{self, Receiver, Sender};
use std::time::Duration;
use treediff_common::DiffResult;
use tracing::debug;

pub use crossbeam::channel::RecvTimeoutError;

/// Create an unbounded multi-producer, single-consumer result channel.
///
/// The stream ends once every [`ResultSink`] clone has been dropped.
pub fn result_stream() -> (ResultSink, ResultStream) {
    let (tx, rx) = channel::unbounded();
    (ResultSink { tx }, ResultStream { rx })
}

/// Producer half; cheap to clone, one per worker task
#[derive(Clone)]
pub struct ResultSink {
    tx: Sender<DiffResult>,
}

impl ResultSink {
    /// Publish a result without blocking.
    ///
    /// A consumer that has gone away is not an error for the producer.
    pub fn publish(&self, result: DiffResult) {
        if let Err(e) = self.tx.send(result) {
            debug!("Result stream consumer dropped; discarding {}", e.into_inner());
        }
    }
}

/// Consumer half; iterate to receive results until the run completes
pub struct ResultStream {
    rx: Receiver<DiffResult>,
}

impl ResultStream {
    /// Block for the next result; `None` once the stream is closed and drained
    pub fn recv(&self) -> Option<DiffResult> {
        self.rx.recv().ok()
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Result<DiffResult, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Results published but not yet received
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Iterator for ResultStream {
    type Item = DiffResult;

    fn next(&mut self) -> Option<DiffResult> {
        self.recv()
    }
}
