//! Background execution of flows.
//!
//! The git repository is a single shared mutable resource, so at most one
//! flow runs at a time; a second start is rejected with a busy error. The
//! worker runs the flow off the host's UI thread and hands the result back
//! over a channel. Cancellation is cooperative: flows poll the flag at
//! suspension points and stop before their next step.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, bounded};

/// Cooperative cancellation flag shared between host and flow.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Another flow is already running.
#[derive(Debug)]
pub struct BusyError;

impl std::fmt::Display for BusyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "another operation is already running")
    }
}

impl std::error::Error for BusyError {}

/// Handle to a running background operation.
pub struct WorkerHandle<T> {
    receiver: Receiver<T>,
    thread: std::thread::JoinHandle<()>,
}

impl<T> WorkerHandle<T> {
    /// Block until the operation finishes and return its result.
    pub fn wait(self) -> T {
        let result = self
            .receiver
            .recv()
            .expect("worker thread dropped its result channel");
        let _ = self.thread.join();
        result
    }

    /// Non-blocking poll; `None` while the operation is still running.
    pub fn try_result(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}

/// Runs one blocking operation at a time on a background thread.
#[derive(Clone, Default)]
pub struct OperationWorker {
    busy: Arc<AtomicBool>,
}

impl OperationWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Spawn `operation` on a worker thread. Rejects with [`BusyError`]
    /// while a previous operation is still running.
    pub fn run_in_background<T, F>(&self, operation: F) -> Result<WorkerHandle<T>, BusyError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(BusyError);
        }

        let (sender, receiver) = bounded(1);
        let busy = Arc::clone(&self.busy);
        let thread = std::thread::spawn(move || {
            let result = operation();
            busy.store(false, Ordering::SeqCst);
            // Receiver may be gone if the host abandoned the handle
            let _ = sender.send(result);
        });

        Ok(WorkerHandle { receiver, thread })
    }
}
