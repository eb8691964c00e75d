// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::Error;

type Operation = Box<dyn FnOnce() + Send + 'static>;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// An ordered queue of asynchronous device operations.
///
/// Each stream has its own worker thread. Operations run one at a time, in the order they were
/// enqueued, and enqueueing never blocks the caller.
///
/// Dropping the stream lets pending operations finish. Outside of a Tokio runtime the drop waits
/// for them; inside one the wait is moved to the blocking pool so async workers never stall.
pub(crate) struct ExecutionStream {
    id: u64,
    queue: Mutex<Option<mpsc::Sender<Operation>>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ExecutionStream {
    pub(crate) fn new() -> Result<Self, Error> {
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel::<Operation>();
        let worker = thread::Builder::new()
            .name(format!("exec-stream-{}", id))
            .spawn(move || {
                for operation in receiver {
                    operation();
                }
                trace!(stream = id, "execution stream drained");
            })?;
        debug!(stream = id, "created execution stream");
        Ok(Self {
            id,
            queue: Mutex::new(Some(sender)),
            worker: Some(worker),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Add an operation to the end of the queue and return immediately.
    pub(crate) fn enqueue<F>(&self, operation: F) -> Result<(), Error>
    where
        F: FnOnce() + Send + 'static,
    {
        let queue = self.queue.lock();
        let sender = queue.as_ref().ok_or(Error::StreamClosed)?;
        sender
            .send(Box::new(operation))
            .map_err(|_| Error::StreamClosed)
    }

    /// Block until every operation enqueued before this call has finished.
    pub(crate) fn synchronize(&self) -> Result<(), Error> {
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        self.enqueue(move || {
            // The waiting side may have given up, nothing to do about it here.
            let _ = done_tx.send(());
        })?;
        done_rx.recv().map_err(|_| Error::StreamClosed)
    }
}

impl fmt::Debug for ExecutionStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ExecutionStream")
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for ExecutionStream {
    fn drop(&mut self) {
        // Closing the queue lets the worker finish whatever is still pending and then exit.
        self.queue.lock().take();
        let worker = match self.worker.take() {
            Some(worker) if worker.thread().id() != thread::current().id() => worker,
            _ => return,
        };
        let id = self.id;
        let join = move || {
            if worker.join().is_err() {
                warn!(stream = id, "execution stream worker panicked");
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                trace!(stream = id, "joining execution stream in the blocking pool");
                drop(handle.spawn_blocking(join));
            }
            Err(_) => join(),
        }
    }
}
