//! Single-threaded executors.
//!
//! An [`Executor`] owns one named thread that runs submitted jobs in order.
//! The engine uses one as its designated context: every mutation-context
//! access happens there. Durable stores use another as the caller-facing
//! context their observer callbacks run on.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{error, trace};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A serial job queue with one consumer thread.
///
/// Jobs run in submission order and never concurrently with each other. A
/// panicking job is logged and discarded; the thread keeps serving the queue.
pub struct Executor {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl Executor {
    /// Spawns the executor thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn new(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Job>();

        let worker_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(&worker_name, &receiver))?;
        let thread_id = handle.thread().id();

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
            thread_id,
        })
    }

    /// Returns the thread name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the calling thread is this executor's thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Runs `f` on the executor thread and blocks until it returns.
    ///
    /// When called from the executor thread itself, `f` runs in place.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the executor has shut down or `f`
    /// panicked.
    pub fn run<R, F>(&self, f: F) -> CoreResult<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_current() {
            return Ok(f());
        }

        trace!(executor = %self.name, "marshaling call onto executor thread");
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.submit(move || {
            let _ = reply_tx.send(f());
        })?;

        // A panicking job drops `reply_tx` without sending.
        reply_rx.recv().map_err(|_| {
            CoreError::backend_unavailable(format!("{} aborted the operation", self.name))
        })
    }

    /// Queues `f` without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the executor has shut down.
    pub fn submit<F>(&self, f: F) -> CoreResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(CoreError::backend_unavailable(format!(
                "{} has shut down",
                self.name
            )));
        };
        sender
            .send(Box::new(f))
            .map_err(|_| CoreError::backend_unavailable(format!("{} has stopped", self.name)))
    }

    /// Stops accepting jobs, lets queued jobs finish and joins the thread.
    ///
    /// Called from the executor thread itself, the thread is detached instead
    /// of joined and exits once its current job returns.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if !self.is_current() && handle.join().is_err() {
                error!(executor = %self.name, "executor thread panicked");
            }
        }
    }

    /// Returns `true` once [`Executor::shutdown`] was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("name", &self.name)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn worker_loop(name: &str, receiver: &Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!(executor = %name, "job panicked");
        }
    }
    trace!(executor = %name, "executor thread exiting");
}
