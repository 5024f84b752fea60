//! Single-worker task queue.
//!
//! [`TaskQueue`] owns one OS thread and one piece of worker state `S`. Every
//! job runs on that thread with exclusive access to the state, strictly in
//! submission order. The state is created on the worker itself, so it does
//! not have to be `Send`; this is what keeps a QuickJS runtime on the thread
//! that created it.
//!
//! ```text
//!  caller A ──submit──┐
//!                     ├──▶ mpsc (FIFO) ──▶ worker thread ──▶ job(&mut S)
//!  caller B ──submit──┘                                        │
//!      ▲                                                       │
//!      └───────────────── oneshot result ◀─────────────────────┘
//! ```

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use spider_bridge_common::{BridgeError, QueueError};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(Job<S>),
    Shutdown(Job<S>),
}

/// Serializes work onto one dedicated worker thread.
pub struct TaskQueue<S> {
    name: String,
    sender: RwLock<Option<mpsc::UnboundedSender<Message<S>>>>,
    cancelled: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl<S: 'static> TaskQueue<S> {
    /// Spawn the worker thread.
    ///
    /// `init` runs on the worker and produces the state every job receives.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn<F>(name: impl Into<String>, init: F) -> Result<Self, BridgeError>
    where
        F: FnOnce() -> S + Send + 'static,
    {
        let name = name.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));

        let worker = thread::Builder::new().name(name.clone()).spawn({
            let cancelled = Arc::clone(&cancelled);
            move || worker_loop(receiver, &cancelled, init)
        })?;
        let worker_id = worker.thread().id();

        debug!(queue = %name, "Worker thread started");

        Ok(Self {
            name,
            sender: RwLock::new(Some(sender)),
            cancelled,
            worker: Mutex::new(Some(worker)),
            worker_id,
        })
    }

    /// Enqueue `work` and return a handle to its result.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] after [`TaskQueue::shutdown`].
    pub fn submit<T, F>(&self, work: F) -> Result<TaskHandle<T>, QueueError>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job<S> = Box::new(move |state| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(state)))
                .map_err(|_| QueueError::Panicked);
            // A dropped handle just means nobody waits for the result.
            let _ = tx.send(outcome);
        });

        let sender = self.sender.read();
        sender
            .as_ref()
            .ok_or(QueueError::Closed)?
            .send(Message::Run(job))
            .map_err(|_| QueueError::Closed)?;

        Ok(TaskHandle { rx })
    }

    /// Enqueue `work` and block until it completes.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Reentrant`] when called from the worker thread,
    /// otherwise the errors of [`TaskQueue::submit`] and [`TaskHandle::wait`].
    pub fn run<T, F>(&self, work: F) -> Result<T, QueueError>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_worker_thread() {
            return Err(QueueError::Reentrant);
        }
        self.submit(work)?.wait()
    }

    /// Stop the queue.
    ///
    /// Pending jobs are dropped without running, new submissions are
    /// rejected, and `teardown` runs on the worker once the in-flight job (if
    /// any) has finished. Blocks until the worker exits unless called from
    /// the worker itself.
    ///
    /// Returns `false` if the queue was already shut down.
    pub fn shutdown<F>(&self, teardown: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        let Some(sender) = self.sender.write().take() else {
            return false;
        };

        self.cancelled.store(true, Ordering::SeqCst);
        if sender.send(Message::Shutdown(Box::new(teardown))).is_err() {
            warn!(queue = %self.name, "Worker exited before shutdown");
        }
        drop(sender);

        if !self.is_worker_thread() {
            if let Some(worker) = self.worker.lock().take() {
                if worker.join().is_err() {
                    error!(queue = %self.name, "Worker thread panicked during shutdown");
                }
            }
        }

        info!(queue = %self.name, "Queue shut down");
        true
    }

    /// Returns `true` once [`TaskQueue::shutdown`] has been called.
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Returns `true` when called on the worker thread.
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Name of the worker thread.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S> Drop for TaskQueue<S> {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after queued jobs.
        self.sender.get_mut().take();
    }
}

impl<S> std::fmt::Debug for TaskQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.name)
            .field("closed", &self.sender.read().is_none())
            .finish_non_exhaustive()
    }
}

fn worker_loop<S, F>(
    mut receiver: mpsc::UnboundedReceiver<Message<S>>,
    cancelled: &AtomicBool,
    init: F,
) where
    F: FnOnce() -> S,
{
    let mut state = init();

    while let Some(message) = receiver.blocking_recv() {
        match message {
            Message::Run(job) => {
                if cancelled.load(Ordering::SeqCst) {
                    // Dropping the job drops its result sender: the caller sees Cancelled.
                    drop(job);
                    continue;
                }
                run_job(job, &mut state);
            }
            Message::Shutdown(teardown) => {
                run_job(teardown, &mut state);
                break;
            }
        }
    }

    receiver.close();
}

fn run_job<S>(job: Job<S>, state: &mut S) {
    if panic::catch_unwind(AssertUnwindSafe(|| job(state))).is_err() {
        error!("Queued job panicked");
    }
}

/// Pending result of a submitted job.
///
/// Await it from async code or call [`TaskHandle::wait`] from a plain thread.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T, QueueError>>,
}

impl<T> TaskHandle<T> {
    /// Block the current thread until the job has run.
    ///
    /// Must not be called from within an async runtime.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Cancelled`] if the job was dropped by shutdown,
    /// or [`QueueError::Panicked`] if it panicked.
    pub fn wait(self) -> Result<T, QueueError> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(QueueError::Cancelled))
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, QueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(QueueError::Cancelled)))
    }
}
