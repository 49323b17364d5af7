//! Designated context for completion callbacks.
//!
//! Every completion callback runs on one [`CallbackExecutor`]. The default
//! [`SerialExecutor`] owns a single named thread and runs callbacks one at a
//! time in the order they were posted, so handlers can touch shared state
//! without further locking.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, OnceLock};
use std::thread;

use tracing::{error, warn};

/// A unit of work posted to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs completion callbacks on a designated context.
pub trait CallbackExecutor: Clone + Send + Sync + 'static {
    /// Schedule `job`. Jobs must run in the order they are posted.
    fn execute(&self, job: Job);
}

/// Default thread name of [`SerialExecutor`].
pub const CALLBACK_THREAD_NAME: &str = "tandem-callbacks";

/// Executor backed by one dedicated thread.
///
/// The thread starts on the first posted job and exits once every clone of
/// the executor is dropped. If the thread cannot be spawned, jobs run inline
/// on the posting thread.
#[derive(Clone)]
pub struct SerialExecutor {
    name: Arc<str>,
    sender: Arc<OnceLock<Option<Sender<Job>>>>,
}

impl std::fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialExecutor")
            .field("name", &self.name)
            .field("started", &self.sender.get().is_some())
            .finish()
    }
}

impl Default for SerialExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialExecutor {
    /// Create an executor whose thread is named [`CALLBACK_THREAD_NAME`].
    #[must_use]
    pub fn new() -> Self {
        Self::named(CALLBACK_THREAD_NAME)
    }

    /// Create an executor with a custom thread name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            sender: Arc::new(OnceLock::new()),
        }
    }

    /// Name of the callback thread.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn sender(&self) -> Option<&Sender<Job>> {
        self.sender
            .get_or_init(|| {
                let (tx, rx) = mpsc::channel::<Job>();
                let spawned = thread::Builder::new()
                    .name(self.name.to_string())
                    .spawn(move || {
                        for job in rx {
                            run(job);
                        }
                    });
                match spawned {
                    Ok(_) => Some(tx),
                    Err(err) => {
                        warn!(
                            error = %err,
                            "cannot spawn callback thread, running callbacks inline"
                        );
                        None
                    }
                }
            })
            .as_ref()
    }
}

impl CallbackExecutor for SerialExecutor {
    fn execute(&self, job: Job) {
        match self.sender() {
            Some(sender) => {
                if let Err(mpsc::SendError(job)) = sender.send(job) {
                    warn!("callback thread is gone, running callback inline");
                    run(job);
                }
            }
            None => run(job),
        }
    }
}

/// Runs each job immediately on the posting thread.
///
/// Completions then run on the runtime worker that finished the transport
/// call; ordering across keys is not serialized.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, job: Job) {
        run(job);
    }
}

fn run(job: Job) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!("completion callback panicked");
    }
}
