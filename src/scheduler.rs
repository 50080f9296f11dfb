//! Scheduler - marshalling work onto the UI-confined thread.
//!
//! The engine never owns an event loop. Promotion and state-update flushes
//! are handed to a [`Scheduler`], which the embedder implements over its
//! platform's main-thread handler. Tasks carry an id so a scheduled task can
//! be removed before it runs (used to coalesce bursts of update flushes).
//!
//! [`InlineScheduler`] is the fallback for contexts with no reachable event
//! loop: tasks run immediately on the calling thread, which is then by
//! definition the UI thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

// =============================================================================
// Tasks
// =============================================================================

/// Identifier for a scheduled task, usable with [`Scheduler::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl TaskId {
    /// Allocate a fresh task id.
    pub fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A unit of work posted to the UI thread.
pub type Task = Box<dyn FnOnce() + Send>;

// =============================================================================
// Scheduler Trait
// =============================================================================

/// Capability for posting work to the UI-confined thread.
pub trait Scheduler: Send + Sync {
    /// Queue a task at the back of the UI queue.
    fn post(&self, id: TaskId, task: Task);

    /// Queue a task at the front of the UI queue (used for promotion, which
    /// must not sit behind a backlog of ordinary work).
    fn post_at_front(&self, id: TaskId, task: Task);

    /// Remove a queued task that has not run yet. Removing an unknown or
    /// already-run id is a no-op.
    fn remove(&self, id: TaskId);

    /// Whether the calling thread is the UI-confined thread.
    fn is_ui_thread(&self) -> bool;
}

// =============================================================================
// Inline Fallback
// =============================================================================

/// Scheduler that runs every task immediately on the calling thread.
///
/// The thread that creates it is treated as the UI thread. This is the
/// main-thread fallback the pipeline uses when no event loop is reachable,
/// and the scheduler every test runs under.
pub struct InlineScheduler {
    ui_thread: ThreadId,
    // Ids "removed" before their task was posted; lets callers coalesce even
    // though execution is immediate.
    tombstones: Mutex<Vec<TaskId>>,
}

impl InlineScheduler {
    pub fn new() -> Self {
        Self {
            ui_thread: thread::current().id(),
            tombstones: Mutex::new(Vec::new()),
        }
    }

    fn run_unless_removed(&self, id: TaskId, task: Task) {
        {
            let mut tombstones = self.tombstones.lock();
            if let Some(pos) = tombstones.iter().position(|t| *t == id) {
                tombstones.swap_remove(pos);
                return;
            }
        }
        task();
    }
}

impl Default for InlineScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for InlineScheduler {
    fn post(&self, id: TaskId, task: Task) {
        self.run_unless_removed(id, task);
    }

    fn post_at_front(&self, id: TaskId, task: Task) {
        self.run_unless_removed(id, task);
    }

    fn remove(&self, id: TaskId) {
        self.tombstones.lock().push(id);
    }

    fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.ui_thread
    }
}

// =============================================================================
// Queued Scheduler (manual pumping)
// =============================================================================

/// Scheduler backed by an explicit queue, drained by [`QueueScheduler::pump`].
///
/// Embedders without a platform handler can pump this from their own loop;
/// tests use it to observe deferred promotion.
pub struct QueueScheduler {
    ui_thread: ThreadId,
    queue: Mutex<Vec<(TaskId, Task)>>,
}

impl QueueScheduler {
    pub fn new() -> Self {
        Self {
            ui_thread: thread::current().id(),
            queue: Mutex::new(Vec::new()),
        }
    }

    /// Run all queued tasks in order. Must be called on the creating thread.
    pub fn pump(&self) {
        assert!(
            self.is_ui_thread(),
            "QueueScheduler::pump called off the UI thread"
        );
        loop {
            let next = {
                let mut queue = self.queue.lock();
                if queue.is_empty() {
                    return;
                }
                queue.remove(0)
            };
            (next.1)();
        }
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Default for QueueScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for QueueScheduler {
    fn post(&self, id: TaskId, task: Task) {
        self.queue.lock().push((id, task));
    }

    fn post_at_front(&self, id: TaskId, task: Task) {
        self.queue.lock().insert(0, (id, task));
    }

    fn remove(&self, id: TaskId) {
        self.queue.lock().retain(|(queued, _)| *queued != id);
    }

    fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.ui_thread
    }
}

// =============================================================================
// Tests
// =============================================================================
