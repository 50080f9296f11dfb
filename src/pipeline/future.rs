//! TreeFuture - a run-once, versioned computation shared between threads.
//!
//! Any interested thread may call [`TreeFuture::run_and_get`]: exactly one
//! caller wins an atomic claim and executes the computation inline on its own
//! thread; every other caller blocks until the winner publishes the result,
//! donating its scheduling priority to the runner while it waits (see
//! [`priority`]). A future that was cancelled before anyone claimed it yields
//! `None` to all callers.
//!
//! If the computation panics, the panic propagates on the executing thread
//! and every waiter panics too - a half-computed tree must never be observed
//! as a success.
//!
//! [`priority`]: crate::pipeline::priority

use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::pipeline::priority;

// =============================================================================
// State machine
// =============================================================================

const STATE_PENDING: u8 = 0;
const STATE_CLAIMED: u8 = 1;
const STATE_DONE: u8 = 2;
const STATE_CANCELLED: u8 = 3;
const STATE_POISONED: u8 = 4;

type Compute<T> = Box<dyn FnOnce() -> T + Send>;

struct Shared<T> {
    compute: Option<Compute<T>>,
    result: Option<T>,
    runner: Option<priority::ThreadHandle>,
}

/// A single resolve or layout computation at a fixed pipeline version.
pub struct TreeFuture<T> {
    version: u64,
    state: AtomicU8,
    shared: Mutex<Shared<T>>,
    done: Condvar,
}

impl<T: Clone> TreeFuture<T> {
    pub fn new(version: u64, compute: impl FnOnce() -> T + Send + 'static) -> Self {
        Self {
            version,
            state: AtomicU8::new(STATE_PENDING),
            shared: Mutex::new(Shared {
                compute: Some(Box::new(compute)),
                result: None,
                runner: None,
            }),
            done: Condvar::new(),
        }
    }

    /// The pipeline version this computation was started for.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Cancel the computation. Succeeds only while nobody has claimed it;
    /// once a thread is running it the result will be produced regardless.
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(
                STATE_PENDING,
                STATE_CANCELLED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_CANCELLED
    }

    pub fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_DONE
    }

    /// Run the computation (or wait for whoever is running it) and return
    /// the result. `None` when the future was cancelled before being claimed.
    pub fn run_and_get(&self) -> Option<T> {
        match self.state.compare_exchange(
            STATE_PENDING,
            STATE_CLAIMED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Some(self.run_claimed()),
            Err(STATE_CANCELLED) => None,
            Err(_) => self.wait_for_result(),
        }
    }

    fn run_claimed(&self) -> T {
        let compute = {
            let mut shared = self.shared.lock();
            shared.runner = Some(priority::current_thread());
            // The claim CAS guarantees the closure is still here.
            shared.compute.take().unwrap()
        };

        // If the computation panics, flip to POISONED on the way out so
        // waiters don't block forever; they re-raise on their own threads.
        let guard = PoisonGuard { future: self };
        let value = compute();
        std::mem::forget(guard);

        let mut shared = self.shared.lock();
        shared.result = Some(value.clone());
        shared.runner = None;
        self.state.store(STATE_DONE, Ordering::Release);
        self.done.notify_all();
        drop(shared);

        value
    }

    fn wait_for_result(&self) -> Option<T> {
        let mut shared = self.shared.lock();
        loop {
            match self.state.load(Ordering::Acquire) {
                STATE_DONE => return shared.result.clone(),
                STATE_CANCELLED => return None,
                STATE_POISONED => {
                    panic!("render computation panicked on the executing thread")
                }
                _ => {
                    // Donate priority for the duration of this wait; the
                    // loan restores the runner's priority when dropped.
                    let loan = shared.runner.map(priority::donate);
                    self.done.wait(&mut shared);
                    drop(loan);
                }
            }
        }
    }
}

struct PoisonGuard<'a, T> {
    future: &'a TreeFuture<T>,
}

impl<T> Drop for PoisonGuard<'_, T> {
    fn drop(&mut self) {
        self.future.state.store(STATE_POISONED, Ordering::Release);
        self.future.done.notify_all();
    }
}

// =============================================================================
// Tests
// =============================================================================
