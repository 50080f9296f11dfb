//! Borrowed thread priority.
//!
//! When a waiter blocks on a computation another thread is already running,
//! the runner's scheduling priority is temporarily raised to at least the
//! waiter's, so a background resolve can't stall the main thread behind it
//! (priority inversion). On platforms without accessible priority scheduling
//! this degrades to a plain blocking wait - a performance difference, never
//! a correctness one.

// =============================================================================
// Linux implementation
// =============================================================================

#[cfg(target_os = "linux")]
mod imp {
    /// Kernel thread id of the runner, captured when it claims execution.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ThreadHandle(libc::pid_t);

    pub fn current_thread() -> ThreadHandle {
        // gettid(2) has no portable libc wrapper everywhere; go via syscall.
        ThreadHandle(unsafe { libc::syscall(libc::SYS_gettid) as libc::pid_t })
    }

    fn nice_of(tid: libc::pid_t) -> Option<i32> {
        // getpriority returns -1 both as an error and as a valid nice value;
        // clear errno first to tell them apart.
        unsafe {
            *libc::__errno_location() = 0;
            let value = libc::getpriority(libc::PRIO_PROCESS, tid as libc::id_t);
            if value == -1 && *libc::__errno_location() != 0 {
                None
            } else {
                Some(value)
            }
        }
    }

    fn set_nice(tid: libc::pid_t, nice: i32) -> bool {
        unsafe { libc::setpriority(libc::PRIO_PROCESS, tid as libc::id_t, nice) == 0 }
    }

    /// Raise `runner` to at least the calling thread's priority.
    ///
    /// Best effort: lowering a nice value needs privileges the process may
    /// not have; failures are silently ignored.
    pub fn donate(runner: ThreadHandle) -> PriorityLoan {
        let waiter_nice = match nice_of(0) {
            Some(n) => n,
            None => return PriorityLoan { restore: None },
        };
        let runner_nice = match nice_of(runner.0) {
            Some(n) => n,
            None => return PriorityLoan { restore: None },
        };

        // Lower nice = higher priority.
        if waiter_nice < runner_nice && set_nice(runner.0, waiter_nice) {
            PriorityLoan {
                restore: Some((runner.0, runner_nice)),
            }
        } else {
            PriorityLoan { restore: None }
        }
    }

    /// Restores the runner's original priority when dropped.
    pub struct PriorityLoan {
        restore: Option<(libc::pid_t, i32)>,
    }

    impl Drop for PriorityLoan {
        fn drop(&mut self) {
            if let Some((tid, nice)) = self.restore.take() {
                set_nice(tid, nice);
            }
        }
    }
}

// =============================================================================
// Fallback (non-linux)
// =============================================================================

#[cfg(not(target_os = "linux"))]
mod imp {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ThreadHandle;

    pub fn current_thread() -> ThreadHandle {
        ThreadHandle
    }

    pub fn donate(_runner: ThreadHandle) -> PriorityLoan {
        PriorityLoan
    }

    pub struct PriorityLoan;
}

pub use imp::{PriorityLoan, ThreadHandle, current_thread, donate};

// =============================================================================
// Tests
// =============================================================================
