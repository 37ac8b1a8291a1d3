//! The host-simulator boundary.
//!
//! The scheduler never owns threads or the clock. Everything it needs from
//! the surrounding simulator (the current time, thread-to-task lookup,
//! thread run state, affinity pushes, reschedule requests) goes through the
//! [`Host`] capability passed into every hook. Tests substitute a mock.

use crate::core::{CoreId, ThreadId};
use crate::task::TaskId;

/// Simulated time in nanoseconds.
pub type TimeNs = u64;

/// Run state of a thread as reported by the host's thread manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Currently executing on some core.
    Running,
    /// Ready to run but not placed on a core.
    Runnable,
    /// Parked; waits for an affinity push to a real core.
    Sleeping,
}

/// An affinity mask as the scheduler pushes it: either exactly one core, or
/// the invalid-core sentinel that tells the host to park the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Core(CoreId),
    Parked,
}

/// Capabilities the host simulator exposes to the scheduler.
pub trait Host {
    /// Current global simulated time.
    fn now(&self) -> TimeNs;

    /// The task a thread belongs to. Primary threads carry the task's own id.
    fn app_of_thread(&self, thread: ThreadId) -> TaskId;

    /// Run state of a thread, used when rendering the occupancy map.
    fn thread_state(&self, thread: ThreadId) -> ThreadState;

    /// Push an affinity mask for a thread.
    fn set_affinity(&mut self, thread: ThreadId, affinity: Affinity);

    /// Ask the host to re-run its per-core time-slicing for `core`, either
    /// from the periodic quantum accounting or because the running thread
    /// went away.
    fn reschedule(&mut self, time: TimeNs, core: CoreId, from_periodic: bool);
}
