//! Shared test fixtures: a recording mock host and a baseline configuration.
#![allow(dead_code)]

use std::collections::HashMap;

use tilesched::config::{Config, OpenSection, PinnedSection, SchedulerSection, TraceInput};
use tilesched::core::{CoreId, ThreadId};
use tilesched::host::{Affinity, Host, ThreadState, TimeNs};
use tilesched::task::TaskId;

/// Mock host: records every affinity push and reschedule request, and lets
/// tests script thread states and worker-thread ownership.
pub struct RecordingHost {
    pub time: TimeNs,
    pub num_tasks: usize,
    /// Worker threads (ids >= num_tasks) and the task they belong to.
    pub worker_app: HashMap<ThreadId, TaskId>,
    pub thread_states: HashMap<ThreadId, ThreadState>,
    pub affinity_log: Vec<(ThreadId, Affinity)>,
    pub reschedules: Vec<(TimeNs, CoreId, bool)>,
}

impl RecordingHost {
    pub fn new(num_tasks: usize) -> Self {
        RecordingHost {
            time: 0,
            num_tasks,
            worker_app: HashMap::new(),
            thread_states: HashMap::new(),
            affinity_log: Vec::new(),
            reschedules: Vec::new(),
        }
    }

    pub fn add_worker(&mut self, thread: ThreadId, task: TaskId) {
        self.worker_app.insert(thread, task);
    }

    pub fn set_thread_state(&mut self, thread: ThreadId, state: ThreadState) {
        self.thread_states.insert(thread, state);
    }

    /// The most recent affinity pushed for a thread.
    pub fn last_affinity(&self, thread: ThreadId) -> Option<Affinity> {
        self.affinity_log
            .iter()
            .rev()
            .find(|(t, _)| *t == thread)
            .map(|(_, a)| *a)
    }
}

impl Host for RecordingHost {
    fn now(&self) -> TimeNs {
        self.time
    }

    fn app_of_thread(&self, thread: ThreadId) -> TaskId {
        self.worker_app.get(&thread).copied().unwrap_or(thread)
    }

    fn thread_state(&self, thread: ThreadId) -> ThreadState {
        self.thread_states
            .get(&thread)
            .copied()
            .unwrap_or(ThreadState::Runnable)
    }

    fn set_affinity(&mut self, thread: ThreadId, affinity: Affinity) {
        self.affinity_log.push((thread, affinity));
    }

    fn reschedule(&mut self, time: TimeNs, core: CoreId, from_periodic: bool) {
        self.reschedules.push((time, core, from_periodic));
    }
}

/// Baseline configuration: explicit arrivals at t=0, FIFO, first_unused over
/// the natural core order. Tests override individual fields.
pub fn test_config(num_apps: usize, num_cores: usize, benchmarks: &str) -> Config {
    Config {
        scheduler: SchedulerSection {
            open: OpenSection {
                core_mask: Vec::new(),
                epoch: 1000,
                queue_policy: "FIFO".into(),
                distribution: "explicit".into(),
                arrival_rate: 1,
                arrival_interval: 1000,
                explicit_arrival_times: vec![0; num_apps],
                distribution_seed: 0,
                logic: "first_unused".into(),
                preferred_core: (0..num_cores as i64).chain(std::iter::once(-1)).collect(),
            },
            pinned: PinnedSection {
                quantum: 1_000_000,
                interleaving: 1,
            },
        },
        traceinput: TraceInput {
            num_apps,
            benchmarks: benchmarks.into(),
        },
    }
}
