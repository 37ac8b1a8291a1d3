//! Mapping and queue policies.
//!
//! The mapping policy chooses which cores a task gets; the queue policy
//! chooses which queued task is admitted next. Both are variant-tagged at
//! construction so alternatives slot in without touching the engine.

use crate::config::ConfigError;
use crate::core::CoreId;
use crate::task::{Phase, Task, TaskId};

/// Trait for core mapping policies.
pub trait MappingPolicy {
    /// Choose cores for a task, in placement order.
    ///
    /// `available[i]` is true for cores the policy may use right now;
    /// `active[i]` marks cores held by other tasks, for policies that care
    /// about neighborhood. Returning fewer than `need` indices means the
    /// mapping failed and the task stays queued.
    fn map(
        &mut self,
        task_name: &str,
        need: usize,
        available: &[bool],
        active: &[bool],
    ) -> Vec<CoreId>;

    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// first_unused
// ---------------------------------------------------------------------------

/// Walks a configured preference order and takes the first available cores.
/// Returns a short list when not enough preferred cores are free.
pub struct FirstUnused {
    preferred: Vec<CoreId>,
}

impl FirstUnused {
    pub fn new(preferred: Vec<CoreId>) -> Self {
        FirstUnused { preferred }
    }
}

impl MappingPolicy for FirstUnused {
    fn map(
        &mut self,
        _task_name: &str,
        need: usize,
        available: &[bool],
        _active: &[bool],
    ) -> Vec<CoreId> {
        let mut chosen = Vec::with_capacity(need);
        for &core in &self.preferred {
            if chosen.len() == need {
                break;
            }
            if available.get(core).copied().unwrap_or(false) {
                chosen.push(core);
            }
        }
        chosen
    }

    fn name(&self) -> &'static str {
        "first_unused"
    }
}

// ---------------------------------------------------------------------------
// Policy selectors
// ---------------------------------------------------------------------------

/// Selectable mapping policy.
pub enum MappingPolicyKind {
    FirstUnused { preferred: Vec<CoreId> },
}

impl MappingPolicyKind {
    /// Resolve a configured policy name. `preferred` is the configured
    /// preference list, already cut at its terminator.
    pub fn parse(logic: &str, preferred: Vec<CoreId>) -> Result<Self, ConfigError> {
        match logic {
            "first_unused" => {
                if preferred.is_empty() {
                    return Err(ConfigError::MissingPreferredCores);
                }
                Ok(MappingPolicyKind::FirstUnused { preferred })
            }
            other => Err(ConfigError::UnknownMappingPolicy(other.to_string())),
        }
    }

    pub fn build(self) -> Box<dyn MappingPolicy> {
        match self {
            MappingPolicyKind::FirstUnused { preferred } => Box::new(FirstUnused::new(preferred)),
        }
    }
}

/// Selectable queue policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePolicy {
    Fifo,
}

impl QueuePolicy {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "FIFO" => Ok(QueuePolicy::Fifo),
            other => Err(ConfigError::UnknownQueuePolicy(other.to_string())),
        }
    }

    /// The task to admit next, or None when the queue is empty.
    pub fn front(&self, tasks: &[Task]) -> Option<TaskId> {
        match self {
            QueuePolicy::Fifo => tasks
                .iter()
                .find(|t| t.phase == Phase::Queued)
                .map(|t| t.id),
        }
    }
}
