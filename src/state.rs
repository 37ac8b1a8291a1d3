//! Task and core state store.
//!
//! Two parallel arrays, sized once at startup. Derived counts are O(N) or
//! O(M) scans on demand; at these cardinalities caching would only add
//! invariants to maintain.

use crate::core::{Core, CoreId};
use crate::task::{Phase, Task, TaskId};

pub struct SystemState {
    pub tasks: Vec<Task>,
    pub cores: Vec<Core>,
}

impl SystemState {
    pub fn new(tasks: Vec<Task>, cores: Vec<Core>) -> Self {
        SystemState { tasks, cores }
    }

    pub fn free_cores(&self) -> usize {
        self.cores.iter().filter(|c| c.is_free()).count()
    }

    pub fn waiting_tasks(&self) -> usize {
        self.count_phase(Phase::WaitingToSchedule)
    }

    pub fn queued_tasks(&self) -> usize {
        self.count_phase(Phase::Queued)
    }

    pub fn active_tasks(&self) -> usize {
        self.count_phase(Phase::Active)
    }

    pub fn completed_tasks(&self) -> usize {
        self.count_phase(Phase::Completed)
    }

    /// Sum of core requirements over all active tasks.
    pub fn active_core_requirement(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.phase == Phase::Active)
            .map(|t| t.core_requirement)
            .sum()
    }

    /// Bitmasks handed to the mapping policy: cores it may use now, and
    /// cores currently held by tasks.
    pub fn availability(&self) -> (Vec<bool>, Vec<bool>) {
        let available = self
            .cores
            .iter()
            .map(|c| c.mask_allowed && c.is_free())
            .collect();
        let active = self.cores.iter().map(|c| !c.is_free()).collect();
        (available, active)
    }

    /// First core reserved for `task` that has no thread attached yet.
    pub fn first_unattached_core(&self, task: TaskId) -> Option<CoreId> {
        self.cores
            .iter()
            .find(|c| c.assigned_task == Some(task) && c.assigned_thread.is_none())
            .map(|c| c.index)
    }

    fn count_phase(&self, phase: Phase) -> usize {
        self.tasks.iter().filter(|t| t.phase == phase).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SystemState {
        let tasks = vec![
            Task::new(0, "splash2-barnes-small-2".into(), 2),
            Task::new(1, "splash2-barnes-small-4".into(), 4),
            Task::new(2, "splash2-barnes-small-1".into(), 1),
        ];
        let cores = (0..4).map(|i| Core::new(i, true)).collect();
        SystemState::new(tasks, cores)
    }

    #[test]
    fn counts_partition_the_task_set() {
        let mut s = store();
        s.tasks[0].enqueue();
        s.tasks[0].activate(0);
        s.tasks[1].enqueue();
        assert_eq!(s.waiting_tasks(), 1);
        assert_eq!(s.queued_tasks(), 1);
        assert_eq!(s.active_tasks(), 1);
        assert_eq!(s.completed_tasks(), 0);
        assert_eq!(
            s.waiting_tasks() + s.queued_tasks() + s.active_tasks() + s.completed_tasks(),
            s.tasks.len()
        );
    }

    #[test]
    fn active_requirement_sums_only_active_tasks() {
        let mut s = store();
        s.tasks[0].enqueue();
        s.tasks[0].activate(0);
        s.tasks[2].enqueue();
        s.tasks[2].activate(0);
        assert_eq!(s.active_core_requirement(), 3);
    }

    #[test]
    fn availability_respects_mask_and_assignment() {
        let mut s = store();
        s.cores[1].mask_allowed = false;
        s.cores[2].assigned_task = Some(0);
        let (available, active) = s.availability();
        assert_eq!(available, vec![true, false, false, true]);
        assert_eq!(active, vec![false, false, true, false]);
        assert_eq!(s.free_cores(), 3);
    }

    #[test]
    fn first_unattached_core_skips_attached_ones() {
        let mut s = store();
        s.cores[1].assigned_task = Some(0);
        s.cores[2].assigned_task = Some(0);
        s.cores[1].assigned_thread = Some(0);
        assert_eq!(s.first_unattached_core(0), Some(2));
        s.cores[2].assigned_thread = Some(5);
        assert_eq!(s.first_unattached_core(0), None);
    }
}
