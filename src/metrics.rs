//! Result reporting and live occupancy snapshots.
//!
//! The scheduler writes a JSON snapshot of the core grid and task table
//! after every mapping epoch. The viz binary polls this file and re-renders
//! its dashboard. Writes are atomic (write to .tmp then rename) to avoid
//! torn reads.

use serde::{Deserialize, Serialize};

use crate::host::TimeNs;
use crate::task::Task;

pub const SNAPSHOT_PATH: &str = "/tmp/tilesched_live.json";

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Occupancy state of one core cell.
#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    /// No task assigned.
    #[default]
    Free,
    /// Assigned to a task, no thread attached yet.
    Reserved,
    /// Thread attached but not currently running.
    Attached,
    /// Thread attached and running.
    Running,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct CellSnapshot {
    /// Task holding this core, if any.
    pub task: Option<usize>,
    pub state: CellState,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct TaskSnapshot {
    pub id: usize,
    pub name: String,
    pub phase: String,
    pub core_requirement: usize,
    pub arrival_time_ns: u64,
    pub start_time_ns: u64,
    pub departure_time_ns: u64,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct LiveSnapshot {
    pub time_ns: u64,
    /// Grid geometry; `cells` is row-major rows × cols.
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<CellSnapshot>,
    pub waiting: usize,
    pub queued: usize,
    pub active: usize,
    pub completed: usize,
    pub free_cores: usize,
    pub tasks: Vec<TaskSnapshot>,
}

// ---------------------------------------------------------------------------
// I/O helpers
// ---------------------------------------------------------------------------

/// Atomically write a snapshot to SNAPSHOT_PATH.
pub fn write_snapshot(snapshot: &LiveSnapshot) {
    if let Ok(json) = serde_json::to_string(snapshot) {
        let tmp = format!("{}.tmp", SNAPSHOT_PATH);
        if std::fs::write(&tmp, &json).is_ok() {
            let _ = std::fs::rename(&tmp, SNAPSHOT_PATH);
        }
    }
}

/// Read the latest snapshot. Returns None if no simulation has written one
/// yet or the file cannot be parsed.
pub fn read_snapshot() -> Option<LiveSnapshot> {
    let data = std::fs::read_to_string(SNAPSHOT_PATH).ok()?;
    serde_json::from_str(&data).ok()
}

// ---------------------------------------------------------------------------
// Per-task timings
// ---------------------------------------------------------------------------

/// Response/service/wait split for one completed task. Times are measured
/// from the (possibly jump-adjusted) arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTiming {
    pub response_ns: TimeNs,
    pub service_ns: TimeNs,
    pub wait_ns: TimeNs,
}

pub fn task_timing(task: &Task) -> TaskTiming {
    TaskTiming {
        response_ns: task.departure_time_ns - task.arrival_time_ns,
        service_ns: task.departure_time_ns - task.start_time_ns,
        wait_ns: task.start_time_ns - task.arrival_time_ns,
    }
}

/// Mean response time over all tasks; meaningful once every task completed.
pub fn average_response_ns(tasks: &[Task]) -> TimeNs {
    if tasks.is_empty() {
        return 0;
    }
    let total: TimeNs = tasks
        .iter()
        .map(|t| t.departure_time_ns - t.arrival_time_ns)
        .sum();
    total / tasks.len() as TimeNs
}

/// Format a timestamp with thousands grouping: `1234567` → `"1.234.567 ns"`.
pub fn format_time(ns: TimeNs) -> String {
    let mut groups = Vec::new();
    let mut rest = ns;
    loop {
        if rest < 1000 {
            groups.push(rest.to_string());
            break;
        }
        groups.push(format!("{:03}", rest % 1000));
        rest /= 1000;
    }
    groups.reverse();
    format!("{} ns", groups.join("."))
}

pub fn task_snapshot(task: &Task) -> TaskSnapshot {
    TaskSnapshot {
        id: task.id,
        name: task.name.clone(),
        phase: task.phase.to_string(),
        core_requirement: task.core_requirement,
        arrival_time_ns: task.arrival_time_ns,
        start_time_ns: task.start_time_ns,
        departure_time_ns: task.departure_time_ns,
    }
}
