//! Open-system admission, dispatch, and the periodic mapping loop.
//!
//! Tasks arrive over simulated time, queue while the grid is busy, and are
//! pinned to a set of cores for their whole lifetime. All mutation happens
//! inside the host's hooks (`thread_create`, `thread_exit`, `periodic`);
//! the scheduler never spawns threads and never blocks.
//!
//! The one piece of time-warping logic lives in `thread_exit`: when the last
//! running thread leaves an otherwise-idle system while tasks are still
//! waiting to arrive, their arrival times are pulled back in lockstep. The
//! host only advances time while something runs, so without the pull-back it
//! would deadlock on an idle grid.

use log::debug;

use crate::arrivals::{ArrivalDistribution, ArrivalPlan};
use crate::config::{Config, ConfigError};
use crate::core::{Core, CoreId, Grid, ThreadId};
use crate::host::{Affinity, Host, ThreadState, TimeNs};
use crate::metrics::{self, format_time, CellSnapshot, CellState, LiveSnapshot};
use crate::policy::{MappingPolicy, MappingPolicyKind, QueuePolicy};
use crate::profile;
use crate::state::SystemState;
use crate::task::{Phase, Task, TaskId};

/// Interval between internal consistency checks, in ns.
const CHECK_INTERVAL_NS: TimeNs = 1_000_000;

pub struct OpenScheduler {
    state: SystemState,
    grid: Grid,
    mapping: Box<dyn MappingPolicy>,
    queue: QueuePolicy,
    mapping_epoch: TimeNs,
    quantum: TimeNs,
    num_tasks: usize,
    num_cores: usize,
    /// Thread currently running on each core, from the scheduler's own
    /// bookkeeping (distinct from attachment: an attached thread may sleep).
    core_running: Vec<Option<ThreadId>>,
    /// Remaining time quantum per core.
    quantum_left: Vec<TimeNs>,
    last_periodic: TimeNs,
}

impl OpenScheduler {
    /// Build the scheduler from configuration. `num_cores` is the host's
    /// application core count. Every fatal configuration error surfaces
    /// here, before any simulated time passes.
    pub fn new(cfg: &Config, num_cores: usize) -> Result<Self, ConfigError> {
        let open = &cfg.scheduler.open;
        let pinned = &cfg.scheduler.pinned;
        let num_tasks = cfg.traceinput.num_apps;

        if open.epoch == 0 {
            return Err(ConfigError::InvalidEpoch);
        }
        if pinned.interleaving == 0 {
            return Err(ConfigError::InvalidInterleaving);
        }

        let grid = Grid::for_cores(num_cores)?;
        let mask = cfg.core_mask(num_cores)?;
        let queue = QueuePolicy::parse(&open.queue_policy)?;

        let mut tasks = Vec::with_capacity(num_tasks);
        for (id, name) in cfg.benchmark_names()?.into_iter().enumerate() {
            let requirement = profile::core_requirement(&name)?;
            tasks.push(Task::new(id, name, requirement));
        }

        let plan = ArrivalPlan {
            distribution: ArrivalDistribution::parse(&open.distribution)?,
            rate: open.arrival_rate,
            interval_ns: open.arrival_interval,
            seed: open.distribution_seed,
            explicit_times: open.explicit_arrival_times.clone(),
        };
        for (task, time) in tasks.iter_mut().zip(plan.times(num_tasks)?) {
            println!(
                "[Scheduler]: Setting Arrival Time for Task {} ({}) to {} ns",
                task.id, task.name, time
            );
            task.arrival_time_ns = time;
        }

        let preferred = cfg.preferred_cores(num_cores)?;
        let mapping = MappingPolicyKind::parse(&open.logic, preferred)?.build();

        let cores = (0..num_cores).map(|i| Core::new(i, mask[i])).collect();

        Ok(OpenScheduler {
            state: SystemState::new(tasks, cores),
            grid,
            mapping,
            queue,
            mapping_epoch: open.epoch,
            quantum: pinned.quantum,
            num_tasks,
            num_cores,
            core_running: vec![None; num_cores],
            quantum_left: vec![0; num_cores],
            last_periodic: 0,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    pub fn cores(&self) -> &[Core] {
        &self.state.cores
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn running_thread(&self, core: CoreId) -> Option<ThreadId> {
        self.core_running[core]
    }

    /// The task at the front of the admission queue, or None when empty.
    pub fn queue_front(&self) -> Option<TaskId> {
        self.queue.front(&self.state.tasks)
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    /// Try to admit a task. Returns false when the task is not yet arrived,
    /// not at the head of the queue, or the grid cannot hold it; the task
    /// then stays queued and is retried on the next epoch or thread exit.
    pub fn schedule(
        &mut self,
        host: &mut dyn Host,
        task_id: TaskId,
        is_initial_call: bool,
        now: TimeNs,
    ) -> bool {
        println!(
            "[Scheduler]: Trying to schedule Task {} at Time {}",
            task_id,
            format_time(now)
        );

        if self.state.tasks[task_id].arrival_time_ns > now {
            println!("[Scheduler]: Task {} is not ready for execution.", task_id);
            return false;
        }
        println!("[Scheduler]: Task {} put into execution queue.", task_id);
        self.state.tasks[task_id].enqueue();

        if self.queue_front() != Some(task_id) {
            println!("[Scheduler]: Task {} is not in front of the queue.", task_id);
            return false;
        }

        let need = self.state.tasks[task_id].core_requirement;
        let free = self.state.free_cores();
        if free < need {
            println!(
                "[Scheduler]: Not enough free cores ({}) to schedule Task {} with core requirement {}",
                free, task_id, need
            );
            return false;
        }

        if !self.execute_mapping_policy(task_id) {
            return false;
        }

        if !is_initial_call {
            if let Some(core) = self.set_affinity(host, task_id) {
                println!("[Scheduler]: Waking Task {} at Core {}", task_id, core);
            }
        }
        self.state.tasks[task_id].activate(now);
        true
    }

    /// Run the mapping policy for a task and reserve the chosen cores.
    fn execute_mapping_policy(&mut self, task_id: TaskId) -> bool {
        let (available, active) = self.state.availability();
        let need = self.state.tasks[task_id].core_requirement;
        let mut chosen =
            self.mapping
                .map(&self.state.tasks[task_id].name, need, &available, &active);
        if chosen.len() < need {
            println!("[Scheduler]: Policy returned too few cores, mapping failed.");
            return false;
        }
        chosen.truncate(need);
        debug!("mapping policy chose cores {:?} for task {}", chosen, task_id);
        for core in chosen {
            println!("[Scheduler]: Assigning Core {} to Task {}", core, task_id);
            self.state.cores[core].assigned_task = Some(task_id);
        }
        true
    }

    /// Attach a thread to the first unattached core reserved for its task
    /// and push the matching one-core affinity mask. With no such core the
    /// thread gets the invalid-core mask and the host parks it.
    ///
    /// This is the only place that touches attachment state, and it runs
    /// strictly after mapping has reserved cores.
    pub fn set_affinity(&mut self, host: &mut dyn Host, thread_id: ThreadId) -> Option<CoreId> {
        let app_id = host.app_of_thread(thread_id);
        match self.state.first_unattached_core(app_id) {
            None => {
                println!(
                    "[Scheduler]: Setting Affinity for Thread {} from Task {} to Invalid Core ID",
                    thread_id, app_id
                );
                host.set_affinity(thread_id, Affinity::Parked);
                None
            }
            Some(core) => {
                println!(
                    "[Scheduler]: Setting Affinity for Thread {} from Task {} to Core {}",
                    thread_id, app_id, core
                );
                host.set_affinity(thread_id, Affinity::Core(core));
                self.state.cores[core].assigned_thread = Some(thread_id);
                Some(core)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Host hooks
    // -----------------------------------------------------------------------

    /// Called by the host when a thread appears. Threads `0..N` are the
    /// primary threads of the tasks, created together at simulation start;
    /// ids from `N` up are worker threads of already-mapped tasks.
    ///
    /// Returns the core the thread starts running on, or None when it has to
    /// sleep until cores free up.
    pub fn thread_create(&mut self, host: &mut dyn Host, thread_id: ThreadId) -> Option<CoreId> {
        let app_id = host.app_of_thread(thread_id);
        let time = host.now();
        println!(
            "[Scheduler]: Trying to map Thread {} from Task {} at Time {}",
            thread_id,
            app_id,
            format_time(time)
        );

        if thread_id == 0 {
            if !self.schedule(host, 0, true, time) {
                fatal("Task 0 must be mapped for simulation to work");
            }
        } else if thread_id < self.num_tasks {
            self.schedule(host, thread_id, true, time);
        }

        match self.set_affinity(host, thread_id) {
            Some(core) if self.core_running[core].is_none() => {
                self.core_running[core] = Some(thread_id);
                self.quantum_left[core] = self.quantum;
                Some(core)
            }
            _ => {
                if thread_id >= self.num_tasks {
                    // Mapping reserved one core per worker thread up front, so
                    // a worker with nowhere to run means corrupted state.
                    fatal(format!(
                        "non-initial Thread {} from Task {} failed to get a core",
                        thread_id, app_id
                    ));
                }
                println!(
                    "[Scheduler]: Putting Thread {} from Task {} to sleep.",
                    thread_id, app_id
                );
                None
            }
        }
    }

    /// Called by the host when a thread exits. Detaches the thread's cores;
    /// for a primary thread also completes the task, releases its whole
    /// reservation, and reports its timings. May admit the next queued task
    /// or perform the empty-system time jump.
    pub fn thread_exit(&mut self, host: &mut dyn Host, thread_id: ThreadId, time: TimeNs) {
        // The core loses its runner no matter what else happens below.
        if let Some(core) = self.core_running.iter().position(|r| *r == Some(thread_id)) {
            self.core_running[core] = None;
            host.reschedule(time, core, false);
        }

        let app_id = host.app_of_thread(thread_id);
        println!(
            "[Scheduler]: Thread {} from Task {} exiting at Time {}",
            thread_id,
            app_id,
            format_time(time)
        );

        for core in 0..self.num_cores {
            if self.state.cores[core].assigned_thread == Some(thread_id) {
                self.state.cores[core].assigned_thread = None;
                println!(
                    "[Scheduler]: Releasing Core {} from Thread {}",
                    core, thread_id
                );
                host.set_affinity(thread_id, Affinity::Parked);
            }
        }

        if thread_id < self.num_tasks {
            println!("[Scheduler]: Task {} finished.", app_id);
            for core in 0..self.num_cores {
                if self.state.cores[core].assigned_task == Some(app_id) {
                    self.state.cores[core].assigned_task = None;
                    println!("[Scheduler]: Releasing Core {} from Task {}", core, app_id);
                }
            }
            self.state.tasks[app_id].complete(time);
            let timing = metrics::task_timing(&self.state.tasks[app_id]);
            println!(
                "[Scheduler][Result]: Task {} (Response/Service/Wait) Time (ns) :\t{}\t{}\t{}",
                app_id, timing.response_ns, timing.service_ns, timing.wait_ns
            );
        }

        self.prefetch_if_going_empty(host, time);

        if self.state.completed_tasks() == self.num_tasks {
            println!("[Scheduler]: All tasks finished executing.");
            println!(
                "[Scheduler][Result]: Average Response Time (ns) :\t{}",
                metrics::average_response_ns(&self.state.tasks)
            );
        }
    }

    /// The empty-system time jump. The host advances simulated time only
    /// while at least one thread runs; if the grid just went fully idle with
    /// tasks still unarrived, their arrival times are pulled back in
    /// lockstep so the head of the queue can start right now.
    fn prefetch_if_going_empty(&mut self, host: &mut dyn Host, time: TimeNs) {
        if self.state.free_cores() != self.num_cores || self.state.waiting_tasks() == 0 {
            return;
        }
        println!("[Scheduler]: System going empty, prefetching tasks");

        if self.state.queued_tasks() != 0 {
            println!("[Scheduler]: Prefetching Task from queue");
            if let Some(front) = self.queue_front() {
                self.schedule(host, front, false, time);
            }
            return;
        }

        let next_arrival = self
            .state
            .tasks
            .iter()
            .filter(|t| t.phase == Phase::WaitingToSchedule)
            .map(|t| t.arrival_time_ns)
            .min()
            .unwrap_or(0);
        if next_arrival == 0 {
            fatal("next arrival time is zero during time jump");
        }

        // A task whose arrival already passed but was never fetched (possible
        // between epochs) yields a zero jump rather than warping forward.
        let jump = next_arrival.saturating_sub(time);
        println!("[Scheduler]: Readjusting Arrival Time by {} ns", jump);
        for task in &mut self.state.tasks {
            if task.phase == Phase::WaitingToSchedule {
                task.arrival_time_ns -= jump;
                println!(
                    "[Scheduler]: New Arrival Time for Task {} set at {} ns",
                    task.id, task.arrival_time_ns
                );
            }
        }

        self.fetch_tasks_into_queue(time);
        if let Some(front) = self.queue_front() {
            self.schedule(host, front, false, time);
        }
    }

    /// Move every waiting task whose arrival time has passed into the queue.
    pub fn fetch_tasks_into_queue(&mut self, now: TimeNs) {
        for task in &mut self.state.tasks {
            if task.phase == Phase::WaitingToSchedule && task.arrival_time_ns <= now {
                println!("[Scheduler]: Task {} put into execution queue.", task.id);
                task.enqueue();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Periodic tick
    // -----------------------------------------------------------------------

    /// Called by the host at a fixed simulated-time interval. Checks the
    /// global invariants, drains the queue every mapping epoch, prints the
    /// occupancy map, and runs the per-core quantum accounting.
    pub fn periodic(&mut self, host: &mut dyn Host, time: TimeNs) {
        if time % CHECK_INTERVAL_NS == 0 {
            println!(
                "[Scheduler]: Time {} [Active Tasks = {} | Completed Tasks = {} | Queued Tasks = {} | Non-Queued Tasks = {} | Free Cores = {} | Active Tasks Requirements = {}]",
                format_time(time),
                self.state.active_tasks(),
                self.state.completed_tasks(),
                self.state.queued_tasks(),
                self.state.waiting_tasks(),
                self.state.free_cores(),
                self.state.active_core_requirement(),
            );
            if self.state.free_cores() + self.state.active_core_requirement() != self.num_cores {
                fatal("free cores plus active task requirements do not match the system size");
            }
            let accounted = self.state.active_tasks()
                + self.state.completed_tasks()
                + self.state.queued_tasks()
                + self.state.waiting_tasks();
            if accounted != self.num_tasks {
                fatal("task phase counts do not sum to the task count");
            }
        }

        if time % self.mapping_epoch == 0 {
            println!("[Scheduler]: Scheduler invoked at {}", format_time(time));
            self.fetch_tasks_into_queue(time);
            while self.state.queued_tasks() != 0 {
                let Some(front) = self.queue_front() else {
                    break;
                };
                if !self.schedule(host, front, false, time) {
                    break;
                }
            }
            self.print_mapping(&*host);
            metrics::write_snapshot(&self.snapshot(&*host, time));
        }

        let delta = time - self.last_periodic;
        for core in 0..self.num_cores {
            if delta > self.quantum_left[core] || self.core_running[core].is_none() {
                debug!("core {} quantum expired or idle, rescheduling", core);
                host.reschedule(time, core, true);
                self.quantum_left[core] = self.quantum;
            } else {
                self.quantum_left[core] -= delta;
            }
        }
        self.last_periodic = time;
    }

    /// Row-major occupancy map: `.` free, `*id*` running, `-id-` attached
    /// but not running, `(id)` reserved with no thread attached.
    fn print_mapping(&self, host: &dyn Host) {
        println!("[Scheduler]: Current mapping:");
        for row in 0..self.grid.rows {
            let mut line = String::new();
            for col in 0..self.grid.cols {
                if col > 0 {
                    line.push(' ');
                }
                let core = &self.state.cores[self.grid.core_at(row, col)];
                match core.assigned_task {
                    None => line.push_str("  . "),
                    Some(task) => {
                        if task < 10 {
                            line.push(' ');
                        }
                        let cell = match core.assigned_thread {
                            Some(thread) => {
                                if host.thread_state(thread) == ThreadState::Running {
                                    format!("*{}*", task)
                                } else {
                                    format!("-{}-", task)
                                }
                            }
                            None => format!("({})", task),
                        };
                        line.push_str(&cell);
                    }
                }
            }
            println!("{}", line);
        }
    }

    fn snapshot(&self, host: &dyn Host, time: TimeNs) -> LiveSnapshot {
        let cells = self
            .state
            .cores
            .iter()
            .map(|core| CellSnapshot {
                task: core.assigned_task,
                state: match (core.assigned_task, core.assigned_thread) {
                    (None, _) => CellState::Free,
                    (Some(_), None) => CellState::Reserved,
                    (Some(_), Some(thread)) => {
                        if host.thread_state(thread) == ThreadState::Running {
                            CellState::Running
                        } else {
                            CellState::Attached
                        }
                    }
                },
            })
            .collect();
        LiveSnapshot {
            time_ns: time,
            rows: self.grid.rows,
            cols: self.grid.cols,
            cells,
            waiting: self.state.waiting_tasks(),
            queued: self.state.queued_tasks(),
            active: self.state.active_tasks(),
            completed: self.state.completed_tasks(),
            free_cores: self.state.free_cores(),
            tasks: self.state.tasks.iter().map(metrics::task_snapshot).collect(),
        }
    }
}

/// Unrecoverable internal or startup error inside a hook: report and abort,
/// never unwind into the host simulator.
fn fatal(msg: impl AsRef<str>) -> ! {
    println!("[Scheduler][Error]: {}", msg.as_ref());
    std::process::exit(1);
}
