//! Demo driver: a small discrete-event host feeding the scheduler a
//! four-task PARSEC/SPLASH-2 workload on a 4×4 grid.
//!
//! Pass a JSON config path as the first argument to run a custom workload;
//! without arguments a built-in demo configuration is used. Run the `viz`
//! binary in a second terminal to watch the occupancy map live.

use std::env;

use anyhow::{ensure, Context, Result};
use log::debug;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

use tilesched::config::{Config, OpenSection, PinnedSection, SchedulerSection, TraceInput};
use tilesched::core::{CoreId, ThreadId};
use tilesched::host::{Affinity, Host, ThreadState, TimeNs};
use tilesched::metrics::format_time;
use tilesched::scheduler::OpenScheduler;
use tilesched::task::{Phase, TaskId};

/// Periodic hook interval.
const TICK_NS: TimeNs = 100_000;
/// Fixed per-task service time in the demo.
const SERVICE_NS: TimeNs = 2_500_000;
const DEMO_CORES: usize = 16;

#[derive(Debug, Clone, Default)]
struct SimThread {
    affinity: Option<Affinity>,
    running: bool,
    done: bool,
    service_start: TimeNs,
}

/// Discrete-event host: owns the clock and the primary thread of each task.
/// Stands in for the full simulator's thread manager and time-slicer.
struct SimHost {
    time: TimeNs,
    /// Stride for the free-core scan (`scheduler/pinned/interleaving`).
    stride: usize,
    num_cores: usize,
    threads: Vec<SimThread>,
}

impl SimHost {
    fn new(num_tasks: usize, num_cores: usize, stride: usize) -> Self {
        SimHost {
            time: 0,
            stride,
            num_cores,
            threads: vec![SimThread::default(); num_tasks],
        }
    }

    fn next_core(&self, core: CoreId) -> CoreId {
        let mut next = core + self.stride;
        if next >= self.num_cores {
            next %= self.num_cores;
            next += 1;
            next %= self.stride;
        }
        next
    }

    fn wake_thread_affine_to(&mut self, core: CoreId, time: TimeNs) -> bool {
        for (tid, thread) in self.threads.iter_mut().enumerate() {
            if thread.affinity == Some(Affinity::Core(core)) && !thread.running && !thread.done {
                thread.running = true;
                thread.service_start = time;
                debug!("host: woke thread {} on core {}", tid, core);
                return true;
            }
        }
        false
    }
}

impl Host for SimHost {
    fn now(&self) -> TimeNs {
        self.time
    }

    // The demo only simulates primary threads, so thread id == task id.
    fn app_of_thread(&self, thread: ThreadId) -> TaskId {
        thread
    }

    fn thread_state(&self, thread: ThreadId) -> ThreadState {
        let t = &self.threads[thread];
        if t.running {
            ThreadState::Running
        } else if t.done {
            ThreadState::Sleeping
        } else {
            ThreadState::Runnable
        }
    }

    fn set_affinity(&mut self, thread: ThreadId, affinity: Affinity) {
        self.threads[thread].affinity = Some(affinity);
    }

    fn reschedule(&mut self, time: TimeNs, core: CoreId, _from_periodic: bool) {
        // Scan outward from the freed core with the configured stride and
        // wake the first parked thread affine to a core on the way.
        let mut candidate = core;
        loop {
            if self.wake_thread_affine_to(candidate, time) {
                return;
            }
            candidate = self.next_core(candidate);
            if candidate == core {
                return;
            }
        }
    }
}

fn demo_config() -> Config {
    Config {
        scheduler: SchedulerSection {
            open: OpenSection {
                core_mask: Vec::new(),
                epoch: 100_000,
                queue_policy: "FIFO".into(),
                distribution: "uniform".into(),
                arrival_rate: 1,
                arrival_interval: 1_000_000,
                explicit_arrival_times: Vec::new(),
                distribution_seed: 0,
                logic: "first_unused".into(),
                preferred_core: (0..DEMO_CORES as i64).chain([-1]).collect(),
            },
            pinned: PinnedSection {
                quantum: 1_000_000,
                interleaving: 1,
            },
        },
        traceinput: TraceInput {
            num_apps: 4,
            benchmarks: "parsec-blackscholes-simsmall-3\
                +parsec-bodytrack-simlarge-2\
                +splash2-fft-small-4\
                +splash2-barnes-small-8"
                .into(),
        },
    }
}

fn main() -> Result<()> {
    TermLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new().build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let cfg = match env::args().nth(1) {
        Some(path) => {
            Config::from_json_file(&path).with_context(|| format!("loading config {}", path))?
        }
        None => demo_config(),
    };
    let num_cores = if cfg.scheduler.open.core_mask.is_empty() {
        DEMO_CORES
    } else {
        cfg.scheduler.open.core_mask.len()
    };
    let num_tasks = cfg.traceinput.num_apps;

    let mut sched = OpenScheduler::new(&cfg, num_cores).context("scheduler startup")?;
    let mut host = SimHost::new(num_tasks, num_cores, cfg.scheduler.pinned.interleaving);

    // All primary threads appear together at simulation start.
    for tid in 0..num_tasks {
        if sched.thread_create(&mut host, tid).is_some() {
            host.threads[tid].running = true;
            host.threads[tid].service_start = 0;
        }
    }

    let mut now: TimeNs = 0;
    loop {
        now += TICK_NS;
        host.time = now;

        // Retire threads that finished their service.
        for tid in 0..num_tasks {
            if host.threads[tid].running && now - host.threads[tid].service_start >= SERVICE_NS {
                host.threads[tid].running = false;
                host.threads[tid].done = true;
                sched.thread_exit(&mut host, tid, now);
            }
        }

        sched.periodic(&mut host, now);

        if sched.tasks().iter().all(|t| t.phase == Phase::Completed) {
            break;
        }
        ensure!(now < 1_000_000_000, "demo did not converge within 1 s");
    }

    println!(
        "Simulation complete at {}: {} tasks on {} cores",
        format_time(now),
        num_tasks,
        num_cores
    );
    Ok(())
}
