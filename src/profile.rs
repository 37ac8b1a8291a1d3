//! Benchmark profile table.
//!
//! Maps a task descriptor `suite-benchmark-input-parallelism` to the number
//! of physical cores the task occupies for its whole lifetime. The tables are
//! worst-case thread counts measured per benchmark; a zero entry marks a
//! parallelism value the benchmark does not support.

use crate::config::ConfigError;

/// Worst-case core requirement of a task, by descriptor.
///
/// Pure: same descriptor, same answer. Every lookup failure is a fatal
/// configuration error ([`ConfigError::ProfileMissing`]).
pub fn core_requirement(name: &str) -> Result<usize, ConfigError> {
    let missing = || ConfigError::ProfileMissing(name.to_string());

    let mut fields = name.splitn(4, '-');
    let suite = fields.next().ok_or_else(missing)?;
    let benchmark = fields.next().ok_or_else(missing)?;
    let _input = fields.next().ok_or_else(missing)?;
    let parallelism: usize = fields
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(missing)?;
    if parallelism < 1 {
        return Err(missing());
    }

    let table: &[usize] = match (suite, benchmark) {
        // PARSEC: one extra core for the serial/driver thread.
        ("parsec", "blackscholes" | "canneal" | "streamcluster" | "swaptions") => {
            &[2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]
        }
        ("parsec", "bodytrack") => &[3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16],
        ("parsec", "dedup") => &[4, 7, 10, 13, 16],
        ("parsec", "ferret") => &[7, 11, 15],
        ("parsec", "fluidanimate") => &[2, 3, 0, 5, 0, 0, 0, 9],
        ("parsec", "x264") => &[1, 3, 4, 5, 6, 7, 8, 9],
        (
            "splash2",
            "barnes" | "cholesky" | "fmm" | "lu.cont" | "lu.ncont" | "radiosity" | "raytrace"
            | "water.nsq",
        ) => &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16],
        ("splash2", "fft" | "ocean.cont" | "ocean.ncont" | "radix" | "water.sp") => {
            &[1, 2, 0, 4, 0, 0, 0, 8, 0, 0, 0, 0, 0, 0, 0, 16]
        }
        _ => return Err(missing()),
    };

    match table.get(parallelism - 1) {
        Some(0) | None => Err(missing()),
        Some(&requirement) => Ok(requirement),
    }
}
