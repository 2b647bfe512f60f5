use std::{collections::VecDeque, thread};

use argh::FromArgs;
use firstfit::{AllocError, AllocErrorKind, Allocator, ArenaConfig};
use log::{debug, info};
use snafu::{ResultExt as _, ensure_whatever, whatever};
use snafu_utils::GenericError;

/// Allocate and free from several threads at once, then verify the arena.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "stress")]
pub struct StressArgs {
    /// number of worker threads
    #[argh(option, default = "4")]
    threads: usize,

    /// allocate/free rounds per thread
    #[argh(option, default = "10_000")]
    rounds: usize,

    /// largest request size in bytes
    #[argh(option, default = "512")]
    max_size: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct WorkerOutcome {
    allocated: usize,
    freed: usize,
    out_of_memory: usize,
}

pub fn run(config: &ArenaConfig, args: &StressArgs) -> Result<(), GenericError> {
    ensure_whatever!(args.max_size > 0, "--max-size must be at least 1");
    let allocator = Allocator::new(config).whatever_context("failed to create allocator")?;
    info!(
        "stressing {} bytes with {} threads x {} rounds",
        allocator.capacity(),
        args.threads,
        args.rounds
    );

    let outcomes = thread::scope(|s| -> Result<Vec<WorkerOutcome>, GenericError> {
        let mut handles = Vec::new();
        for t in 0..args.threads {
            let allocator = &allocator;
            let handle = thread::Builder::new()
                .name(format!("worker-{t}"))
                .spawn_scoped(s, move || worker(allocator, t, args))
                .whatever_context("failed to spawn worker thread")?;
            handles.push(handle);
        }
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(outcome) => outcome.whatever_context("worker failed"),
                Err(_) => whatever!("worker thread panicked"),
            })
            .collect()
    })?;

    allocator
        .check_invariants()
        .whatever_context("block list is inconsistent")?;
    let stats = allocator.stats();
    ensure_whatever!(
        stats.is_idle(),
        "{} allocations leaked",
        stats.live_allocations()
    );

    let total = outcomes
        .iter()
        .fold(WorkerOutcome::default(), |acc, outcome| WorkerOutcome {
            allocated: acc.allocated + outcome.allocated,
            freed: acc.freed + outcome.freed,
            out_of_memory: acc.out_of_memory + outcome.out_of_memory,
        });
    println!(
        "{} allocations, {} frees, {} out-of-memory rejections",
        total.allocated, total.freed, total.out_of_memory
    );
    crate::print_stats(&stats);
    Ok(())
}

/// Deterministic request size in `1..=max_size` for `round` of worker `seed`.
fn request_size(seed: usize, round: usize, max_size: usize) -> usize {
    let mix = seed
        .wrapping_mul(7919)
        .wrapping_add(round.wrapping_mul(104_729));
    1 + mix % max_size
}

fn worker(
    allocator: &Allocator,
    seed: usize,
    args: &StressArgs,
) -> Result<WorkerOutcome, AllocError> {
    let mut outcome = WorkerOutcome::default();
    let mut held = VecDeque::new();

    for round in 0..args.rounds {
        let size = request_size(seed, round, args.max_size);
        match allocator.allocate(size) {
            Ok(offset) => {
                held.push_back(offset);
                outcome.allocated += 1;
            }
            Err(err) if err.kind() == AllocErrorKind::OutOfMemory => outcome.out_of_memory += 1,
            Err(err) => return Err(err),
        }

        // release two of every three requests, oldest first
        if round % 3 == 0 {
            continue;
        }
        if let Some(offset) = held.pop_front() {
            allocator.free(offset)?;
            outcome.freed += 1;
        }
    }

    for offset in held {
        allocator.free(offset)?;
        outcome.freed += 1;
    }

    debug!("{outcome:?}");
    Ok(outcome)
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_size_stays_in_range() {
        for (seed, round) in [(0, 0), (3, 9_999), (usize::MAX, usize::MAX), (1 << 60, 7)] {
            let size = request_size(seed, round, 512);
            assert!((1..=512).contains(&size), "{size}");
        }
        assert_eq!(request_size(0, 0, 1), 1);
    }
}
