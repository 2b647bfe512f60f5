//! Command line driver for the first-fit allocator and the file store built
//! on top of it.

use std::process;

use argh::FromArgs;
use firstfit::{AllocError, ArenaConfig, ArenaStats, ConfigError};
use log::{Level, LevelFilter};
use memfs::FsError;
use snafu_utils::{GenericError, Report};

use self::paint::Painted;

mod logger;
mod paint;
mod stress;
mod tour;

/// Exercise a first-fit arena allocator.
#[derive(Debug, FromArgs)]
struct Args {
    /// arena capacity in bytes
    #[argh(option, default = "ArenaConfig::DEFAULT_CAPACITY")]
    capacity: usize,

    /// maximum log level: off, error, warn, info, debug or trace
    #[argh(option, default = "LevelFilter::Info")]
    log_level: LevelFilter,

    #[argh(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Tour(tour::TourArgs),
    Stress(stress::StressArgs),
}

fn main() {
    let args: Args = argh::from_env();
    logger::init(args.log_level);

    if let Err(err) = run(&args) {
        let report = Report::new(err)
            .locate::<ConfigError>()
            .locate::<AllocError>()
            .locate::<FsError>();
        let (color, _) = paint::level_style(Level::Error);
        eprint!("{}", Painted::new(color, report));
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), GenericError> {
    let config = ArenaConfig::new(args.capacity);
    match &args.command {
        None | Some(Command::Tour(_)) => tour::run(&config),
        Some(Command::Stress(stress_args)) => stress::run(&config, stress_args),
    }
}

fn print_stats(stats: &ArenaStats) {
    println!("arena:");
    println!("  capacity        {:>10} bytes", stats.capacity);
    println!("  used            {:>10} bytes", stats.used_bytes);
    println!("  free            {:>10} bytes", stats.free_bytes);
    println!("  largest free    {:>10} bytes", stats.largest_free);
    println!(
        "  blocks          {:>10} ({} free)",
        stats.block_count, stats.free_block_count
    );
}
