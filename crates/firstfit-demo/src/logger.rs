use std::{
    io::{self, Write as _},
    sync::OnceLock,
    thread,
    time::Instant,
};

use log::{LevelFilter, Log, Metadata, Record};

use crate::paint::{self, Color, Painted};

static LOGGER: Logger = Logger;
static START: OnceLock<Instant> = OnceLock::new();

/// Installs the terminal logger with `level` as the maximum level.
///
/// Does nothing if a logger is already installed.
pub fn init(level: LevelFilter) {
    START.get_or_init(Instant::now);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let elapsed = START.get_or_init(Instant::now).elapsed();
        let thread = thread::current();
        let name = thread.name().unwrap_or("?");
        let (color, tag) = paint::level_style(record.level());
        let prefix = format!("{:10.6} [{name}]", elapsed.as_secs_f64());
        eprintln!(
            "{} {} {}",
            Painted::new(Color::DarkGray, prefix),
            Painted::new(color, tag),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}
