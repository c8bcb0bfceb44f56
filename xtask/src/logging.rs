//! stderr logger for the task runner.

use std::{env, io::Write};

use log::{warn, LevelFilter, Metadata, Record};

static LOGGER: TaskLog = TaskLog;

/// Installs the logger at the level named by `XTASK_LOG`, `info` by default.
/// An unknown level falls back to `info` with a warning.
pub fn init() -> anyhow::Result<()> {
    let (level, bad) = level_or_info(env::var("XTASK_LOG").ok().as_deref());
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(level))
        .map_err(|e| anyhow::format_err!("{}", e))?;
    if let Some(e) = bad {
        warn!("{}, using info", e);
    }
    Ok(())
}

fn level_or_info(value: Option<&str>) -> (LevelFilter, Option<anyhow::Error>) {
    match value.map(parse_level) {
        Some(Ok(level)) => (level, None),
        Some(Err(e)) => (LevelFilter::Info, Some(e)),
        None => (LevelFilter::Info, None),
    }
}

fn parse_level(s: &str) -> anyhow::Result<LevelFilter> {
    s.parse()
        .map_err(|_| anyhow::format_err!("XTASK_LOG: unknown log level {:?}", s))
}

struct TaskLog;

impl log::Log for TaskLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(std::io::stderr().lock(), "[{:>5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
