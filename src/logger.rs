use std::fs::File;
use std::io::Write;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use parking_lot::Mutex;

/// Environment variable read for the log level before `RUST_LOG`
pub const LOG_ENV: &str = "CMDTREE_LOG";

struct CmdtreeLogger {
    file: Option<Mutex<File>>,
    filter: LevelFilter,
    start: Instant,
}

impl Log for CmdtreeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.start.elapsed().as_secs_f64();
        let line = format_record(elapsed, record);
        let _ = writeln!(std::io::stderr().lock(), "{line}");

        if let Some(ref file) = self.file {
            let _ = writeln!(file.lock(), "{line}");
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
        if let Some(ref file) = self.file {
            let _ = file.lock().flush();
        }
    }
}

fn format_record(elapsed: f64, record: &Record) -> String {
    format!(
        "[{elapsed:.3}s] [{}] {} - {}",
        record.level(),
        record.target(),
        record.args()
    )
}

/// Level filter from a `CMDTREE_LOG`/`RUST_LOG` style value. Defaults to `Warn`.
#[must_use]
pub fn parse_filter(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(LevelFilter::Warn)
}

/// Install the global logger, writing to stderr and, if given, to `log_file`.
///
/// # Errors
///
/// Returns `SetLoggerError` if a logger is already installed.
pub fn init(log_file: Option<File>) -> Result<(), SetLoggerError> {
    let value = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok();
    let filter = parse_filter(value.as_deref());

    let logger = CmdtreeLogger {
        file: log_file.map(Mutex::new),
        filter,
        start: Instant::now(),
    };

    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(filter);
    Ok(())
}
