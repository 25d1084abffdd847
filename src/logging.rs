use log::{debug, log, trace, warn, LevelFilter};
use std::time::{Duration, Instant};

use crate::error::PlayerError;

/// Environment variable holding the log level.
pub const LOG_LEVEL_ENV: &str = "FILTERPLAY_LOG_LEVEL";

/// Map a level name to a filter, defaulting to info.
pub fn parse_level(name: &str) -> LevelFilter {
    match name.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Initialize the global logger.
///
/// `verbose` forces debug output regardless of the environment.
pub fn init(verbose: bool) -> Result<(), log::SetLoggerError> {
    let env_level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
    let level = if verbose {
        LevelFilter::Debug.max(parse_level(&env_level))
    } else {
        parse_level(&env_level)
    };

    let mut builder = env_logger::Builder::new();
    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder.filter_level(level);
    builder.try_init()?;

    debug!(target: "filterplay", "logging initialized at {}", level);
    Ok(())
}

/// Log an error at the level its severity calls for.
pub fn log_error(err: &PlayerError) {
    let severity = err.severity();
    log!(
        target: "filterplay",
        severity.log_level(),
        "[{}] {}",
        severity.as_str(),
        err
    );
}

/// Times one pipeline stage and reports slow ones.
pub struct OperationTimer {
    start_time: Instant,
    operation_name: String,
}

impl OperationTimer {
    pub fn new(operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        trace!(target: "timing", "starting '{}'", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let duration = self.elapsed();
        if duration > threshold {
            warn!(
                target: "timing",
                "'{}' took {}ms (threshold: {}ms)",
                self.operation_name,
                duration.as_millis(),
                threshold.as_millis()
            );
        } else {
            debug!(
                target: "timing",
                "'{}' completed in {}ms",
                self.operation_name,
                duration.as_millis()
            );
        }
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("TRACE"), LevelFilter::Trace);
        assert_eq!(parse_level("warning"), LevelFilter::Warn);
        assert_eq!(parse_level(" error "), LevelFilter::Error);
        assert_eq!(parse_level("chatty"), LevelFilter::Info);
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("open");
        thread::sleep(Duration::from_millis(5));
        let elapsed = timer.finish_with_threshold(Duration::from_secs(10));
        assert!(elapsed >= Duration::from_millis(5));
    }
}
