use std::sync::{Arc, OnceLock};

/// Receives the crate's log records.
///
/// Hosts implement this to route protocol diagnostics into their own logging. Codes, secrets
/// and signatures are never part of a message.
///
/// # Examples
///
/// ```rust
/// use actioncodes_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
///
/// ## Swift (with the `ffi` feature)
///
/// ```swift
/// final class ActionCodesLogBridge: ActionCodes.Logger {
///     func log(level: ActionCodes.LogLevel, message: String) {
///         os_log("%{public}@", message)
///     }
/// }
///
/// ActionCodes.setLogger(logger: ActionCodesLogBridge()) // once, at startup
/// ```
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait Logger: Sync + Send {
    /// Logs `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LogLevel {
    /// Very detailed tracing.
    Trace,
    /// Protocol decisions: windows computed, checks that failed.
    Debug,
    /// Informational.
    Info,
    /// Recoverable faults, e.g. a misbehaving adapter.
    Warn,
    /// Errors.
    Error,
}

/// Bridges the `log` facade to the host's [`Logger`].
struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let from_crate = record
            .module_path()
            .is_some_and(|module_path| module_path.starts_with("actioncodes"));
        let verbose = matches!(record.level(), log::Level::Debug | log::Level::Trace);

        // Dependencies' debug output is noise for hosts.
        if verbose && !from_crate {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), record.args().to_string());
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Installs the host logger.
///
/// Call once at startup. Later calls keep the first logger and report the conflict on stderr.
#[cfg_attr(feature = "ffi", uniffi::export)]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
        return;
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
