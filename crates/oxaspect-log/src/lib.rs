//! Leveled, structured logging for the `oxaspect` workspace.
//!
//! Every message carries the module path it was emitted from and may carry a
//! list of `key = value` fields after a `;`. Output goes to stderr so that it
//! never interleaves with program output captured on stdout.
//!
//! # Configuration
//!
//! The minimum level is read from the `OXASPECT_LOG` environment variable the
//! first time the logger is touched (`off`, `error`, `warn`, `info`, `debug`
//! or `trace`). Without it the logger defaults to [`Level::Warn`]. The level
//! can be changed at any time with [`set_level`].
//!
//! # Example
//!
//! ```
//! use oxaspect_log::{debug, warn, Level};
//!
//! oxaspect_log::set_level(Level::Debug);
//!
//! let selector = "buy:price:count:";
//! debug!("trampoline installed"; class = "User", selector = selector);
//! warn!("selector {} has no implementation", selector);
//! ```

use std::fmt::{self, Arguments, Display};
use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable holding the initial log level.
pub const ENV_VAR: &str = "OXASPECT_LOG";

/// Log levels, ordered from silent to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Nothing is logged.
    Off = 0,
    /// Failures the engine could not recover from.
    Error = 1,
    /// Suspicious but tolerated situations (e.g. hooking a stub selector).
    Warn = 2,
    /// Coarse lifecycle events.
    Info = 3,
    /// Installation, restoration and isolation bookkeeping.
    Debug = 4,
    /// Per-call chain execution.
    Trace = 5,
}

impl Level {
    const fn color_code(self) -> &'static str {
        match self {
            Level::Off => "",
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    /// Returns the upper-case name of this level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Off => "OFF",
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Off,
            1 => Level::Error,
            2 => Level::Warn,
            3 => Level::Info,
            4 => Level::Debug,
            _ => Level::Trace,
        }
    }

    /// Reads the level from [`ENV_VAR`], if set and valid.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var(ENV_VAR).ok()?.parse().ok()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a [`Level`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid log level: {}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Level::Off),
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            "trace" => Ok(Level::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// The global logger.
///
/// Holds only the current threshold; the threshold is an atomic so that
/// checking whether a level is enabled never takes a lock.
pub struct Logger {
    level: AtomicU8,
}

impl Logger {
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
        }
    }

    /// Sets the most verbose level that will still be written.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    /// Returns the current threshold.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Checks if a message at `level` would be written.
    pub fn enabled(&self, level: Level) -> bool {
        level != Level::Off && level as u8 <= self.level.load(Ordering::Relaxed)
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Returns the global logger, initializing it from [`ENV_VAR`] on first use.
pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(Level::from_env().unwrap_or(Level::Warn)))
}

/// Sets the threshold of the global logger.
pub fn set_level(level: Level) {
    get_logger().set_level(level);
}

/// Sets the threshold of the global logger from a level name.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if `s` is not a level name.
pub fn set_level_from_str(s: &str) -> Result<(), ParseLevelError> {
    set_level(s.parse()?);
    Ok(())
}

/// Renders one log line (without color or trailing newline).
#[doc(hidden)]
pub fn __format_line(
    level: Level,
    target: &str,
    args: Arguments<'_>,
    fields: &[(&str, &dyn Display)],
) -> String {
    let mut line = format!("[{level}] {target}: {args}");
    for (key, value) in fields {
        line.push(' ');
        line.push_str(key);
        line.push('=');
        line.push_str(&value.to_string());
    }
    line
}

/// Writes one log line. Called by the macros after the level check.
#[doc(hidden)]
pub fn __log_with_target(
    level: Level,
    target: &str,
    args: Arguments<'_>,
    fields: &[(&str, &dyn Display)],
) {
    const RESET: &str = "\x1b[0m";

    if !get_logger().enabled(level) {
        return;
    }

    let line = __format_line(level, target, args, fields);
    let color = level.color_code();
    let mut stderr = std::io::stderr().lock();
    // A closed stderr is not worth failing the caller over.
    let _ = writeln!(stderr, "{color}{line}{RESET}");
}

/// Logs a message at an explicit level.
///
/// Structured fields follow the format arguments after a `;`.
///
/// ```
/// use oxaspect_log::{log, Level};
///
/// log!(level: Level::Info, "hooked {} selectors", 3; class = "User");
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $fmt:literal $(, $arg:expr)* $(; $($key:ident = $value:expr),+ )?) => {{
        let level = $level;
        if $crate::get_logger().enabled(level) {
            $crate::__log_with_target(
                level,
                module_path!(),
                format_args!($fmt $(, $arg)*),
                &[$($((stringify!($key), &$value as &dyn ::core::fmt::Display)),+)?],
            );
        }
    }};
}

/// Logs a message at the Error level.
#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => {
        $crate::log!(level: $crate::Level::Error, $($arg)+)
    };
}

/// Logs a message at the Warn level.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)+)
    };
}

/// Logs a message at the Info level.
#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {
        $crate::log!(level: $crate::Level::Info, $($arg)+)
    };
}

/// Logs a message at the Debug level.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)+)
    };
}

/// Logs a message at the Trace level.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)+)
    };
}
