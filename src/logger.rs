//! Structured console logging with box-drawing output.
//!
//! The terminal runs unattended, so the console log is the operator's only view into
//! what the engine, the rotation and the poller are doing. Every line goes through
//! [`write_output`], which either prints it or hands it to the file writer thread
//! started by [`Log::start_file_logging`].
//!
//! ## Conventions
//!
//! - **`log_version!`** prints the startup header `┏ mrty-tv vX.Y.Z ━━╸`.
//! - **`log_block_start!`** opens a new conceptual block (`┃` spacer, then `┣ message`).
//!   Use it for state transitions, sync cycles and startup phases.
//! - **`log_decorated!`** continues a block with `┣ message`.
//! - **`log_indented!`** prints detail lines (`┃   message`) under a block.
//! - **`log_pipe!`** inserts an empty `┃` spacer, typically before a leveled message
//!   that starts its own block.
//! - **`log_info!`, `log_warning!`, `log_error!`, `log_debug!`** carry
//!   a colored `[LEVEL]` tag after the pipe.
//! - **`log_end!`** prints the final `╹` marker at shutdown.
//!
//! While the clock is offset for simulation every line is prefixed with the simulated
//! wall-clock time, so a log excerpt can be matched against the schedule.

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

// Offset applied to the real clock while simulating, set once at startup.
static SIMULATION_OFFSET: OnceLock<chrono::Duration> = OnceLock::new();

// Channel for routing output to file when --log is active
static LOG_CHANNEL: OnceLock<Sender<LogMessage>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Logging control surface used by the macros.
pub struct Log;

impl Log {
    /// Enable or disable logging at runtime.
    ///
    /// Tests switch logging off so transition announcements do not interleave with
    /// the test harness output.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Record the simulation offset so every line carries the simulated time.
    ///
    /// Only the first call has an effect.
    pub fn set_simulation_offset(offset: chrono::Duration) {
        let _ = SIMULATION_OFFSET.set(offset);
    }

    /// Start mirroring log output into `file_path`.
    ///
    /// Console output stops while the guard is alive; lines are written with ANSI
    /// color codes removed.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(tx.clone())
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::spawn(move || {
            let mut file = std::fs::File::create(&file_path)?;

            loop {
                match rx.recv() {
                    Ok(LogMessage::Formatted(text)) => file.write_all(text.as_bytes())?,
                    Ok(LogMessage::Shutdown) | Err(_) => {
                        file.flush()?;
                        break;
                    }
                }
            }

            Ok::<(), anyhow::Error>(())
        });

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    /// Timestamp prefix shown while simulating, empty otherwise.
    pub fn get_timestamp_prefix() -> String {
        match SIMULATION_OFFSET.get() {
            Some(offset) => {
                let simulated = chrono::Local::now() + *offset;
                format!("[{}] ", simulated.format("%H:%M:%S"))
            }
            None => String::new(),
        }
    }
}

/// Flushes and joins the file writer when dropped.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Route one formatted line to the console or the file writer.
pub fn write_output(text: &str) {
    if let Some(tx) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

// # Logging Macros

/// Shared expansion for every line-oriented macro below.
///
/// `$template` receives the timestamp prefix and the rendered message.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_line {
    ($template:literal, $message:expr) => {{
        use $crate::logger::Log;
        if Log::is_enabled() {
            let prefix = Log::get_timestamp_prefix();
            let message = $message;
            $crate::logger::write_output(&format!($template, prefix = prefix, message = message));
        }
    }};
}

/// Log a message that continues the current block.
#[macro_export]
macro_rules! log_decorated {
    ($fmt:literal $($arg:tt)*) => {
        $crate::__log_line!("{prefix}┣ {message}\n", format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::__log_line!("{prefix}┣ {message}\n", $expr)
    };
}

/// Log a detail line nested under the current block.
#[macro_export]
macro_rules! log_indented {
    ($fmt:literal $($arg:tt)*) => {
        $crate::__log_line!("{prefix}┃   {message}\n", format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::__log_line!("{prefix}┃   {message}\n", $expr)
    };
}

/// Log an empty spacer line.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::__log_line!("{prefix}┃{message}\n", "")
    };
}

/// Log the first line of a new block.
#[macro_export]
macro_rules! log_block_start {
    ($fmt:literal $($arg:tt)*) => {
        $crate::__log_line!("{prefix}┃\n{prefix}┣ {message}\n", format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::__log_line!("{prefix}┃\n{prefix}┣ {message}\n", $expr)
    };
}

/// Log the application header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::__log_line!(
            "{prefix}┏ mrty-tv v{message} ━━╸\n",
            env!("CARGO_PKG_VERSION")
        )
    };
}

/// Log the termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::__log_line!("{prefix}╹{message}\n", "")
    };
}

#[macro_export]
macro_rules! log_warning {
    ($fmt:literal $($arg:tt)*) => {
        $crate::__log_line!("{prefix}┣[\x1b[33mWARNING\x1b[0m] {message}\n", format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::__log_line!("{prefix}┣[\x1b[33mWARNING\x1b[0m] {message}\n", $expr)
    };
}

#[macro_export]
macro_rules! log_error {
    ($fmt:literal $($arg:tt)*) => {
        $crate::__log_line!("{prefix}┣[\x1b[31mERROR\x1b[0m] {message}\n", format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::__log_line!("{prefix}┣[\x1b[31mERROR\x1b[0m] {message}\n", $expr)
    };
}

/// Log an error that ends the current flow, closing the block with `┗`.
#[macro_export]
macro_rules! log_error_exit {
    ($fmt:literal $($arg:tt)*) => {
        $crate::__log_line!("{prefix}┃\n{prefix}┗[\x1b[31mERROR\x1b[0m] {message}\n", format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::__log_line!("{prefix}┃\n{prefix}┗[\x1b[31mERROR\x1b[0m] {message}\n", $expr)
    };
}

#[macro_export]
macro_rules! log_info {
    ($fmt:literal $($arg:tt)*) => {
        $crate::__log_line!("{prefix}┣[\x1b[32mINFO\x1b[0m] {message}\n", format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::__log_line!("{prefix}┣[\x1b[32mINFO\x1b[0m] {message}\n", $expr)
    };
}

/// Log a debug message. Suppressed unless debug output was requested.
#[macro_export]
macro_rules! log_debug {
    ($fmt:literal $($arg:tt)*) => {
        if $crate::logger::debug_enabled() {
            $crate::__log_line!("{prefix}┣[\x1b[32mDEBUG\x1b[0m] {message}\n", format!($fmt $($arg)*))
        }
    };
    ($expr:expr) => {
        if $crate::logger::debug_enabled() {
            $crate::__log_line!("{prefix}┣[\x1b[32mDEBUG\x1b[0m] {message}\n", $expr)
        }
    };
}

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable `log_debug!` output (the `--debug` flag).
pub fn set_debug_enabled(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
}

pub fn debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_codes_removes_color_sequences() {
        let colored = "┣[\x1b[33mWARNING\x1b[0m] feed unavailable";
        assert_eq!(strip_ansi_codes(colored), "┣[WARNING] feed unavailable");
    }

    #[test]
    fn test_strip_ansi_codes_keeps_lone_escape() {
        assert_eq!(strip_ansi_codes("a\x1bb"), "a\x1bb");
    }
}
