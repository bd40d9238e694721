//! Audible cue played when an adzan stage begins.
//!
//! Cues are best-effort: a failure is logged at debug level and never affects the
//! state machine.

use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};

use crate::schedule::EventKey;

pub trait AudibleCue {
    fn play(&self, event: EventKey) -> Result<()>;
}

/// Terminal bell on stdout.
pub struct BellCue;

impl AudibleCue for BellCue {
    fn play(&self, _event: EventKey) -> Result<()> {
        let mut stdout = std::io::stdout();
        stdout.write_all(b"\x07").context("Failed to ring terminal bell")?;
        stdout.flush().context("Failed to flush terminal bell")
    }
}

/// Runs a shell command without waiting for it.
///
/// The event key is exported as `MRTY_TV_EVENT` so one script can vary the sound.
pub struct CommandCue {
    command: String,
}

impl CommandCue {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl AudibleCue for CommandCue {
    fn play(&self, event: EventKey) -> Result<()> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("MRTY_TV_EVENT", event.key())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn cue command '{}'", self.command))?;

        // Reap the child off the event loop.
        std::thread::spawn(move || child.wait());
        Ok(())
    }
}

/// Pick the configured command, or the bell.
pub fn from_command(command: Option<&str>) -> Box<dyn AudibleCue> {
    match command.map(str::trim).filter(|c| !c.is_empty()) {
        Some(command) => Box::new(CommandCue::new(command)),
        None => Box::new(BellCue),
    }
}

/// Play `cue`, swallowing any failure.
pub fn play_best_effort(cue: &dyn AudibleCue, event: EventKey) {
    if let Err(e) = cue.play(event) {
        log_debug!("Audible cue unavailable: {e:#}");
    }
}
