//! Process signals.
//!
//! Handlers only raise atomic flags; the event loop polls and clears them on its
//! next tick.
//!
//! - `SIGINT`, `SIGTERM`: shut down
//! - `SIGUSR1`: the renderer finished playing the current video
//! - `SIGUSR2`: poll the content fingerprint now

use anyhow::{Context, Result};
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGUSR1, SIGUSR2};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct SignalFlags {
    shutdown: Arc<AtomicBool>,
    playback_complete: Arc<AtomicBool>,
    sync_now: Arc<AtomicBool>,
}

impl SignalFlags {
    /// Flags with no handlers attached. Tests raise them directly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the process signal handlers.
    pub fn register() -> Result<Self> {
        let flags = Self::new();

        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&flags.shutdown))
                .with_context(|| format!("Failed to register handler for signal {signal}"))?;
        }
        signal_hook::flag::register(SIGUSR1, Arc::clone(&flags.playback_complete))
            .context("Failed to register SIGUSR1 handler")?;
        signal_hook::flag::register(SIGUSR2, Arc::clone(&flags.sync_now))
            .context("Failed to register SIGUSR2 handler")?;

        Ok(flags)
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn raise_playback_complete(&self) {
        self.playback_complete.store(true, Ordering::SeqCst);
    }

    pub fn raise_sync_now(&self) {
        self.sync_now.store(true, Ordering::SeqCst);
    }

    /// Consume a pending playback-complete signal.
    pub fn take_playback_complete(&self) -> bool {
        self.playback_complete.swap(false, Ordering::SeqCst)
    }

    /// Consume a pending sync request.
    pub fn take_sync_now(&self) -> bool {
        self.sync_now.swap(false, Ordering::SeqCst)
    }
}
