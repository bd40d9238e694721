//! # mrty-tv
//!
//! Library behind the `mrty-tv` signage terminal. The binary only parses the
//! command line and starts [`runtime::Terminal`]; everything else lives here so it
//! can be tested without a network or a real clock.
//!
//! ## Layout
//!
//! - **Time**: `time_source` (real, shifted and manual clocks), `schedule` (daily
//!   prayer times from coordinates), `engine` (the prayer-time state machine)
//! - **Content**: `remote` (content service client), `sync` (fingerprint polling),
//!   `rotation` (playlist timers), `feed` (running text)
//! - **Output**: `display` (status file snapshots), `cue` (adzan sound)
//! - **Infrastructure**: `config`, `args`, `signals`, `logger`, `runtime`

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod config;
pub mod constants;
pub mod cue;
pub mod display;
pub mod engine;
pub mod feed;
pub mod remote;
pub mod rotation;
pub mod runtime;
pub mod schedule;
pub mod signals;
pub mod sync;
pub mod time_source;
