//! Entry point for the `mrty-tv` terminal.
//!
//! The flow is:
//! 1. Parse the command line and exit early for help or version output
//! 2. Load the bootstrap file, creating it with defaults on first start
//! 3. Pick the clock (real or shifted for simulation) and optional file logging
//! 4. Build the content client and the coordinate lookup
//! 5. Run the display loop on a current-thread runtime until a shutdown signal
//!
//! Only a bootstrap problem aborts startup. Once the loop runs, failures are
//! logged and retried.

use anyhow::{Context, Result};
use std::rc::Rc;

use mrty_tv::args::{self, CliAction, ParsedArgs};
use mrty_tv::config::{self, BootstrapConfig};
use mrty_tv::constants::EXIT_FAILURE;
use mrty_tv::logger::{self, Log};
use mrty_tv::remote::HttpContentClient;
use mrty_tv::runtime::{Terminal, TerminalOptions};
use mrty_tv::schedule::HttpCoordinateLookup;
use mrty_tv::signals::SignalFlags;
use mrty_tv::time_source::{OffsetTimeSource, RealTimeSource, TimeSource};
use mrty_tv::{
    log_block_start, log_debug, log_decorated, log_error_exit, log_indented, log_pipe,
    log_version, log_warning,
};

const LOG_FILE_NAME: &str = "mrty-tv.log";

/// Settings for one run of the display loop.
struct RunOptions {
    debug_enabled: bool,
    config_dir: Option<String>,
    sim_time: Option<String>,
    sim_date: Option<String>,
    log_to_file: bool,
}

fn main() -> Result<()> {
    let parsed_args = ParsedArgs::from_env();

    match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
            sim_time,
            sim_date,
            log_to_file,
        } => {
            let options = RunOptions {
                debug_enabled,
                config_dir,
                sim_time,
                sim_date,
                log_to_file,
            };
            if let Err(e) = run(options) {
                log_pipe!();
                log_error_exit!("{e:#}");
                std::process::exit(EXIT_FAILURE);
            }
            Ok(())
        }
    }
}

fn run(options: RunOptions) -> Result<()> {
    logger::set_debug_enabled(options.debug_enabled);
    config::set_config_dir(options.config_dir)?;

    let clock = select_clock(options.sim_time.as_deref(), options.sim_date.as_deref());

    // Held until the loop exits so the writer thread flushes on drop.
    let _log_guard = if options.log_to_file {
        Some(Log::start_file_logging(LOG_FILE_NAME.to_string())?)
    } else {
        None
    };

    log_version!();
    if options.debug_enabled {
        log_pipe!();
        log_debug!("Debug mode enabled");
    }

    let bootstrap = config::load()?;
    log_bootstrap(&bootstrap)?;

    let source = Rc::new(HttpContentClient::new(bootstrap.rest_url())?);
    let lookup = Rc::new(HttpCoordinateLookup::new(bootstrap.lookup_url())?);
    let signals = SignalFlags::register()?;

    let terminal = Terminal::new(
        clock,
        source,
        lookup,
        TerminalOptions::from_bootstrap(&bootstrap),
        signals,
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime.block_on(terminal.run());

    Ok(())
}

/// The real clock, or a shifted one when a valid simulation time was given.
fn select_clock(sim_time: Option<&str>, sim_date: Option<&str>) -> Rc<dyn TimeSource> {
    let Some(time) = sim_time else {
        return Rc::new(RealTimeSource);
    };

    match OffsetTimeSource::from_simulation(time, sim_date) {
        Ok(source) => {
            Log::set_simulation_offset(source.offset());
            Rc::new(source)
        }
        Err(e) => {
            log_warning!("Ignoring simulation time: {e:#}");
            Rc::new(RealTimeSource)
        }
    }
}

fn log_bootstrap(bootstrap: &BootstrapConfig) -> Result<()> {
    log_block_start!("Loaded configuration from {}", config::get_config_path()?.display());
    if !bootstrap.site.name.is_empty() {
        log_indented!("Site: {}", bootstrap.site.name);
    }
    log_indented!("Content service: {}", bootstrap.rest_url());
    log_indented!("Status file: {}", bootstrap.status_path().display());
    if bootstrap.cue_command.is_some() {
        log_decorated!("Adzan cue: external command");
    }
    Ok(())
}
