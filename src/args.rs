//! Command-line argument parsing.
//!
//! The terminal runs unattended, so the command line only selects where the
//! bootstrap file lives and how the process logs. Unknown options print the help
//! text instead of starting.

/// What the process should do.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Start the display loop.
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
        /// Wall-clock time to simulate (`HH:MM`).
        sim_time: Option<String>,
        /// Date to simulate (`YYYY-MM-DD`), only meaningful with `sim_time`.
        sim_date: Option<String>,
        log_to_file: bool,
    },
    ShowHelp,
    ShowVersion,
    ShowHelpDueToError,
}

pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse `args`, whose first item is the program name.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut log_to_file = false;
        let mut unknown_arg_found = false;
        let mut config_dir: Option<String> = None;
        let mut sim_time: Option<String> = None;
        let mut sim_date: Option<String> = None;

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut i = 0;
        while i < args_vec.len() {
            match args_vec[i].as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--log" | "-l" => log_to_file = true,
                "--config" | "-c" => match value_after(&args_vec, i) {
                    Some(dir) => {
                        config_dir = Some(dir);
                        i += 1;
                    }
                    None => {
                        log_warning!("Missing directory for --config. Usage: --config <directory>");
                        unknown_arg_found = true;
                    }
                },
                "--sim-time" | "-t" => match value_after(&args_vec, i) {
                    Some(time) => {
                        sim_time = Some(time);
                        i += 1;
                    }
                    None => {
                        log_warning!("Missing value for --sim-time. Usage: --sim-time HH:MM");
                        unknown_arg_found = true;
                    }
                },
                "--sim-date" | "-D" => match value_after(&args_vec, i) {
                    Some(date) => {
                        sim_date = Some(date);
                        i += 1;
                    }
                    None => {
                        log_warning!("Missing value for --sim-date. Usage: --sim-date YYYY-MM-DD");
                        unknown_arg_found = true;
                    }
                },
                other => {
                    log_warning!("Unknown argument: {other}");
                    unknown_arg_found = true;
                }
            }
            i += 1;
        }

        if sim_date.is_some() && sim_time.is_none() {
            log_warning!("--sim-date has no effect without --sim-time");
        }

        let action = if display_version {
            CliAction::ShowVersion
        } else if display_help {
            CliAction::ShowHelp
        } else if unknown_arg_found {
            CliAction::ShowHelpDueToError
        } else {
            CliAction::Run {
                debug_enabled,
                config_dir,
                sim_time,
                sim_date,
                log_to_file,
            }
        };

        ParsedArgs { action }
    }

    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

fn value_after(args: &[String], index: usize) -> Option<String> {
    args.get(index + 1)
        .filter(|value| !value.starts_with('-'))
        .cloned()
}

pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("mrty-tv [OPTIONS]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>       Use custom configuration directory");
    log_indented!("-d, --debug              Enable detailed debug output");
    log_indented!("-h, --help               Print help information");
    log_indented!("-l, --log                Write the log to mrty-tv.log instead of the console");
    log_indented!("-t, --sim-time <HH:MM>   Run with the clock shifted to this time");
    log_indented!("-D, --sim-date <date>    Date for --sim-time (YYYY-MM-DD)");
    log_indented!("-V, --version            Print version information");
    log_block_start!("Signals:");
    log_indented!("SIGUSR1                  Current video finished playing");
    log_indented!("SIGUSR2                  Check the content service now");
    log_end!();
}
