//! Command-line surface.
//!
//! Any problem with the arguments (unknown flag, missing value, a UDID
//! that is not 40 characters, a port below 1) prints the usage text and
//! exits with status 0, before anything is opened.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};

use screenrelay_core::Udid;

pub const DEFAULT_CONFIG_PATH: &str = "screenrelay.toml";

#[derive(Parser, Debug)]
#[command(
    name = "screenrelay",
    disable_help_flag = true,
    disable_version_flag = true,
    args_override_self = true
)]
struct Cli {
    /// Enable communication debugging in the device tools.
    #[arg(short, long)]
    debug: bool,

    /// Target device, by its 40-character UDID.
    #[arg(short, long, value_parser = parse_udid)]
    udid: Option<Udid>,

    /// Local TCP port to listen on.
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    help: bool,
}

fn parse_udid(s: &str) -> Result<Udid, String> {
    Udid::parse(s).map_err(|e| e.to_string())
}

/// Validated arguments for a relay run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    pub udid: Udid,
    pub port: u16,
    pub debug: bool,
    pub config: PathBuf,
}

/// What the process should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(RunArgs),
    GenConfig,
    /// Print usage and exit 0.
    Usage,
}

/// Interpret `args` (including the program name).
pub fn parse<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(_) => return Invocation::Usage,
    };

    if cli.help {
        return Invocation::Usage;
    }
    if cli.gen_config {
        return Invocation::GenConfig;
    }

    match (cli.udid, cli.port) {
        (Some(udid), Some(port)) => Invocation::Run(RunArgs {
            udid,
            port,
            debug: cli.debug,
            config: cli.config,
        }),
        _ => Invocation::Usage,
    }
}

/// Final path component of `argv[0]`, lossily decoded.
pub fn program_name(argv0: &OsStr) -> String {
    Path::new(argv0)
        .file_name()
        .unwrap_or(argv0)
        .to_string_lossy()
        .into_owned()
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [OPTIONS]\n\
         Gets screenshot stream from a device.\n\
         NOTE: A mounted developer disk image is required on the device, otherwise\n\
         the screenshotr service is not available.\n\
         \n\
         \x20 -d, --debug\t\tenable communication debugging\n\
         \x20 -u, --udid UDID\ttarget specific device by its 40-digit device UDID\n\
         \x20 -p, --port PORT\tport on local machine\n\
         \x20 -c, --config PATH\tconfiguration file (default: {DEFAULT_CONFIG_PATH})\n\
         \x20     --gen-config\tprint the default configuration and exit\n\
         \x20 -h, --help\t\tprints usage information\n\
         \n"
    )
}

// ── Tests ────────────────────────────────────────────────────────
