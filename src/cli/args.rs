//! CLI argument parsing and configuration.

use std::io;
use std::path::PathBuf;

use crate::models::Variant;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the binary was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Run(CliConfig),
    Help,
    Version,
}

/// Configuration from CLI arguments. `None` fields fall back to the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    pub variant: Option<Variant>,
    pub no_auto_approve: Option<bool>,
    pub working_dir: Option<PathBuf>,
}

/// Print usage information
pub fn print_usage() {
    eprintln!("RelayBot - persistent agent session relay");
    eprintln!();
    eprintln!("Usage: relaybot [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --claude           Drive Claude Code (default)");
    eprintln!("  --codex            Drive Codex instead of Claude Code");
    eprintln!("  --noyolo           Do not pass auto-approve flags to the agent");
    eprintln!("  --cwd <DIR>        Working directory for the agent");
    eprintln!("  -h, --help         Show this help message");
    eprintln!("  -V, --version      Show version");
    eprintln!();
    eprintln!("Defaults are read from ~/.relaybot/config.conf (WORKING_DIR, AGENT, NO_AUTO_APPROVE).");
    eprintln!("Press Ctrl+C to stop the agent and exit.");
}

/// Parse arguments (without the program name)
pub fn parse_args_from<I, S>(args: I) -> io::Result<CliAction>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    let mut config = CliConfig::default();

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-V" | "--version" => return Ok(CliAction::Version),
            "--codex" => config.variant = Some(Variant::Codex),
            "--claude" => config.variant = Some(Variant::Claude),
            "--noyolo" => config.no_auto_approve = Some(true),
            "--cwd" => {
                i += 1;
                let dir = args.get(i).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "Missing value for --cwd")
                })?;
                config.working_dir = Some(PathBuf::from(dir));
            }
            // Legacy launcher passes the subcommand through
            "start" => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Unknown argument: {}", arg),
                ));
            }
        }
        i += 1;
    }

    Ok(CliAction::Run(config))
}

/// Parse the process arguments
pub fn parse_args() -> io::Result<CliAction> {
    parse_args_from(std::env::args().skip(1))
}
