use std::panic;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::terminal::disable_raw_mode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use relaybot::cli::{self, CliAction, CliConfig};
use relaybot::pty::StdTerminal;
use relaybot::utils::format_uptime;
use relaybot::{RelayConfig, SessionController, SessionSettings, StartOptions};

fn init_logging() {
    // stderr only: stdout carries the agent's terminal output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Leave the shell usable even if a worker thread panics while raw mode is on
fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        previous(info);
    }));
}

fn build_settings(args: &CliConfig) -> Result<SessionSettings> {
    let mut settings = SessionSettings::default();
    if let Some(config) = RelayConfig::load().context("Failed to load config")? {
        config.apply(&mut settings);
    }
    if let Some(dir) = &args.working_dir {
        settings.working_dir = dir.clone();
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = match cli::parse_args() {
        Ok(CliAction::Run(args)) => args,
        Ok(CliAction::Help) => {
            cli::print_usage();
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("relaybot {}", cli::VERSION);
            return Ok(());
        }
        Err(e) => {
            cli::print_usage();
            return Err(e).context("Invalid arguments");
        }
    };

    init_logging();
    install_panic_hook();

    let settings = build_settings(&args)?;
    let controller = SessionController::current(settings, Arc::new(StdTerminal));

    let options = StartOptions {
        variant: args.variant,
        no_auto_approve: args.no_auto_approve,
    };
    let handle = controller
        .start(options)
        .context("Failed to start agent session")?;
    info!(pid = ?handle.pid, variant = %handle.variant, "agent session running");
    let started_at = controller.status().started_at;

    let Some(exit) = controller.wait_for_exit().await else {
        return Ok(());
    };
    eprintln!();
    eprintln!(
        "--- {} session ended (code {}, signal {}) ---",
        handle.variant.label(),
        exit.code.map_or_else(|| "none".to_string(), |c| c.to_string()),
        exit.signal.as_deref().unwrap_or("none")
    );
    if let Some(started) = started_at {
        let secs = u64::try_from((exit.at - started).num_seconds()).unwrap_or(0);
        eprintln!("Uptime: {}", format_uptime(secs));
    }

    Ok(())
}
