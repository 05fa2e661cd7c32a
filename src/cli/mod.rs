//! CLI argument parsing for the relaybot binary.

mod args;

pub use args::{CliAction, CliConfig, VERSION, parse_args, parse_args_from, print_usage};
