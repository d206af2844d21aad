//! Command-line interface.
//!
//! Subcommands:
//! - `serve`: run the HTTP server (default when no subcommand is given)
//! - `take`: answer the survey in the terminal
//! - `schema`: print the survey schema as JSON
//! - `status`: show configuration and storage health
//! - `completion`: generate shell completion scripts

mod completion;
mod serve;
mod status;
mod take;

pub use completion::Completion;
pub use serve::run_serve_command;
pub use status::run_status_command;
pub use take::{TakeArgs, run_take_command};

use clap::{Parser, Subcommand};

use crate::logging::LogFormat;
use crate::schema::crm_pain_points;

#[derive(Parser, Debug)]
#[command(name = "crm-survey")]
#[command(about = "Collect and review CRM pain-point survey responses")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Log output format (pretty or json)
    #[arg(long, global = true, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the survey and admin HTTP server
    Serve,

    /// Answer the survey in the terminal
    Take(TakeArgs),

    /// Print the survey schema as JSON
    Schema,

    /// Show configuration and storage health
    Status,

    /// Generate shell completion scripts
    Completion(Completion),
}

impl Cli {
    /// Whether log output should stay out of the way of interactive prompts.
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, Some(Command::Take(_)))
    }
}

/// Print the built-in schema.
pub fn run_schema_command() -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&crm_pain_points())?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["crm-survey"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.is_interactive());
    }

    #[test]
    fn take_flags_parse() {
        let cli = Cli::try_parse_from([
            "crm-survey",
            "take",
            "--server",
            "http://127.0.0.1:3000",
            "--fresh",
        ])
        .unwrap();
        match &cli.command {
            Some(Command::Take(args)) => {
                assert_eq!(args.server.as_deref(), Some("http://127.0.0.1:3000"));
                assert!(args.fresh);
            }
            other => panic!("expected take, got {other:?}"),
        }
        assert!(cli.is_interactive());
    }

    #[test]
    fn log_format_flag_parses() {
        let cli = Cli::try_parse_from(["crm-survey", "--log-format", "json", "schema"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
