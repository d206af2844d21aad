use clap::Parser;

use crm_survey::cli::{
    Cli, Command, run_schema_command, run_serve_command, run_status_command, run_take_command,
};
use crm_survey::config::Config;
use crm_survey::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Commands that need no configuration.
    match &cli.command {
        Some(Command::Schema) => return run_schema_command(),
        Some(Command::Completion(completion)) => return completion.run(),
        _ => {}
    }

    init_tracing(cli.log_format, cli.is_interactive());
    let config = Config::from_env()?;

    match cli.command {
        None | Some(Command::Serve) => run_serve_command(&config).await,
        Some(Command::Take(args)) => run_take_command(args, &config).await,
        Some(Command::Status) => run_status_command(&config).await,
        Some(Command::Schema) | Some(Command::Completion(_)) => Ok(()),
    }
}
