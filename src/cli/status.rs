//! `status`: configuration and storage health at a glance.

use crate::bootstrap::default_draft_path;
use crate::coach::build_coach;
use crate::config::{Config, DatabaseBackend};
use crate::db;

/// Run the status command, printing configuration and storage health.
pub async fn run_status_command(config: &Config) -> anyhow::Result<()> {
    println!("CRM Survey Status");
    println!("=================\n");

    println!(
        "  Version:     {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    print!("  Database:    ");
    match config.database.backend {
        DatabaseBackend::Memory => println!("memory (responses are not persisted)"),
        DatabaseBackend::LibSql => {
            let path = &config.database.libsql_path;
            if path.exists() {
                println!("libSQL ({})", path.display());
            } else {
                println!("libSQL (created on first run: {})", path.display());
            }
        }
        DatabaseBackend::Postgres => println!("PostgreSQL"),
    }

    match db::connect(&config.database).await {
        Ok(database) => {
            match database.list_responses().await {
                Ok(records) => println!("  Responses:   {}", records.len()),
                Err(e) => println!("  Responses:   error ({e})"),
            }
            match database.session_count().await {
                Ok(count) => println!("  Sessions:    {count}"),
                Err(e) => println!("  Sessions:    error ({e})"),
            }
        }
        Err(e) => println!("  Connection:  error ({e})"),
    }

    let coach = build_coach(&config.coach)?;
    let providers = coach.provider_names();
    if providers.is_empty() {
        println!("  Coaching:    heuristic only (no provider keys set)");
    } else {
        println!(
            "  Coaching:    {} (timeout {}s each)",
            providers.join(" -> "),
            config.coach.provider_timeout.as_secs()
        );
    }

    println!("  Server:      http://{}", config.gateway.bind_addr());

    let draft = default_draft_path();
    if draft.exists() {
        println!("  Draft:       in progress ({})", draft.display());
    } else {
        println!("  Draft:       none");
    }

    Ok(())
}
