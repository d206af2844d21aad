//! `serve`: run the survey and admin HTTP server until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use secrecy::ExposeSecret;

use crate::coach::build_coach;
use crate::config::Config;
use crate::db;
use crate::responses::ResponseService;
use crate::schema::crm_pain_points;
use crate::web::{AdminAuth, GatewayState, start_server};

/// Run the server command.
pub async fn run_serve_command(config: &Config) -> anyhow::Result<()> {
    let schema = crm_pain_points();
    schema.validate()?;

    let database = db::connect(&config.database).await?;
    let mirror = database.is_durable().then(|| database.clone());
    let responses = Arc::new(ResponseService::new(mirror));
    if let Err(e) = responses.hydrate().await {
        tracing::warn!(error = %e, "Could not load stored responses, starting empty");
    }

    let coach = Arc::new(build_coach(&config.coach)?);
    if config.gateway.admin_password.expose_secret() == "change-me" {
        tracing::warn!("ADMIN_PASSWORD is not set, using the default password");
    }

    let state = Arc::new(GatewayState::new(
        Arc::new(schema),
        responses,
        coach,
        database,
        AdminAuth::from_config(&config.gateway),
    ));

    let bind = config.gateway.bind_addr();
    let addr = tokio::net::lookup_host(&bind)
        .await
        .with_context(|| format!("could not resolve {bind}"))?
        .next()
        .with_context(|| format!("no address for {bind}"))?;
    let bound = start_server(addr, state.clone()).await?;
    println!("Survey server listening on http://{bound}");

    tokio::signal::ctrl_c().await?;
    state.shutdown().await;
    Ok(())
}
