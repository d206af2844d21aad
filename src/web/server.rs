//! Axum router and server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tokio::sync::oneshot;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::coach::CoachingFacade;
use crate::db::Database;
use crate::error::GatewayError;
use crate::responses::ResponseService;
use crate::schema::SurveySchema;
use crate::web::auth::{AdminAuth, admin_middleware};
use crate::web::handlers::{admin, ai, survey, telemetry};
use crate::web::types::HealthResponse;

/// Shared state for all handlers.
pub struct GatewayState {
    pub schema: Arc<SurveySchema>,
    pub responses: Arc<ResponseService>,
    pub coach: Arc<CoachingFacade>,
    /// Telemetry store, and the response mirror when it is durable.
    pub db: Arc<dyn Database>,
    pub auth: AdminAuth,
    pub shutdown_tx: tokio::sync::RwLock<Option<oneshot::Sender<()>>>,
}

impl GatewayState {
    pub fn new(
        schema: Arc<SurveySchema>,
        responses: Arc<ResponseService>,
        coach: Arc<CoachingFacade>,
        db: Arc<dyn Database>,
        auth: AdminAuth,
    ) -> Self {
        Self {
            schema,
            responses,
            coach,
            db,
            auth,
            shutdown_tx: tokio::sync::RwLock::new(None),
        }
    }

    /// Ask a running server to stop accepting connections.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
        }
    }
}

/// All routes, without CORS. Tests drive this directly.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    // Public routes (no auth)
    let public = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/surveys/schema", get(survey::schema_handler))
        .route("/api/surveys/submit", post(survey::submit_handler))
        .route("/api/surveys/gist", post(survey::gist_handler))
        .route("/api/telemetry", post(telemetry::record_handler))
        .route("/api/ai/validate", post(ai::validate_handler))
        .route("/api/ai/followup", post(ai::followup_handler))
        .route("/api/ai/describe", post(ai::describe_handler))
        .route("/api/ai/examples", post(ai::examples_handler))
        .route("/api/auth/login", post(admin::login_handler))
        .route("/api/auth/logout", post(admin::logout_handler));

    // Admin routes (session cookie required)
    let protected = Router::new()
        .route("/api/surveys/responses", get(admin::responses_handler))
        .route("/api/surveys/summary", get(admin::summary_handler))
        .route("/api/telemetry/summary", get(telemetry::summary_handler))
        .route("/api/ai/insights", get(ai::insights_handler))
        .route("/api/admin/responses", get(admin::table_handler))
        .route("/api/admin/responses.csv", get(admin::csv_handler))
        .route("/api/admin/responses/{id}", get(admin::detail_handler))
        .route("/api/admin/aggregate", get(admin::aggregate_handler))
        .route("/api/admin/analytics", get(admin::analytics_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve in the background. Returns the bound address.
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<GatewayState>,
) -> Result<SocketAddr, GatewayError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::StartupFailed {
            reason: format!("Failed to bind to {addr}: {e}"),
        })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| GatewayError::StartupFailed {
            reason: format!("Failed to get local addr: {e}"),
        })?;

    // CORS: same-origin only; the survey UI and the wizard talk to the
    // server from the host it is bound on.
    let origins: Vec<HeaderValue> = [
        format!("http://{}:{}", bound_addr.ip(), bound_addr.port()),
        format!("http://localhost:{}", bound_addr.port()),
    ]
    .iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(AllowHeaders::list([header::CONTENT_TYPE]))
        .allow_credentials(true);

    let app = build_router(state.clone()).layer(cors);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Survey server shutting down");
            })
            .await
        {
            tracing::error!("Survey server error: {}", e);
        }
    });

    tracing::info!(addr = %bound_addr, "Survey server listening");
    Ok(bound_addr)
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        backend: state.db.backend_name(),
        responses: state.responses.len().await,
    })
}
