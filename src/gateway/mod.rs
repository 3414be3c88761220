pub mod handlers;
pub mod state;
pub mod types;

use axum::{
    Router,
    body::Body,
    http::Request,
    middleware::{Next, from_fn},
    response::Response,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use handlers::{account, health, transfer};
use state::AppState;
use types::{ApiError, Principal};

/// Header carrying the principal authenticated upstream
pub const PRINCIPAL_HEADER: &str = "x-principal";

/// Axum middleware that injects the authenticated [`Principal`].
///
/// Authentication itself happens upstream; a request without the header is
/// rejected with 401.
async fn principal_middleware(mut request: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let principal = request
        .headers()
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Missing authenticated principal"))?
        .to_string();

    request.extensions_mut().insert(Principal(principal));
    Ok(next.run(request).await)
}

/// Build the gateway router
pub fn router(state: Arc<AppState>) -> Router {
    let private = Router::new()
        .route(
            "/api/v1/accounts",
            post(account::create_account).get(account::list_accounts),
        )
        .route(
            "/api/v1/accounts/{id}",
            get(account::get_account).delete(account::delete_account),
        )
        .route("/api/v1/accounts/{id}/entries", get(account::list_entries))
        .route("/api/v1/transfers", post(transfer::create_transfer))
        .route("/api/v1/transfers/{id}", get(transfer::get_transfer))
        .route_layer(from_fn(principal_middleware));

    Router::new()
        .route("/api/v1/health", get(health::health_check))
        .merge(private)
        .with_state(state)
}

/// Start HTTP Gateway server, stopping on Ctrl-C
pub async fn run_server(config: &GatewayConfig, state: AppState) -> std::io::Result<()> {
    let app = router(Arc::new(state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("Gateway shutting down");
        })
        .await
}
