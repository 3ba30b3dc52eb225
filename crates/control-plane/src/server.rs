use std::{net::SocketAddr, sync::Arc};

use {
    anyhow::Context,
    axum::{
        Router,
        extract::{Path, State, rejection::JsonRejection},
        http::StatusCode,
        middleware,
        response::{IntoResponse, Json},
        routing::get,
    },
    tower_http::trace::TraceLayer,
    tracing::{debug, info},
};

use {
    gatehouse_config::{ControlPlaneConfig, load_configurations},
    gatehouse_protocol::{
        CONFIGURATION_ROUTE, ConfigurationEntry, GATEWAY_ROUTE, GATEWAYS_PATH, Gateway, HEALTH_PATH,
    },
};

use crate::{
    auth::{BearerAuth, require_bearer},
    configuration::ConfigurationStore,
    error::ServiceError,
    service::ControlPlaneService,
};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    service: Arc<ControlPlaneService>,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the control-plane router (shared between production startup and tests).
pub fn build_control_plane_app(service: Arc<ControlPlaneService>, auth: BearerAuth) -> Router {
    let api = Router::new()
        .route(GATEWAYS_PATH, get(list_gateways_handler).post(register_handler))
        .route(GATEWAY_ROUTE, get(get_gateway_handler))
        .route(CONFIGURATION_ROUTE, get(configuration_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::new(auth),
            require_bearer,
        ));

    Router::new()
        .route(HEALTH_PATH, get(health_handler))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

/// Load the configuration source named in `config`, or an empty store.
pub fn load_store(config: &ControlPlaneConfig) -> anyhow::Result<ConfigurationStore> {
    match config.configurations.as_deref() {
        Some(path) => Ok(ConfigurationStore::new(load_configurations(path)?)),
        None => Ok(ConfigurationStore::empty()),
    }
}

/// Start the control-plane HTTP server and run until Ctrl-C.
pub async fn start_control_plane(config: &ControlPlaneConfig) -> anyhow::Result<()> {
    let store = load_store(config)?;
    let configured = store.len();
    debug!(gateway_ids = ?store.gateway_ids(), "configuration loaded");
    let service = Arc::new(ControlPlaneService::new(store));
    let auth = BearerAuth::new(config.token.clone());
    let enforced = auth.is_enforced();

    let app = build_control_plane_app(service, auth);

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.bind, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    // Startup banner.
    let lines = [
        format!("gatehouse control plane v{}", env!("CARGO_PKG_VERSION")),
        format!("listening on {addr}"),
        format!("{configured} gateways configured"),
        format!("bearer auth: {}", if enforced { "enforced" } else { "off" }),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("control plane stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "gateways": state.service.gateway_count().await,
        "configured": state.service.configurations().len(),
    }))
}

async fn register_handler(
    State(state): State<AppState>,
    payload: Result<Json<Gateway>, JsonRejection>,
) -> Result<(StatusCode, Json<Gateway>), ServiceError> {
    let Json(gateway) = payload.map_err(|e| ServiceError::InvalidBody(e.body_text()))?;
    let registered = state.service.register_gateway(gateway).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

async fn list_gateways_handler(State(state): State<AppState>) -> Json<Vec<Gateway>> {
    Json(state.service.list_gateways().await)
}

async fn get_gateway_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Gateway>, ServiceError> {
    state.service.get_gateway(&id).await.map(Json)
}

async fn configuration_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ConfigurationEntry>>, ServiceError> {
    state.service.get_configuration(&id).map(Json)
}
