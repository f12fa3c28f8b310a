use crate::config::Config;
use crate::db::Db;
use crate::error::{Result, RelregError};
use crate::registry::{load_directory, lookup_relationships, LookupRequest};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// HTTP front end for registry lookups
pub struct HttpServer {
    db: Db,
    allowed_origins: Vec<String>,
}

impl HttpServer {
    pub fn new(db: Db, config: &Config) -> Self {
        Self {
            db,
            allowed_origins: config.http_server.allowed_origins.clone(),
        }
    }

    /// Bind `addr` and serve until the process exits
    pub async fn run(&self, addr: &str) -> Result<()> {
        let app = self.create_router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| {
                RelregError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to bind to {}: {}", addr, e),
                ))
            })?;
        log::info!("Relreg listening on http://{}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| RelregError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e)
            )))?;

        Ok(())
    }

    /// Create the axum router
    pub fn create_router(&self) -> Router {
        // No configured origins means local use: allow any.
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/", get(handle_root))
            .route("/relationships", get(handle_lookup).post(handle_lookup))
            .route("/entities", get(handle_entities))
            .route("/health", get(handle_health))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(AppState { db: self.db.clone() })
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    db: Db,
}

/// `GET /`: a JSON body is a lookup; an empty body lists the entity directory.
async fn handle_root(State(state): State<AppState>, body: axum::body::Bytes) -> Response {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return directory_response(&state).await;
    }
    lookup_response(&state, &body).await
}

/// `GET|POST /relationships` with a lookup body
async fn handle_lookup(State(state): State<AppState>, body: axum::body::Bytes) -> Response {
    lookup_response(&state, &body).await
}

async fn handle_entities(State(state): State<AppState>) -> Response {
    directory_response(&state).await
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "relreg",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

async fn lookup_response(state: &AppState, body: &[u8]) -> Response {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": format!("Invalid JSON: {}", e)})),
            )
                .into_response();
        }
    };

    let request = match LookupRequest::from_json(&value) {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };

    let subject = request.subject.get();
    let start = Instant::now();
    match lookup_relationships(&state.db, request).await {
        Ok(output) => {
            log::info!(
                "Lookup for entity {}: {} relationship types, {} views in {:?}",
                subject,
                output.len(),
                output.view_count(),
                start.elapsed()
            );
            (StatusCode::OK, Json(output)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn directory_response(state: &AppState) -> Response {
    match load_directory(&state.db).await {
        Ok(directory) => (StatusCode::OK, Json(directory)).into_response(),
        Err(e) => error_response(&e),
    }
}

fn status_for(err: &RelregError) -> StatusCode {
    match err {
        RelregError::InvalidInput(_) | RelregError::InvalidFilter { .. } => StatusCode::BAD_REQUEST,
        RelregError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
        RelregError::MalformedRow(_)
        | RelregError::DataIntegrity(_)
        | RelregError::Io(_)
        | RelregError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &RelregError) -> Response {
    let status = status_for(err);
    if err.is_client_error() {
        log::warn!("Rejected lookup: {}", err);
    } else {
        log::error!("Lookup failed: {}", err);
    }
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}
