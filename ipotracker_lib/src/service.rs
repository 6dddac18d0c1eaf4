//! HTTP front end for the two IPO queries.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::db::{Db, DbError};
use crate::query::{recent_ipos_response, upcoming_ipos_response, QueryResponse};

#[derive(Debug, Clone)]
pub struct ServiceState {
    pub db_path: PathBuf,
}

impl IntoResponse for QueryResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST);
        let content_type = if self.is_success() {
            "application/json"
        } else {
            "text/plain; charset=utf-8"
        };
        let mut response = (status, self.body).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}

/// Runs a blocking query off the async runtime.
async fn run_query<F>(state: Arc<ServiceState>, query: F) -> QueryResponse
where
    F: FnOnce(&std::path::Path) -> QueryResponse + Send + 'static,
{
    match tokio::task::spawn_blocking(move || query(&state.db_path)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Query task failed");
            QueryResponse::bad_request(e.to_string())
        }
    }
}

async fn recent_ipos(State(state): State<Arc<ServiceState>>) -> QueryResponse {
    run_query(state, recent_ipos_response).await
}

async fn upcoming_ipos(State(state): State<Arc<ServiceState>>) -> QueryResponse {
    let today = chrono::Local::now().date_naive();
    run_query(state, move |path| upcoming_ipos_response(path, today)).await
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Routes: `GET /ipos/recent`, `GET /ipos/upcoming`, `GET /health`.
pub fn router(db_path: impl Into<PathBuf>) -> Router {
    let state = Arc::new(ServiceState {
        db_path: db_path.into(),
    });
    Router::new()
        .route("/ipos/recent", get(recent_ipos))
        .route("/ipos/upcoming", get(upcoming_ipos))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Creates the schema if absent, then builds the router.
pub fn open_router(db_path: impl Into<PathBuf>) -> Result<Router, DbError> {
    let db_path = db_path.into();
    Db::open(&db_path)?.init()?;
    Ok(router(db_path))
}
