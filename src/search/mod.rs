use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use log::{error, info};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

/// In-memory copy of the merged URL file, loaded once at startup.
#[derive(Debug)]
pub struct SearchCache {
    entries: Vec<String>,
}

impl SearchCache {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    pub async fn load(path: &Path) -> Result<Self, String> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| format!("failed to open {}: {e}", path.display()))?;
        let mut lines = BufReader::new(file).lines();
        let mut entries = Vec::new();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?
        {
            entries.push(line);
        }
        info!("search: loaded {} entries from {}", entries.len(), path.display());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries containing `query`, in file order.
    pub fn search(&self, query: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.contains(query))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    query: Option<String>,
}

pub fn router(cache: Arc<SearchCache>) -> Router {
    Router::new()
        .route("/search", get(search_handler))
        .with_state(cache)
}

/// Serve the search API on all interfaces until the process stops.
pub async fn serve(port: u16, cache: Arc<SearchCache>) -> Result<(), String> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("failed to bind {addr}: {e}"))?;
    info!("search: API server listening on {addr} ({} entries)", cache.len());
    axum::serve(listener, router(cache))
        .await
        .map_err(|e| format!("search server error: {e}"))
}

async fn search_handler(
    State(cache): State<Arc<SearchCache>>,
    Query(params): Query<SearchParams>,
) -> Response {
    let Some(query) = params.query.filter(|query| !query.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            "Query parameter 'query' is required",
        )
            .into_response();
    };

    let results = cache.search(&query);
    match serde_json::to_vec(&results) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(err) => {
            error!("search: error encoding JSON response: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error encoding JSON response",
            )
                .into_response()
        }
    }
}
