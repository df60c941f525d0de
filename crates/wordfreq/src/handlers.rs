use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use wordfreq_types::RankedEntry;

use crate::rank::{DEFAULT_TOP_K, Ranking};
use crate::scheduler::ChunkScheduler;

#[derive(Clone)]
pub struct AppState {
    /// Ranking of the corpus counted at startup.
    pub ranking: Arc<Ranking>,
    pub sources: usize,
    pub max_top_k: usize,
    pub default_chunks: usize,
    pub max_chunks: usize,
}

#[derive(Deserialize)]
pub struct TopQuery {
    pub k: Option<usize>,
}

#[derive(Deserialize)]
pub struct CountQuery {
    pub k: Option<usize>,
    pub chunks: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WordCount {
    pub word: String,
    pub count: u64,
}

impl From<&RankedEntry> for WordCount {
    fn from(entry: &RankedEntry) -> Self {
        Self {
            word: entry.word.to_string(),
            count: entry.count,
        }
    }
}

#[derive(Serialize)]
pub struct TopResponse {
    k: usize,
    sources: usize,
    distinct: usize,
    total: u64,
    items: Vec<WordCount>,
}

impl TopResponse {
    fn new(ranking: &Ranking, sources: usize, k: usize) -> Self {
        Self {
            k,
            sources,
            distinct: ranking.distinct(),
            total: ranking.total(),
            items: ranking.top(k).iter().map(WordCount::from).collect(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/top", get(top))
        .route("/v1/count", post(count))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn top(
    State(state): State<AppState>,
    Query(params): Query<TopQuery>,
) -> Json<TopResponse> {
    let k = params.k.unwrap_or(DEFAULT_TOP_K).min(state.max_top_k);
    Json(TopResponse::new(&state.ranking, state.sources, k))
}

async fn count(
    State(state): State<AppState>,
    Query(params): Query<CountQuery>,
    body: Bytes,
) -> Result<Json<TopResponse>, ApiError> {
    let k = params.k.unwrap_or(DEFAULT_TOP_K).min(state.max_top_k);
    let chunks = params.chunks.unwrap_or(state.default_chunks);
    if chunks == 0 {
        return Err(ApiError::bad_request("chunks must be >= 1"));
    }
    let chunks = chunks.min(state.max_chunks);

    let ranking = tokio::task::spawn_blocking(move || {
        ChunkScheduler::new(chunks)
            .run("request body", &body)
            .map(|(table, _)| Ranking::from_table(&table))
    })
    .await
    .map_err(|err| {
        error!("count task failed: {err}");
        ApiError::Internal
    })?
    .map_err(|err| {
        error!("count request failed: {err}");
        ApiError::Internal
    })?;

    Ok(Json(TopResponse::new(&ranking, 1, k)))
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                let body = Json(ErrorResponse { error: msg });
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::Internal => {
                let body = Json(json!({ "error": "internal server error" }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
