//! The HTTP surface serving analysis results as JSON.
//!
//! Thin translation layer: routes map straight onto the engine's
//! operations, success payloads are wrapped with the block time and the
//! processing duration, and every failure turns into a 422 with the
//! elapsed duration. The engine itself runs on the blocking pool, one
//! request-scoped analysis at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

use crate::analyzer::{
    self, error::AnalyzerError, AllFundsFlows, Cancel, FlowProbability, Hub,
};
use crate::config::AppConfig;
use crate::rpc::TxSource;

const HEALTH_MSG: &str = concat!(
    r#"{"health": "Thanks for checking. Still alive.","#,
    r#""probability": "/api/v1/{tx-hash}", "#,
    r#""raw solutions": "/api/v1/{tx-hash}/all","#,
    r#""all paths": "/api/v1/{tx}/chain","#,
    r#""single path": "/api/v1/{tx}/chain/{index}"}"#
);

const DEFAULT_ERROR_MSG: &str = "Oops! Something went wrong, try different inputs or \
     contact system maintainers if problem persist.";

/// Everything the request handlers need: the node seam and the engine
/// tunables.
#[derive(Clone)]
pub struct AppState {
    /// Shared handle to the node RPC client.
    pub source: Arc<dyn TxSource>,
    /// Complex-transaction endpoint cutoff.
    pub endpoint_cutoff: usize,
    /// Provenance walk depth budget.
    pub chain_depth: usize,
    /// Per-request deadline in seconds, zero for none.
    pub timeout_secs: u64,
}

impl AppState {
    /// Builds the handler state from the node seam and the app config.
    pub fn new(source: Arc<dyn TxSource>, config: &AppConfig) -> Self {
        Self {
            source,
            endpoint_cutoff: config.endpoint_cutoff,
            chain_depth: config.chain_depth,
            timeout_secs: config.timeout_secs,
        }
    }

    fn cancel_token(&self) -> Cancel {
        if self.timeout_secs > 0 {
            Cancel::with_timeout(Duration::from_secs(self.timeout_secs))
        } else {
            Cancel::new()
        }
    }
}

/// Builds the service router with all analysis routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/v1/{tx}", get(tx_probability))
        .route("/api/v1/{tx}/all", get(all_tx_solutions))
        .route("/api/v1/{tx}/chain", get(chain))
        .route("/api/v1/{tx}/chain/{index}", get(chain_path))
        .with_state(state)
}

// Time and analysis payload wrapper around every successful response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Payload<T> {
    #[serde(skip_serializing_if = "is_zero_i64")]
    tx_time: i64,
    duration: String,
    data: T,
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

fn elapsed(start: Instant) -> String {
    format!("{:.4}s", start.elapsed().as_secs_f64())
}

async fn health() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        HEALTH_MSG,
    )
}

fn error_response(start: Instant, err: AnalyzerError) -> Response {
    log::error!("Request failed: {err:?}");
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "error": DEFAULT_ERROR_MSG,
            "duration": elapsed(start),
        })),
    )
        .into_response()
}

fn json_response<T: Serialize>(start: Instant, block_time: i64, data: T) -> Response {
    (
        StatusCode::OK,
        Json(Payload {
            tx_time: block_time,
            duration: elapsed(start),
            data,
        }),
    )
        .into_response()
}

// Runs one engine operation on the blocking pool and translates its
// outcome. The closure returns the payload and the transaction's block
// time.
async fn run_analysis<T, F>(state: AppState, start: Instant, task: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&dyn TxSource, &AppState, &Cancel) -> Result<(T, i64), AnalyzerError>
        + Send
        + 'static,
{
    let cancel = state.cancel_token();
    let handle = tokio::task::spawn_blocking(move || {
        let source = Arc::clone(&state.source);
        task(source.as_ref(), &state, &cancel)
    });

    match handle.await {
        Ok(Ok((data, block_time))) => json_response(start, block_time, data),
        Ok(Err(err)) => error_response(start, err),
        Err(_) => error_response(
            start,
            AnalyzerError::InternalInvariant("analysis task panicked"),
        ),
    }
}

// GET /api/v1/{tx} - the probability solution with the lowest granularity.
async fn tx_probability(Path(tx): Path<String>, State(state): State<AppState>) -> Response {
    let start = Instant::now();
    run_analysis::<Vec<FlowProbability>, _>(state, start, move |source, state, cancel| {
        let (probability, tx_data) =
            analyzer::retrieve_tx_probability(source, &tx, state.endpoint_cutoff, cancel)?;
        Ok((probability, tx_data.block_time))
    })
    .await
}

// GET /api/v1/{tx}/all - every raw partition solution.
async fn all_tx_solutions(Path(tx): Path<String>, State(state): State<AppState>) -> Response {
    let start = Instant::now();
    run_analysis::<Vec<AllFundsFlows>, _>(state, start, move |source, state, cancel| {
        let tx_data = analyzer::retrieve_tx_data(source, &tx, cancel)?;
        let solutions =
            analyzer::transaction_funds_flow(&tx_data, state.endpoint_cutoff, cancel)?;
        Ok((solutions, tx_data.block_time))
    })
    .await
}

// GET /api/v1/{tx}/chain - provenance paths for every output.
async fn chain(Path(tx): Path<String>, State(state): State<AppState>) -> Response {
    let start = Instant::now();
    run_analysis::<Vec<Hub>, _>(state, start, move |source, state, cancel| {
        analyzer::chain_discovery(
            source,
            &tx,
            None,
            state.chain_depth,
            state.endpoint_cutoff,
            cancel,
        )
    })
    .await
}

// GET /api/v1/{tx}/chain/{index} - the provenance path of one output. An
// index past the last output clamps to the last one; anything that is not
// a non-negative integer is unprocessable.
async fn chain_path(
    Path((tx, index)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    let start = Instant::now();

    let index = match parse_output_index(&index) {
        Some(index) => index,
        None => {
            return error_response(
                start,
                AnalyzerError::InvalidTransaction("output index must be a non-negative integer"),
            )
        }
    };

    run_analysis::<Vec<Hub>, _>(state, start, move |source, state, cancel| {
        analyzer::chain_discovery(
            source,
            &tx,
            Some(index),
            state.chain_depth,
            state.endpoint_cutoff,
            cancel,
        )
    })
    .await
}

fn parse_output_index(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok()
}
