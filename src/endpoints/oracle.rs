//! The GreenOracle chat endpoint.

use anyhow::anyhow;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::{oracle::Oracle, serve::AppState, Error, Result};

#[derive(Deserialize)]
struct AskRequest {
    prompt: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

/// Forward a question to the model and return its answer. Every failure
/// (missing credential, upstream error) renders as the standard JSON error
/// payload; there is no retry.
async fn ask(
    State(oracle): State<Oracle>,
    Json(input): Json<AskRequest>,
) -> Result<Json<AskResponse>> {
    if input.prompt.trim().is_empty() {
        return Err(Error::bad_request(anyhow!("prompt must not be empty")));
    }

    metrics::counter!(crate::metrics::ORACLE_REQUESTS).increment(1);

    match oracle.ask(&input.prompt).await {
        Ok(answer) => Ok(Json(AskResponse { answer })),
        Err(err) => {
            metrics::counter!(crate::metrics::ORACLE_FAILURES).increment(1);
            Err(err.into())
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/oracle", post(ask))
}
