use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::certificate::IssuanceRecord;
use crate::error::AppError;
use crate::state::AppState;

use super::{read_generate_form, LogQuery};

/// Same batch as `/generate`, answered as JSON with the archive inlined.
pub async fn api_generate(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let input = read_generate_form(&state, multipart).await?;
    let outcome = state.issuer.run(&input.rows, input.cert_type).await;

    let mut body = serde_json::to_value(outcome.summary())
        .map_err(|e| AppError::Internal(e.to_string()))?;
    body["archive_name"] = json!("certificates.zip");
    body["archive_base64"] = json!(BASE64.encode(&outcome.archive));
    Ok(Json(body))
}

pub async fn api_log(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<IssuanceRecord>>, AppError> {
    let records = state
        .log
        .list()
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;
    Ok(Json(query.apply(records)))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
