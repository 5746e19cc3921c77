mod api;
mod pages;

pub use api::*;
pub use pages::*;

use axum::extract::Multipart;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{authenticate, AuthResult};
use crate::certificate::{CertificateType, IssuanceRecord, RecordRow};
use crate::error::AppError;
use crate::records::parse_csv;
use crate::state::AppState;

/// Uploads larger than this are rejected by the multipart extractor.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/generate", post(generate))
        .route("/log", get(log_page))
        .route("/api/generate", post(api_generate))
        .route("/api/log", get(api_log))
        .route("/health", get(health))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `?q=` on the log views.
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub q: String,
}

impl LogQuery {
    pub fn apply(&self, records: Vec<IssuanceRecord>) -> Vec<IssuanceRecord> {
        records.into_iter().filter(|r| r.matches(&self.q)).collect()
    }
}

/// A validated generation request: the operator is authenticated, the type is
/// known and the CSV has the required columns.
pub struct GenerateInput {
    pub cert_type: CertificateType,
    pub rows: Vec<RecordRow>,
}

pub async fn read_generate_form(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<GenerateInput, AppError> {
    let mut password = None;
    let mut cert_type = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "password" => password = Some(field_text(field).await?),
            "cert_type" => cert_type = Some(field_text(field).await?),
            "file" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("unreadable file: {e}")))?;
                file = Some(data.to_vec());
            }
            _ => {}
        }
    }

    if authenticate(&state.config.access_password, password.as_deref()) == AuthResult::Denied {
        tracing::warn!("Rejected generation request with a bad password");
        return Err(AppError::Unauthorized);
    }

    let cert_type: CertificateType = cert_type
        .ok_or_else(|| AppError::BadRequest("cert_type is required".to_string()))?
        .parse()
        .map_err(|e: crate::certificate::UnknownCertificateType| AppError::BadRequest(e.to_string()))?;

    let file = file
        .filter(|f| !f.is_empty())
        .ok_or_else(|| AppError::BadRequest("a CSV file is required".to_string()))?;
    let rows = parse_csv(&file).map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(GenerateInput { cert_type, rows })
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed upload: {e}")))
}
