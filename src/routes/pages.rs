use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;
use tera::Context;

use crate::certificate::CertificateType;
use crate::error::AppError;
use crate::state::AppState;

use super::{read_generate_form, LogQuery};

pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let mut ctx = Context::new();
    let labels: Vec<&str> = CertificateType::ALL.iter().map(|t| t.label()).collect();
    ctx.insert("cert_types", &labels);
    render_template(&state, "index.html", &ctx)
}

/// Runs a batch and answers with the ZIP of every issued certificate. Per-row
/// outcomes travel in headers so the download stays a plain archive.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let input = read_generate_form(&state, multipart).await?;
    let outcome = state.issuer.run(&input.rows, input.cert_type).await;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"certificates.zip\"".to_string(),
        ),
    ];
    let counts = [
        ("x-batch-id", outcome.batch_id.clone()),
        ("x-issued-count", outcome.archived.len().to_string()),
        ("x-failed-count", outcome.failed().to_string()),
        ("x-skipped-count", outcome.skipped().to_string()),
        ("x-log-warnings", outcome.warnings.len().to_string()),
    ];

    let mut response = (headers, outcome.archive).into_response();
    for (name, value) in counts {
        if let Ok(value) = value.parse() {
            response.headers_mut().insert(name, value);
        }
    }
    Ok(response)
}

pub async fn log_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> Result<Html<String>, AppError> {
    let mut ctx = Context::new();
    ctx.insert("q", query.q.trim());
    match state.log.list().await {
        Ok(records) => {
            ctx.insert("records", &query.apply(records));
            ctx.insert("error", &Option::<String>::None);
        }
        Err(e) => {
            tracing::error!("Failed to load certificate log: {}", e);
            ctx.insert("records", &Vec::<()>::new());
            ctx.insert("error", &format!("Could not load the certificate log: {e}"));
        }
    }
    render_template(&state, "log.html", &ctx)
}

fn render_template(state: &AppState, name: &str, ctx: &Context) -> Result<Html<String>, AppError> {
    state
        .tera
        .render(name, ctx)
        .map(Html)
        .map_err(|e| AppError::Internal(format!("template {name}: {e}")))
}
