use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Why a single row did not make it into the archive, or (for `LogAppendFailed`)
/// why an archived certificate has no log entry.
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("unparseable issue date {value:?} (expected DD/MM/YYYY)")]
    DateParse { value: String },

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("external id {0:?} contains characters that are not allowed in a file name")]
    InvalidExternalId(String),

    #[error("{file_name} was already issued earlier in this batch")]
    DuplicateInBatch { file_name: String },

    #[error("template not found for {cert_type}: {reason}")]
    TemplateNotFound { cert_type: String, reason: String },

    #[error("rendering certificate for {external_id} failed: {reason}")]
    RenderFailed { external_id: String, reason: String },

    #[error("publishing {file_name} failed: {reason}")]
    PublishFailed { file_name: String, reason: String },

    #[error("appending log record for {file_name} failed: {reason}")]
    LogAppendFailed { file_name: String, reason: String },

    #[error("writing {file_name} to the archive failed: {reason}")]
    Archive { file_name: String, reason: String },
}

impl IssueError {
    pub fn kind(&self) -> &'static str {
        match self {
            IssueError::DateParse { .. } => "date_parse",
            IssueError::MissingField(_) => "missing_field",
            IssueError::InvalidExternalId(_) => "invalid_external_id",
            IssueError::DuplicateInBatch { .. } => "duplicate_in_batch",
            IssueError::TemplateNotFound { .. } => "template_not_found",
            IssueError::RenderFailed { .. } => "render_failed",
            IssueError::PublishFailed { .. } => "publish_failed",
            IssueError::LogAppendFailed { .. } => "log_append_failed",
            IssueError::Archive { .. } => "archive",
        }
    }
}

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid access password")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        let body = serde_json::json!({ "status": "error", "message": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
