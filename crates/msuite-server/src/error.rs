use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use msuite_ingest::IngestError;
use msuite_store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("no such materialsuite: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::AlreadyExists(_) => StatusCode::CONFLICT,
        StoreError::Unimplemented(_) => StatusCode::NOT_IMPLEMENTED,
        StoreError::Backend(_) | StoreError::Metadata(_) | StoreError::Io(_) | StoreError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Ingest(e) => match e {
                IngestError::AlreadyExists(_) | IngestError::HistoryRewritten { .. } => {
                    StatusCode::CONFLICT
                }
                IngestError::NotFound(_) => StatusCode::NOT_FOUND,
                IngestError::MissingFixity { .. }
                | IngestError::IdentifierMismatch { .. }
                | IngestError::Metadata(_) => StatusCode::BAD_REQUEST,
                IngestError::InvalidIdentifier(_)
                | IngestError::IntegrityMismatch { .. }
                | IngestError::Io(_)
                | IngestError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
                IngestError::Store(e) => store_status(e),
            },
            Self::Store(e) => store_status(e),
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
