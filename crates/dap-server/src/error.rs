use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dap_commitments::{CommitmentMeta, DecodeError};
use dap_store::{ConfigError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// A storage failure while serving a request, tagged with the commitment
    /// it concerned.
    #[error("{meta}: {source}")]
    Request {
        meta: CommitmentMeta,
        #[source]
        source: StoreError,
    },

    #[error("invalid commitment: {0}")]
    Decode(#[from] DecodeError),

    #[error("unreadable request body: {0}")]
    Body(BytesRejection),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("backend configuration error: {0}")]
    Backend(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn request(meta: CommitmentMeta, source: StoreError) -> Self {
        Self::Request { meta, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Request { source, .. } => store_status(source),
            Self::Body(rejection) => rejection.status(),
            Self::Config(_) | Self::Backend(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
