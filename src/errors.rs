use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No photo is stored for the requested user.
    #[error("no photo stored for user {user_id}")]
    NotFound { user_id: u64 },

    /// Invalid request data, e.g. a malformed upload.
    #[error("{message}")]
    BadRequest { message: String },

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A user-safe message that does not leak store internals.
    pub fn user_message(&self) -> String {
        match self {
            Error::NotFound { .. } | Error::BadRequest { .. } => self.to_string(),
            Error::Store(_) => "internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Store(_) => {
                tracing::error!("store error: {:#}", self);
            }
            Error::NotFound { .. } | Error::BadRequest { .. } => {
                tracing::debug!("client error: {}", self);
            }
        }

        (self.status_code(), self.user_message()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
