use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Record absent. Expected on the redirect path, where it drives the
    /// create-golink console flow instead of failing the request.
    #[error("golink '{0}' not found")]
    NotFound(String),

    /// The target of a create or rename is already taken.
    #[error("golink '{0}' already exists")]
    NameConflict(String),

    /// The store failed in some way that is not "record absent".
    #[error("store operation failed: {0}")]
    Store(String),

    /// A stored target URL does not parse. Fatal for the request that hit
    /// it; the record itself needs fixing through the management API.
    #[error("stored URL '{url}' does not parse: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The optimistic counter update gave up after its retry budget. Only
    /// ever logged — counting is best-effort and never fails a redirect.
    #[error("usage count for '{0}' not recorded: {1}")]
    CounterUpdate(String, String),

    #[error("{0}")]
    Validation(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NameConflict(_) => StatusCode::CONFLICT,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Store(_) | Error::InvalidUrl { .. } | Error::CounterUpdate(..) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Details go to the log, not the client.
            tracing::error!("{self}");
            (status, "internal server error").into_response()
        } else {
            (status, self.to_string()).into_response()
        }
    }
}
