//! Error types for the discovery endpoints.
//!
//! Every variant maps to an HTTP status. The enum implements
//! [`axum::response::IntoResponse`] so handlers can simply return
//! `Err(SdError::MissingJob)`. Bodies are short `text/plain` messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Discovery failures.
#[derive(Debug, Error)]
pub enum SdError {
    /// The `job` query parameter is absent or empty.
    #[error("job parameter is required")]
    MissingJob,

    /// The requested job is neither the server job nor the bucket job.
    #[error("Job not found")]
    JobNotFound { job: String },

    /// The cluster's bucket list could not be fetched.
    ///
    /// Kept apart from an empty bucket list: callers must never see this
    /// as "no targets".
    #[error("Internal server error")]
    ListingFailure(#[source] anyhow::Error),

    /// Catch-all for unexpected internal errors.
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl SdError {
    /// Short machine-readable kind, used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            SdError::MissingJob => "missing_job",
            SdError::JobNotFound { .. } => "job_not_found",
            SdError::ListingFailure(_) => "listing_failure",
            SdError::Internal(_) => "internal",
        }
    }

    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SdError::MissingJob => StatusCode::BAD_REQUEST,
            SdError::JobNotFound { .. } => StatusCode::NOT_FOUND,
            SdError::ListingFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SdError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SdError {
    fn into_response(self) -> Response {
        match &self {
            SdError::ListingFailure(e) => error!("Failed to list buckets: {e:#}"),
            SdError::Internal(e) => error!("Internal error: {e:#}"),
            _ => {}
        }

        (
            self.status_code(),
            [("content-type", "text/plain; charset=utf-8")],
            format!("{self}\n"),
        )
            .into_response()
    }
}
