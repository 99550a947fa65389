//! MinIO Prometheus service discovery.
//!
//! This crate turns a MinIO cluster's bucket list into Prometheus HTTP
//! service-discovery target groups. It provides wildcard bucket filtering,
//! target synthesis, bucket listing over the S3 API, and the axum router
//! that serves the discovery endpoints.

use std::sync::Arc;

pub mod config;
pub mod discovery;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod pattern;
pub mod server;
pub mod storage;

use crate::config::Config;
use crate::storage::backend::BucketLister;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Effective configuration, fixed at startup.
    pub config: Config,
    /// Source of the cluster's bucket list.
    pub lister: Arc<dyn BucketLister>,
}
