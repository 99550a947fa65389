//! Service discovery handlers.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{info, warn};

use crate::discovery::{self, ScrapeConfig, TargetGroup};
use crate::errors::SdError;
use crate::metrics;
use crate::storage::backend::Bucket;
use crate::AppState;

/// Metric label for jobs this service does not serve.
const UNKNOWN_JOB_LABEL: &str = "unknown";

/// `GET /sd?job=<name>` -- Prometheus HTTP SD target list for one job.
#[utoipa::path(
    get,
    path = "/sd",
    tag = "Discovery",
    operation_id = "ServiceDiscovery",
    params(("job" = String, Query, description = "Job name: the server job or the bucket job")),
    responses(
        (status = 200, description = "Target groups for the job", body = [TargetGroup]),
        (status = 400, description = "job parameter is required"),
        (status = 404, description = "Job not found"),
        (status = 500, description = "Bucket listing failed")
    )
)]
pub async fn service_discovery(
    state: Arc<AppState>,
    job: Option<&str>,
    peer: &str,
) -> Result<Response, SdError> {
    let Some(job) = job.filter(|j| !j.is_empty()) else {
        warn!("Service discovery request missing job parameter from {}", peer);
        metrics::record_discovery("", SdError::MissingJob.kind());
        return Err(SdError::MissingJob);
    };

    info!("Service discovery request for job '{}' from {}", job, peer);

    let result = targets_for_job(&state, job).await;

    let d = &state.config.discovery;
    let job_label = if job == d.server_job || job == d.bucket_job {
        job
    } else {
        UNKNOWN_JOB_LABEL
    };
    metrics::record_discovery(
        job_label,
        match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        },
    );

    Ok(Json(result?).into_response())
}

/// Resolve the target groups for `job`.
///
/// The server job needs no bucket listing. The bucket job fails with
/// [`SdError::ListingFailure`] when the listing fails, and succeeds with an
/// empty list when the cluster has no matching buckets.
pub async fn targets_for_job(state: &AppState, job: &str) -> Result<Vec<TargetGroup>, SdError> {
    let d = &state.config.discovery;

    if job == d.server_job {
        return Ok(vec![discovery::server_target(&state.config)]);
    }

    if job == d.bucket_job {
        let buckets = list_buckets(state).await?;
        info!(
            "Found {} buckets, applying pattern '{}' and exclude '{}'",
            buckets.len(),
            d.bucket_pattern,
            d.bucket_exclude_pattern
        );
        let groups = discovery::synthesize(&buckets, &state.config);
        info!("After filtering, {} buckets remain", groups.len());
        metrics::record_bucket_counts(buckets.len(), groups.len());
        return Ok(groups);
    }

    Err(SdError::JobNotFound {
        job: job.to_string(),
    })
}

/// `GET /scrape_configs` -- every scrape job this service can serve.
#[utoipa::path(
    get,
    path = "/scrape_configs",
    tag = "Discovery",
    operation_id = "ScrapeConfigs",
    responses(
        (status = 200, description = "Scrape configurations", body = [ScrapeConfig]),
        (status = 500, description = "Bucket listing failed")
    )
)]
pub async fn scrape_configs(state: Arc<AppState>) -> Result<Response, SdError> {
    let buckets = list_buckets(&state).await?;
    let configs = discovery::scrape_configs(&buckets, &state.config);
    tracing::debug!("Generated {} scrape configurations", configs.len());
    Ok(Json(configs).into_response())
}

/// Fetch the bucket list, tagging failures as [`SdError::ListingFailure`].
async fn list_buckets(state: &AppState) -> Result<Vec<Bucket>, SdError> {
    state.lister.list_buckets().await.map_err(|e| {
        metrics::record_listing_failure();
        SdError::ListingFailure(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::memory::MemoryBucketLister;
    use chrono::Utc;

    fn state(lister: MemoryBucketLister) -> AppState {
        AppState {
            config: Config::default(),
            lister: Arc::new(lister),
        }
    }

    #[tokio::test]
    async fn test_server_job_skips_listing() {
        // A failing lister proves the server job never lists buckets.
        let state = state(MemoryBucketLister::failing("unreachable"));
        let groups = targets_for_job(&state, "minio-server").await.unwrap();
        assert_eq!(groups, vec![discovery::server_target(&state.config)]);
    }

    #[tokio::test]
    async fn test_bucket_job_lists_and_filters() {
        let now = Utc::now();
        let mut state = state(MemoryBucketLister::new(vec![
            Bucket::new("prod-a", now),
            Bucket::new("dev-b", now),
            Bucket::new("prod-c", now),
        ]));
        state.config.discovery.bucket_pattern = "prod-*".to_string();

        let groups = targets_for_job(&state, "minio-buckets").await.unwrap();
        let names: Vec<&str> = groups.iter().map(|g| g.labels["sd_bucket"].as_str()).collect();
        assert_eq!(names, vec!["prod-a", "prod-c"]);
    }

    #[tokio::test]
    async fn test_empty_listing_is_not_an_error() {
        let state = state(MemoryBucketLister::new(vec![]));
        let groups = targets_for_job(&state, "minio-buckets").await.unwrap();
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let state = state(MemoryBucketLister::failing("connection refused"));
        let err = targets_for_job(&state, "minio-buckets").await.unwrap_err();
        assert!(matches!(err, SdError::ListingFailure(_)));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let state = state(MemoryBucketLister::new(vec![]));
        let err = targets_for_job(&state, "nope").await.unwrap_err();
        assert!(matches!(err, SdError::JobNotFound { ref job } if job == "nope"));
    }
}
