//! MinIO bucket listing over the S3 API.
//!
//! Issues `ListBuckets` against the configured cluster endpoint with
//! static credentials and path-style addressing, which is what MinIO
//! expects when it is addressed by `host:port`.

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info};

use super::backend::{Bucket, BucketLister};
use crate::config::MinioConfig;

/// Lists buckets of a MinIO (or any S3-compatible) cluster.
pub struct MinioBucketLister {
    /// AWS S3 SDK client pointed at the cluster.
    client: Client,
    /// Cluster URL, kept for error context.
    endpoint_url: String,
}

impl MinioBucketLister {
    /// Create a new lister for the cluster described by `config`.
    ///
    /// No request is sent here; connectivity problems surface on the first
    /// listing call.
    pub async fn new(config: &MinioConfig) -> anyhow::Result<Self> {
        let endpoint_url = config.endpoint_url();

        let creds = aws_sdk_s3::config::Credentials::new(
            &config.access_key,
            &config.secret_key,
            None, // session_token
            None, // expiry
            "minio-prometheus-sd-config",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .endpoint_url(&endpoint_url)
            .credentials_provider(creds)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(s3_config);

        info!("MinIO client created for endpoint {}", endpoint_url);

        Ok(Self {
            client,
            endpoint_url,
        })
    }

    /// Map an AWS SDK error to an anyhow error with context.
    fn map_sdk_error(&self, context: &str, err: impl std::fmt::Display) -> anyhow::Error {
        anyhow::anyhow!("failed to {context} at {}: {err}", self.endpoint_url)
    }
}

impl BucketLister for MinioBucketLister {
    fn list_buckets(
        &self,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Bucket>>> + Send + '_>> {
        Box::pin(async move {
            debug!("S3 list_buckets: endpoint={}", self.endpoint_url);

            let resp = self
                .client
                .list_buckets()
                .send()
                .await
                .map_err(|e| self.map_sdk_error("list buckets", DisplayErrorContext(e)))?;

            let buckets: Vec<Bucket> = resp
                .buckets()
                .iter()
                .filter_map(|b| {
                    let name = b.name()?;
                    Some(Bucket::new(name, creation_date(b.creation_date())))
                })
                .collect();

            debug!("S3 list_buckets returned {} buckets", buckets.len());
            Ok(buckets)
        })
    }
}

/// Creation date of a listed bucket. A missing or out-of-range date becomes
/// the Unix epoch, the zero point of S3 timestamps, so the label still
/// parses as RFC 3339 and sorts before every real bucket.
fn creation_date(dt: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    dt.and_then(|dt| to_chrono(dt.secs(), dt.subsec_nanos()))
        .unwrap_or_default()
}

/// Convert an SDK timestamp (seconds + nanoseconds) to a UTC `DateTime`.
fn to_chrono(secs: i64, nanos: u32) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, nanos)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_chrono() {
        let dt = to_chrono(1_704_067_200, 0).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert!(to_chrono(i64::MAX, 0).is_none());
    }

    #[test]
    fn test_missing_creation_date_is_epoch() {
        let epoch = creation_date(None).to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        assert_eq!(epoch, "1970-01-01T00:00:00Z");

        let dt = aws_sdk_s3::primitives::DateTime::from_secs(1_704_067_200);
        assert_eq!(creation_date(Some(&dt)).to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_new_does_not_contact_cluster() {
        // Nothing listens here; construction must still succeed.
        let config = MinioConfig {
            endpoint: "127.0.0.1:1".to_string(),
            ..MinioConfig::default()
        };
        let lister = MinioBucketLister::new(&config).await.unwrap();
        assert_eq!(lister.endpoint_url, "http://127.0.0.1:1");
    }
}
