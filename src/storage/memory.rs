//! In-memory bucket listing.
//!
//! Serves a fixed bucket list, or a fixed failure, without touching the
//! network. Useful for tests and for exercising the discovery endpoints
//! without a cluster.

use std::future::Future;
use std::pin::Pin;

use super::backend::{Bucket, BucketLister};

/// Bucket lister backed by a fixed outcome.
pub struct MemoryBucketLister {
    outcome: Result<Vec<Bucket>, String>,
}

impl MemoryBucketLister {
    /// A lister that always returns `buckets`.
    pub fn new(buckets: Vec<Bucket>) -> Self {
        Self {
            outcome: Ok(buckets),
        }
    }

    /// A lister whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
        }
    }
}

impl BucketLister for MemoryBucketLister {
    fn list_buckets(
        &self,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Bucket>>> + Send + '_>> {
        Box::pin(async move {
            match &self.outcome {
                Ok(buckets) => Ok(buckets.clone()),
                Err(message) => Err(anyhow::anyhow!("{message}")),
            }
        })
    }
}
