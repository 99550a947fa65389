//! Abstract bucket listing trait.
//!
//! The discovery handlers only need one thing from the object-storage
//! cluster: its current bucket list. Every listing source implements
//! [`BucketLister`] so handlers do not need to know which one is wired in.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// A bucket as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Bucket name.
    pub name: String,
    /// Creation time. The Unix epoch when the cluster does not report one.
    pub creation_date: DateTime<Utc>,
}

impl Bucket {
    pub fn new(name: impl Into<String>, creation_date: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            creation_date,
        }
    }
}

/// Async bucket listing contract.
pub trait BucketLister: Send + Sync + 'static {
    /// Fetch every bucket visible to the configured credentials, in the
    /// order the cluster returns them.
    fn list_buckets(
        &self,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Bucket>>> + Send + '_>>;
}
