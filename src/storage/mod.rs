//! Bucket listing sources.
//!
//! The [`backend::BucketLister`] trait abstracts over where the bucket
//! list comes from. [`minio::MinioBucketLister`] queries a live cluster
//! through the S3 API; [`memory::MemoryBucketLister`] serves a fixed list.

pub mod backend;
pub mod memory;
pub mod minio;
