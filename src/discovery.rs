//! Scrape-target synthesis for Prometheus HTTP service discovery.
//!
//! Turns the cluster's bucket list into target groups. One group is
//! emitted per bucket that passes the include/exclude wildcard filter,
//! plus a cluster-level group that is always present. The JSON shape of
//! [`TargetGroup`] is the wire format Prometheus' `http_sd_configs`
//! consumes.

use std::collections::BTreeMap;

use chrono::SecondsFormat;
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::Config;
use crate::pattern::Pattern;
use crate::storage::backend::Bucket;

// -- Label names --------------------------------------------------------------

/// Overrides the scrape path of a target.
pub const LABEL_METRICS_PATH: &str = "__metrics_path__";
/// Overrides the scrape scheme of a target.
pub const LABEL_SCHEME: &str = "__scheme__";
pub const LABEL_INSTANCE: &str = "instance";
pub const LABEL_JOB: &str = "job";
pub const LABEL_BUCKET: &str = "sd_bucket";
pub const LABEL_BUCKET_CREATION: &str = "sd_bucket_creation";
/// Include pattern, attached to the bucket job in scrape configs.
pub const LABEL_BUCKET_PATTERN: &str = "bucket_pattern";

// -- Wire types ---------------------------------------------------------------

/// A set of targets sharing one label set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TargetGroup {
    /// `host:port` addresses to scrape.
    pub targets: Vec<String>,
    /// Labels attached to every target of the group.
    pub labels: BTreeMap<String, String>,
}

/// A Prometheus scrape job description, as returned by `/scrape_configs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScrapeConfig {
    pub job_name: String,
    pub static_configs: Vec<TargetGroup>,
    pub metrics_path: String,
    pub scrape_interval: String,
    pub scrape_timeout: String,
    pub scheme: String,
}

// -- Filtering ----------------------------------------------------------------

/// Keep the buckets that match `include` and do not match `exclude`.
///
/// An empty `exclude` removes nothing. Exclusion wins when both patterns
/// match. Input order is preserved.
pub fn filter_buckets<'a>(buckets: &'a [Bucket], include: &str, exclude: &str) -> Vec<&'a Bucket> {
    if include == "*" && exclude.is_empty() {
        return buckets.iter().collect();
    }

    let include = Pattern::new(include);
    let exclude = (!exclude.is_empty()).then(|| Pattern::new(exclude));
    buckets
        .iter()
        .filter(|b| include.is_match(&b.name))
        .filter(|b| !exclude.as_ref().is_some_and(|p| p.is_match(&b.name)))
        .collect()
}

// -- Synthesis ----------------------------------------------------------------

/// Build one target group per bucket that passes the configured filter.
///
/// Never fails: an empty bucket list gives an empty result.
pub fn synthesize(buckets: &[Bucket], config: &Config) -> Vec<TargetGroup> {
    let d = &config.discovery;
    let endpoint = &config.minio.endpoint;
    let scheme = config.minio.scheme();
    let base = d.bucket_metrics_path();

    filter_buckets(buckets, &d.bucket_pattern, &d.bucket_exclude_pattern)
        .into_iter()
        .map(|bucket| TargetGroup {
            targets: vec![endpoint.clone()],
            labels: BTreeMap::from([
                (
                    LABEL_METRICS_PATH.to_string(),
                    format!("{base}/{}", bucket.name),
                ),
                (LABEL_SCHEME.to_string(), scheme.to_string()),
                (LABEL_INSTANCE.to_string(), endpoint.clone()),
                (LABEL_JOB.to_string(), d.bucket_job.clone()),
                (LABEL_BUCKET.to_string(), bucket.name.clone()),
                (
                    LABEL_BUCKET_CREATION.to_string(),
                    bucket
                        .creation_date
                        .to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
            ]),
        })
        .collect()
}

/// The cluster-level target group. Independent of buckets.
pub fn server_target(config: &Config) -> TargetGroup {
    let endpoint = &config.minio.endpoint;
    TargetGroup {
        targets: vec![endpoint.clone()],
        labels: BTreeMap::from([
            (
                LABEL_METRICS_PATH.to_string(),
                config.discovery.metrics_path.clone(),
            ),
            (
                LABEL_SCHEME.to_string(),
                config.minio.scheme().to_string(),
            ),
            (LABEL_INSTANCE.to_string(), endpoint.clone()),
            (LABEL_JOB.to_string(), config.discovery.server_job.clone()),
        ]),
    }
}

/// Describe the scrape jobs this service can serve targets for.
///
/// The server job is always listed; the bucket job only when at least one
/// bucket passes the filter.
pub fn scrape_configs(buckets: &[Bucket], config: &Config) -> Vec<ScrapeConfig> {
    let d = &config.discovery;
    let scheme = config.minio.scheme().to_string();
    let endpoint = &config.minio.endpoint;

    let mut configs = vec![ScrapeConfig {
        job_name: d.server_job.clone(),
        static_configs: vec![server_target(config)],
        metrics_path: d.metrics_path.clone(),
        scrape_interval: d.scrape_interval.clone(),
        scrape_timeout: d.scrape_timeout.clone(),
        scheme: scheme.clone(),
    }];

    let filtered = filter_buckets(buckets, &d.bucket_pattern, &d.bucket_exclude_pattern);
    if !filtered.is_empty() {
        let bucket_path = d.bucket_metrics_path();
        configs.push(ScrapeConfig {
            job_name: d.bucket_job.clone(),
            static_configs: vec![TargetGroup {
                targets: vec![endpoint.clone()],
                labels: BTreeMap::from([
                    (LABEL_METRICS_PATH.to_string(), bucket_path.clone()),
                    (LABEL_SCHEME.to_string(), scheme.clone()),
                    (LABEL_INSTANCE.to_string(), endpoint.clone()),
                    (LABEL_JOB.to_string(), d.bucket_job.clone()),
                    (LABEL_BUCKET_PATTERN.to_string(), d.bucket_pattern.clone()),
                ]),
            }],
            metrics_path: bucket_path,
            scrape_interval: d.scrape_interval.clone(),
            scrape_timeout: d.scrape_timeout.clone(),
            scheme,
        });
    }

    configs
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bucket(name: &str) -> Bucket {
        Bucket::new(name, Utc.with_ymd_and_hms(2024, 3, 15, 8, 30, 0).unwrap())
    }

    fn config_with(include: &str, exclude: &str) -> Config {
        let mut config = Config::default();
        config.discovery.bucket_pattern = include.to_string();
        config.discovery.bucket_exclude_pattern = exclude.to_string();
        config
    }

    fn names(groups: &[TargetGroup]) -> Vec<&str> {
        groups
            .iter()
            .map(|g| g.labels[LABEL_BUCKET].as_str())
            .collect()
    }

    #[test]
    fn test_include_prefix_keeps_matching_buckets_in_order() {
        let buckets = vec![bucket("prod-a"), bucket("dev-b"), bucket("prod-c")];
        let config = config_with("prod-*", "");
        let groups = synthesize(&buckets, &config);

        assert_eq!(names(&groups), vec!["prod-a", "prod-c"]);
        for g in &groups {
            assert_eq!(g.labels[LABEL_JOB], "minio-buckets");
        }
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let buckets = vec![bucket("prod-logs"), bucket("dev-logs")];
        let groups = synthesize(&buckets, &config_with("*", "prod-*"));
        assert_eq!(names(&groups), vec!["dev-logs"]);
    }

    #[test]
    fn test_both_patterns_empty_keeps_everything() {
        let buckets = vec![bucket("a"), bucket("b")];
        let groups = synthesize(&buckets, &config_with("", ""));
        assert_eq!(names(&groups), vec!["a", "b"]);
    }

    #[test]
    fn test_fast_path_matches_filtered_result() {
        let buckets = vec![bucket("x"), bucket("y.z"), bucket("w+1")];
        let fast = filter_buckets(&buckets, "*", "");
        let slow: Vec<&Bucket> = buckets
            .iter()
            .filter(|b| Pattern::new("*").is_match(&b.name))
            .collect();
        assert_eq!(fast, slow);
    }

    #[test]
    fn test_empty_bucket_list() {
        for (include, exclude) in [("*", ""), ("prod-*", "prod-tmp-*"), ("", "*")] {
            assert!(synthesize(&[], &config_with(include, exclude)).is_empty());
        }
    }

    #[test]
    fn test_exclude_everything() {
        let buckets = vec![bucket("a"), bucket("b")];
        assert!(synthesize(&buckets, &config_with("*", "*")).is_empty());
    }

    #[test]
    fn test_bucket_group_labels() {
        let mut config = Config::default();
        config.minio.endpoint = "minio.internal:9000".to_string();
        config.minio.use_ssl = true;

        let groups = synthesize(&[bucket("logs")], &config);
        assert_eq!(groups.len(), 1);
        let g = &groups[0];
        assert_eq!(g.targets, vec!["minio.internal:9000"]);
        assert_eq!(
            g.labels,
            BTreeMap::from([
                (
                    "__metrics_path__".to_string(),
                    "/minio/metrics/v3/bucket/api/logs".to_string()
                ),
                ("__scheme__".to_string(), "https".to_string()),
                ("instance".to_string(), "minio.internal:9000".to_string()),
                ("job".to_string(), "minio-buckets".to_string()),
                ("sd_bucket".to_string(), "logs".to_string()),
                (
                    "sd_bucket_creation".to_string(),
                    "2024-03-15T08:30:00Z".to_string()
                ),
            ])
        );
    }

    #[test]
    fn test_synthesize_is_idempotent() {
        let buckets = vec![bucket("prod-a"), bucket("dev-b")];
        let config = config_with("*", "dev-*");
        assert_eq!(synthesize(&buckets, &config), synthesize(&buckets, &config));
    }

    #[test]
    fn test_server_target() {
        let g = server_target(&Config::default());
        assert_eq!(g.targets, vec!["localhost:9000"]);
        assert_eq!(g.labels[LABEL_METRICS_PATH], "/minio/metrics/v3");
        assert_eq!(g.labels[LABEL_SCHEME], "http");
        assert_eq!(g.labels[LABEL_INSTANCE], "localhost:9000");
        assert_eq!(g.labels[LABEL_JOB], "minio-server");
        assert!(!g.labels.contains_key(LABEL_BUCKET));
    }

    #[test]
    fn test_scrape_configs_with_buckets() {
        let config = config_with("prod-*", "");
        let configs = scrape_configs(&[bucket("prod-a"), bucket("dev-b")], &config);

        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].job_name, "minio-server");
        assert_eq!(configs[0].metrics_path, "/minio/metrics/v3");
        assert_eq!(configs[0].scrape_interval, "15s");
        assert_eq!(configs[0].scrape_timeout, "10s");
        assert_eq!(configs[0].static_configs, vec![server_target(&config)]);

        let buckets_job = &configs[1];
        assert_eq!(buckets_job.job_name, "minio-buckets");
        assert_eq!(buckets_job.metrics_path, "/minio/metrics/v3/bucket/api");
        assert_eq!(
            buckets_job.static_configs[0].labels[LABEL_BUCKET_PATTERN],
            "prod-*"
        );
    }

    #[test]
    fn test_scrape_configs_without_matching_buckets() {
        let config = config_with("prod-*", "");
        let configs = scrape_configs(&[bucket("dev-b")], &config);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].job_name, "minio-server");
    }

    #[test]
    fn test_target_group_json_shape() {
        let json = serde_json::to_value(server_target(&Config::default())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "targets": ["localhost:9000"],
                "labels": {
                    "__metrics_path__": "/minio/metrics/v3",
                    "__scheme__": "http",
                    "instance": "localhost:9000",
                    "job": "minio-server"
                }
            })
        );
    }
}
