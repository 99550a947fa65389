//! Health check and documentation page.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::AppState;

/// Body of `GET /health`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    /// `healthy` or `unhealthy`.
    pub status: String,
    /// Why the cluster could not be reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 time of the check.
    pub timestamp: String,
}

/// `GET /health` -- healthy when the cluster answers a bucket listing.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Cluster reachable", body = HealthStatus),
        (status = 503, description = "Cluster unreachable", body = HealthStatus)
    )
)]
pub async fn health(state: Arc<AppState>) -> Response {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    match state.lister.list_buckets().await {
        Ok(_) => {
            debug!("Health check passed - MinIO connection successful");
            (
                StatusCode::OK,
                Json(HealthStatus {
                    status: "healthy".to_string(),
                    error: None,
                    timestamp,
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Health check failed - MinIO connection error: {e:#}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthStatus {
                    status: "unhealthy".to_string(),
                    error: Some(format!("{e:#}")),
                    timestamp,
                }),
            )
                .into_response()
        }
    }
}

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>MinIO Prometheus Service Discovery</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; }
        .endpoint { background: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 5px; }
        .method { color: #0066cc; font-weight: bold; }
        .url { font-family: monospace; }
    </style>
</head>
<body>
    <h1>MinIO Prometheus Service Discovery</h1>
    <p>Prometheus HTTP service discovery for MinIO v3 metrics.</p>

    <h2>Endpoints</h2>
    <div class="endpoint">
        <span class="method">GET</span> <span class="url">/sd?job={server_job}</span>
        <p>Targets for MinIO server metrics</p>
    </div>
    <div class="endpoint">
        <span class="method">GET</span> <span class="url">/sd?job={bucket_job}</span>
        <p>Targets for per-bucket metrics, filtered by include pattern <code>{bucket_pattern}</code> and exclude pattern <code>{bucket_exclude_pattern}</code></p>
    </div>
    <div class="endpoint">
        <span class="method">GET</span> <span class="url">/scrape_configs</span>
        <p>All available scrape configurations</p>
    </div>
    <div class="endpoint">
        <span class="method">GET</span> <span class="url">/health</span>
        <p>Health check (JSON status)</p>
    </div>
    <div class="endpoint">
        <span class="method">GET</span> <span class="url">/metrics</span>
        <p>Metrics of this service</p>
    </div>
    <div class="endpoint">
        <span class="method">GET</span> <span class="url">/openapi.json</span>
        <p>OpenAPI document</p>
    </div>

    <h2>Configuration</h2>
    <p>Flags win over environment variables, which win over the YAML file given with <code>--config</code>.</p>
    <ul>
        <li><strong>MINIO_ENDPOINT</strong>: MinIO server endpoint (default: localhost:9000)</li>
        <li><strong>MINIO_ACCESS_KEY</strong>: MinIO access key (default: minioadmin)</li>
        <li><strong>MINIO_SECRET_KEY</strong>: MinIO secret key (default: minioadmin)</li>
        <li><strong>MINIO_USE_SSL</strong>: Use TLS for MinIO (default: false)</li>
        <li><strong>MINIO_REGION</strong>: Signing region (default: us-east-1)</li>
        <li><strong>LISTEN_ADDR</strong>: Address to listen on (default: :8080)</li>
        <li><strong>SCRAPE_INTERVAL</strong>: Scrape interval (default: 15s)</li>
        <li><strong>SCRAPE_TIMEOUT</strong>: Scrape timeout (default: 10s)</li>
        <li><strong>METRICS_PATH</strong>: MinIO metrics base path (default: /minio/metrics/v3)</li>
        <li><strong>BUCKET_PATTERN</strong>: Wildcard pattern for bucket inclusion (default: *)</li>
        <li><strong>BUCKET_EXCLUDE_PATTERN</strong>: Wildcard pattern for bucket exclusion (default: empty)</li>
    </ul>
</body>
</html>
"#;

/// `GET /` -- HTML page describing the endpoints and configuration.
pub async fn index(state: Arc<AppState>) -> Html<String> {
    let d = &state.config.discovery;
    Html(render(
        INDEX_TEMPLATE,
        &[
            ("server_job", escape_html(&d.server_job)),
            ("bucket_job", escape_html(&d.bucket_job)),
            ("bucket_pattern", escape_html(&d.bucket_pattern)),
            ("bucket_exclude_pattern", escape_html(&d.bucket_exclude_pattern)),
        ],
    ))
}

/// Replace `{name}` placeholders in one pass. Substituted text is never
/// rescanned, and unknown braces are copied as is.
fn render(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = vars.iter().find(|(key, _)| {
            tail.strip_prefix(key)
                .is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("prod-*"), "prod-*");
        assert_eq!(escape_html("<a href='x'>"), "&lt;a href=&#39;x&#39;&gt;");
    }

    #[test]
    fn test_render_substitutes_once() {
        let vars = [
            ("a", "{b}".to_string()),
            ("b", "B".to_string()),
        ];
        assert_eq!(render("x {a} {b} {c} { }", &vars), "x {b} B {c} { }");
    }

    #[tokio::test]
    async fn test_index_does_not_expand_config_values() {
        let mut config = crate::config::Config::default();
        config.discovery.server_job = "{bucket_pattern}".to_string();
        config.discovery.bucket_pattern = "prod-<*>".to_string();
        let state = Arc::new(AppState {
            config,
            lister: Arc::new(crate::storage::memory::MemoryBucketLister::new(vec![])),
        });

        let Html(page) = index(state).await;
        assert!(page.contains("/sd?job={bucket_pattern}"));
        assert!(page.contains("<code>prod-&lt;*&gt;</code>"));
        assert!(!page.contains("{server_job}"));
        assert!(page.contains("body { font-family"));
    }

    #[test]
    fn test_health_status_omits_empty_error() {
        let json = serde_json::to_value(HealthStatus {
            status: "healthy".to_string(),
            error: None,
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        })
        .unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["status"], "healthy");
    }
}
