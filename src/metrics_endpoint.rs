//! Metrics HTTP Endpoint
//!
//! Serves [`MetalinkMetrics`] in Prometheus text format on a separate
//! address, next to a small health check.

use crate::metrics::{MetalinkMetrics, MetricsSnapshot};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Metrics endpoint server
pub struct MetricsEndpoint {
    metrics: Arc<MetalinkMetrics>,
    addr: SocketAddr,
}

impl MetricsEndpoint {
    /// Create a new metrics endpoint
    ///
    /// # Example
    /// ```no_run
    /// use tetsudou::metrics::MetalinkMetrics;
    /// use tetsudou::metrics_endpoint::MetricsEndpoint;
    /// use std::sync::Arc;
    ///
    /// let metrics = Arc::new(MetalinkMetrics::new());
    /// let endpoint = MetricsEndpoint::new(metrics, "127.0.0.1:9090".parse().unwrap());
    /// ```
    pub fn new(metrics: Arc<MetalinkMetrics>, addr: SocketAddr) -> Self {
        Self { metrics, addr }
    }

    /// Start the metrics endpoint server
    ///
    /// Serves `/metrics` and `/health` until the process exits.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Metrics available at http://{}/metrics", listener.local_addr()?);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let metrics = Arc::clone(&self.metrics);

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let metrics = Arc::clone(&metrics);
                    async move { handle_request(req, metrics).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving metrics connection: {:?}", err);
                }
            });
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<MetalinkMetrics>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let (status, content_type, body) = match req.uri().path() {
        "/metrics" => (
            StatusCode::OK,
            "text/plain; version=0.0.4; charset=utf-8",
            format_prometheus_metrics(&metrics.get_stats()),
        ),
        "/health" => (
            StatusCode::OK,
            "application/json",
            r#"{"status":"healthy"}"#.to_string(),
        ),
        _ => (StatusCode::NOT_FOUND, "text/plain", "404 Not Found".to_string()),
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static(content_type),
    );
    Ok(response)
}

fn push_metric(
    output: &mut String,
    name: &str,
    help: &str,
    kind: &str,
    value: impl std::fmt::Display,
) {
    // Writing to a String cannot fail
    let _ = writeln!(output, "# HELP tetsudou_{} {}", name, help);
    let _ = writeln!(output, "# TYPE tetsudou_{} {}", name, kind);
    let _ = writeln!(output, "tetsudou_{} {}", name, value);
    output.push('\n');
}

/// Format metrics in Prometheus exposition format
fn format_prometheus_metrics(snapshot: &MetricsSnapshot) -> String {
    let mut output = String::new();

    let counters = [
        ("requests_total", "Total number of metalink requests", snapshot.total_requests),
        (
            "documents_served_total",
            "Number of metalink documents served",
            snapshot.served_documents,
        ),
        ("not_found_total", "Requests for repositories without mirrors", snapshot.not_found),
        (
            "invalid_requests_total",
            "Requests rejected before any lookup",
            snapshot.invalid_requests,
        ),
        (
            "upstream_failures_total",
            "Requests failed by the upstream metadata fetch",
            snapshot.upstream_failures,
        ),
        ("internal_errors_total", "Requests failed by internal errors", snapshot.internal_errors),
        ("cache_hits_total", "Number of response cache hits", snapshot.cache_hits),
        ("cache_misses_total", "Number of response cache misses", snapshot.cache_misses),
        (
            "mirrors_advertised_total",
            "Mirrors listed across served documents",
            snapshot.mirrors_advertised,
        ),
        (
            "resources_advertised_total",
            "URL entries listed across served documents",
            snapshot.resources_advertised,
        ),
        ("upstream_fetches_total", "Upstream metadata fetches", snapshot.upstream_fetches),
    ];
    for (name, help, value) in counters {
        push_metric(&mut output, name, help, "counter", value);
    }

    let gauges = [
        ("cache_hit_rate", "Response cache hit rate percentage", snapshot.cache_hit_rate()),
        (
            "mirrors_per_document_avg",
            "Average number of mirrors per served document",
            snapshot.avg_mirrors_per_document(),
        ),
        (
            "request_duration_ms_avg",
            "Average request duration in milliseconds",
            snapshot.avg_request_duration_ms(),
        ),
        (
            "upstream_duration_ms_avg",
            "Average upstream fetch duration in milliseconds",
            snapshot.avg_upstream_duration_ms(),
        ),
    ];
    for (name, help, value) in gauges {
        push_metric(&mut output, name, help, "gauge", format!("{:.2}", value));
    }

    output
}
