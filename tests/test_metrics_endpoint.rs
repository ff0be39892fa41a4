//! Integration tests for the metrics endpoint
//!
//! These tests verify that the metrics HTTP endpoint exposes the server
//! counters in Prometheus format.

use std::sync::Arc;
use std::time::Duration;
use tetsudou::{MetalinkError, MetalinkMetrics, MetricsEndpoint};
use tokio::time::timeout;

async fn free_addr() -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener); // Release the port
    addr
}

#[tokio::test]
async fn test_metrics_endpoint_serves_metrics() {
    let metrics = Arc::new(MetalinkMetrics::new());
    metrics.record_request();
    metrics.record_request();
    metrics.record_request();
    metrics.record_served(2, 3);
    metrics.record_error(&MetalinkError::no_mirrors());
    metrics.record_error(&MetalinkError::UpstreamFetch("down".into()));
    metrics.record_cache_hit();
    metrics.record_cache_miss();

    let addr = free_addr().await;
    let endpoint = MetricsEndpoint::new(Arc::clone(&metrics), addr);
    let handle = tokio::spawn(async move { endpoint.start().await });

    // Give the server time to start
    tokio::time::sleep(Duration::from_millis(200)).await;

    let url = format!("http://{}/metrics", addr);
    let result = timeout(Duration::from_secs(2), reqwest::get(&url)).await;
    handle.abort();

    let response = result.unwrap().unwrap();
    assert_eq!(response.status(), 200);

    let body = response.text().await.unwrap();
    assert!(body.contains("# HELP"));
    assert!(body.contains("# TYPE"));
    assert!(body.contains("tetsudou_requests_total 3"));
    assert!(body.contains("tetsudou_documents_served_total 1"));
    assert!(body.contains("tetsudou_not_found_total 1"));
    assert!(body.contains("tetsudou_upstream_failures_total 1"));
    assert!(body.contains("tetsudou_mirrors_advertised_total 2"));
    assert!(body.contains("tetsudou_resources_advertised_total 3"));
    assert!(body.contains("tetsudou_cache_hit_rate 50.00"));
}

#[tokio::test]
async fn test_metrics_endpoint_health_check() {
    let addr = free_addr().await;
    let endpoint = MetricsEndpoint::new(Arc::new(MetalinkMetrics::new()), addr);
    let handle = tokio::spawn(async move { endpoint.start().await });

    tokio::time::sleep(Duration::from_millis(200)).await;

    let url = format!("http://{}/health", addr);
    let result = timeout(Duration::from_secs(2), reqwest::get(&url)).await;
    handle.abort();

    let response = result.unwrap().unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("healthy"));
}

#[tokio::test]
async fn test_metrics_endpoint_not_found() {
    let addr = free_addr().await;
    let endpoint = MetricsEndpoint::new(Arc::new(MetalinkMetrics::new()), addr);
    let handle = tokio::spawn(async move { endpoint.start().await });

    tokio::time::sleep(Duration::from_millis(200)).await;

    let url = format!("http://{}/nonexistent", addr);
    let result = timeout(Duration::from_secs(2), reqwest::get(&url)).await;
    handle.abort();

    assert_eq!(result.unwrap().unwrap().status(), 404);
}
