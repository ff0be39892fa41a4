//! Integration tests for MetalinkServer over a real TCP socket

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tetsudou::config::ServerConfig;
use tetsudou::{MemoryCatalog, MetalinkServer, MetalinkService, Mirror, Protocol};
use tokio::net::TcpListener;
use tokio::time::timeout;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn start_server(
    upstream_uri: String,
) -> (String, tokio::task::JoinHandle<std::io::Result<()>>) {
    let mut catalog = MemoryCatalog::new();
    catalog
        .insert_mirrors(
            "rawhide",
            &[
                Mirror::new("mirror1.example", vec![Protocol::Https], 10).with_country("US"),
                Mirror::new("mirror2.example", vec![Protocol::Https, Protocol::Http], 20)
                    .with_country("DE"),
            ],
        )
        .unwrap();

    let config = ServerConfig {
        upstream_base_url: upstream_uri,
        ..ServerConfig::default()
    };
    let service =
        Arc::new(MetalinkService::with_catalog(Arc::new(config), Arc::new(catalog)).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = MetalinkServer::from_listener(service, listener);
    let base = format!("http://{}", server.local_addr().unwrap());
    let handle = tokio::spawn(server.run());
    (base, handle)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_serves_metalink_over_http() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rawhide/repodata/tetsudou.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "timestamp": 1718000000,
            "size": 5231,
            "hashes": {"sha256": "9b71d224"}
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let (base, handle) = start_server(upstream.uri()).await;

    let response = timeout(
        Duration::from_secs(5),
        client()
            .get(format!("{}/metalink?repo=rawhide", base))
            .header("CF-IPCountry", "US")
            .send(),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/metalink+xml; charset=utf-8"
    );
    let body = response.text().await.unwrap();
    assert!(body.contains("<size>5231</size>"));

    let first = body.find("mirror1.example").unwrap();
    let second = body.find("mirror2.example").unwrap();
    assert!(first < second);

    handle.abort();
}

#[tokio::test]
async fn test_root_redirect_and_errors_over_http() {
    let upstream = MockServer::start().await;
    let (base, handle) = start_server(upstream.uri()).await;
    let client = client();

    let response = client.get(format!("{}/", base)).send().await.unwrap();
    assert_eq!(response.status(), 302);
    assert_eq!(
        response.headers()["location"],
        "https://github.com/terrapkg/tetsudou"
    );

    let response = client
        .get(format!("{}/metalink?repo=terra99", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No mirrors found for this repo");

    let response = client
        .delete(format!("{}/metalink?repo=rawhide", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);

    let response = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(response.status(), 200);

    handle.abort();
}
