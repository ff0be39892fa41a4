//! Request handling for the metalink server
//!
//! [`MetalinkService`] owns every per-process collaborator (catalog,
//! upstream fetcher, selector, response cache, metrics) and turns one HTTP
//! request into one response. Nothing here is mutated per request except the
//! cache and the metrics counters.

use crate::cache::ResponseCache;
use crate::catalog::{load_mirrors, open_catalog, MirrorCatalog};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::metadata_fetcher::MetadataFetcher;
use crate::metalink::{self, MetalinkDocument};
use crate::metrics::MetalinkMetrics;
use crate::models::MetalinkQuery;
use crate::origin::OriginResolver;
use crate::selector::{fan_out, filter_by_arch, MirrorSelector};
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handles requests against the metalink server
pub struct MetalinkService {
    config: Arc<ServerConfig>,
    catalog: Arc<dyn MirrorCatalog>,
    fetcher: MetadataFetcher,
    selector: MirrorSelector,
    resolver: OriginResolver,
    cache: Option<ResponseCache>,
    metrics: Arc<MetalinkMetrics>,
}

impl MetalinkService {
    /// Create a service using the catalog described by the configuration
    pub fn new(config: Arc<ServerConfig>) -> Result<Self> {
        let catalog = open_catalog(&config.catalog)?;
        Self::with_catalog(config, catalog)
    }

    /// Create a service around an already opened catalog
    pub fn with_catalog(
        config: Arc<ServerConfig>,
        catalog: Arc<dyn MirrorCatalog>,
    ) -> Result<Self> {
        config.validate()?;

        let fetcher = MetadataFetcher::with_timeout(
            config.upstream_base_url.clone(),
            config.upstream_timeout(),
        )?;
        let selector = MirrorSelector::with_max_mirrors(config.selection.max_mirrors);
        let resolver = OriginResolver::new(&config.geo_header)?;
        let cache = config
            .cache
            .enabled
            .then(|| ResponseCache::new(config.cache_ttl(), config.cache.max_entries));

        Ok(MetalinkService {
            config,
            catalog,
            fetcher,
            selector,
            resolver,
            cache,
            metrics: Arc::new(MetalinkMetrics::new()),
        })
    }

    pub fn metrics(&self) -> &Arc<MetalinkMetrics> {
        &self.metrics
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    /// Drop expired responses from the cache once per TTL
    ///
    /// Returns `None` when caching is disabled. The task ends once the
    /// service itself has been dropped.
    pub fn spawn_cache_cleanup(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let ttl = self.cache.as_ref()?.ttl();
        let service = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(ttl);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(service) = service.upgrade() else {
                    break;
                };
                if let Some(cache) = service.cache() {
                    let removed = cache.cleanup_expired();
                    if removed > 0 {
                        debug!("Removed {} expired responses from cache", removed);
                    }
                }
            }
        }))
    }

    /// Route a request to its handler
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        let (parts, _) = req.into_parts();
        debug!("{} {}", parts.method, parts.uri);

        match parts.uri.path() {
            "/" | "/metalink" | "/health" if parts.method != Method::GET => {
                let mut response = error_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "Only GET is allowed",
                );
                response
                    .headers_mut()
                    .insert(header::ALLOW, HeaderValue::from_static("GET"));
                response
            }
            "/" => self.redirect_home(),
            "/health" => json_response(StatusCode::OK, r#"{"status":"healthy"}"#.to_string()),
            "/metalink" => self.handle_metalink(parts.uri.query(), &parts.headers).await,
            _ => error_response(StatusCode::NOT_FOUND, "Not Found"),
        }
    }

    fn redirect_home(&self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::FOUND;
        match HeaderValue::from_str(&self.config.homepage) {
            Ok(location) => {
                response.headers_mut().insert(header::LOCATION, location);
                response
            }
            Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Invalid homepage"),
        }
    }

    /// Handle `GET /metalink`
    pub async fn handle_metalink(
        &self,
        query: Option<&str>,
        headers: &HeaderMap,
    ) -> Response<Full<Bytes>> {
        let start = Instant::now();
        self.metrics.record_request();

        let response = match self.metalink_body(query, headers).await {
            Ok(body) => {
                let mut response = Response::new(Full::new(body));
                let cache_control = format!("max-age={}", self.config.cache.ttl_secs);
                let headers = response.headers_mut();
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(metalink::CONTENT_TYPE),
                );
                if let Ok(value) = HeaderValue::from_str(&cache_control) {
                    headers.insert(header::CACHE_CONTROL, value);
                }
                response
            }
            Err(e) => {
                self.metrics.record_error(&e);
                if e.is_upstream() {
                    warn!("Metalink request failed: query={:?}: {}", query, e);
                } else {
                    debug!("Metalink request rejected: query={:?}: {}", query, e);
                }
                let status = StatusCode::from_u16(e.to_http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                error_response(status, &e.to_string())
            }
        };

        self.metrics.record_request_duration(start.elapsed());
        response
    }

    /// Produce the rendered document for a request, consulting the cache
    pub async fn metalink_body(
        &self,
        raw_query: Option<&str>,
        headers: &HeaderMap,
    ) -> Result<Bytes> {
        let query = MetalinkQuery::parse(raw_query)?;
        let origin = self.resolver.resolve(&query, headers);

        let cache_key = self.cache.as_ref().map(|cache| {
            cache.generate_cache_key(raw_query.unwrap_or(""), origin.as_ref())
        });

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(body) = cache.lookup(key) {
                self.metrics.record_cache_hit();
                return Ok(body);
            }
            self.metrics.record_cache_miss();
        }

        // The catalog decides whether the repository exists at all; the
        // upstream is only contacted for known repositories.
        let mirrors = load_mirrors(self.catalog.as_ref(), &query.repo).await?;
        let mirrors = filter_by_arch(mirrors, query.arch.as_deref());

        let selected = self.selector.select(origin.as_ref(), &mirrors);
        let advertised = fan_out(&selected);

        let fetch_start = Instant::now();
        let fetched = self.fetcher.fetch_repomd(&query.repo).await;
        self.metrics.record_upstream_fetch(fetch_start.elapsed());
        let info = fetched?;

        let document = MetalinkDocument::new(
            self.config.generator.clone(),
            self.config.max_connections,
            info,
            &advertised,
        );
        let body = Bytes::from(document.render()?);

        info!(
            "Served metalink: repo={}, arch={:?}, origin={:?}, mirrors={}, resources={}",
            query.repo,
            query.arch,
            origin.as_ref().map(|c| c.as_str()),
            selected.len(),
            advertised.len()
        );
        self.metrics.record_served(selected.len(), advertised.len());

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            cache.store(key, body.clone());
        }

        Ok(body)
    }
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// JSON error body: `{"error": "...", "status": 404}`
fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": message,
        "status": status.as_u16(),
    });
    json_response(status, body.to_string())
}
