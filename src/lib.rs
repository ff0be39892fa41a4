//! Tetsudou
//!
//! A dynamic metalink server for package repositories. For a repository and
//! an optional architecture it looks up the known mirrors, keeps the ones
//! able to serve that architecture, ranks them for the requesting client and
//! answers with a metalink 3.0 document listing those mirrors together with
//! the size, timestamp and hashes of `repomd.xml`.
//!
//! # Mirror selection
//!
//! Mirrors located in the client's country come first. Inside each group
//! mirrors are ordered by descending operator preference, and mirrors with
//! equal preference keep their catalog order. Without a known client country
//! the ordering is a plain preference sort. See [`MirrorSelector`].
//!
//! # Architecture
//!
//! - [`MirrorCatalog`]: key-value store with the mirror list of each repository
//! - [`MirrorSelector`]: ranks architecture-compatible mirrors for a client
//! - [`MetadataFetcher`]: fetches release metadata from the repository host
//! - [`MetalinkDocument`]: renders the XML document
//! - [`ResponseCache`]: short-lived cache of rendered documents
//! - [`MetalinkService`]: routes requests and ties the pieces together
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tetsudou::{MetalinkServer, MetalinkService, ServerConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(ServerConfig::from_file("tetsudou.yaml")?);
//! let addr: std::net::SocketAddr = config.listen_address.parse()?;
//! let service = Arc::new(MetalinkService::new(config)?);
//! MetalinkServer::bind(service, addr).await?.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod metadata_fetcher;
pub mod metalink;
pub mod metrics;
pub mod metrics_endpoint;
pub mod models;
pub mod origin;
pub mod selector;
pub mod server;
pub mod service;

// Re-export commonly used types
pub use cache::{CacheStats, ResponseCache};
pub use catalog::{load_mirrors, DirectoryCatalog, MemoryCatalog, MirrorCatalog};
pub use config::ServerConfig;
pub use error::{MetalinkError, Result};
pub use metadata_fetcher::MetadataFetcher;
pub use metalink::MetalinkDocument;
pub use metrics::{MetalinkMetrics, MetricsSnapshot};
pub use metrics_endpoint::MetricsEndpoint;
pub use models::{CountryCode, MetalinkQuery, Mirror, Protocol, RepomdInfo};
pub use origin::OriginResolver;
pub use selector::{fan_out, filter_by_arch, Advertised, MirrorSelector};
pub use server::MetalinkServer;
pub use service::MetalinkService;
