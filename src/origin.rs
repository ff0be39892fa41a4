//! Client origin resolution

use crate::error::{MetalinkError, Result};
use crate::models::{CountryCode, MetalinkQuery};
use http::header::HeaderName;
use http::HeaderMap;
use tracing::debug;

/// Codes geolocation front-ends use when the country is not a real location
const UNKNOWN_CODES: &[&str] = &["XX", "T1"];

/// Works out which country a request comes from
#[derive(Debug, Clone)]
pub struct OriginResolver {
    geo_header: HeaderName,
}

impl OriginResolver {
    /// Create a resolver reading the country from `geo_header`
    pub fn new(geo_header: &str) -> Result<Self> {
        let geo_header = HeaderName::from_bytes(geo_header.as_bytes()).map_err(|e| {
            MetalinkError::ConfigError(format!("Invalid geo_header '{}': {}", geo_header, e))
        })?;
        Ok(OriginResolver { geo_header })
    }

    /// Resolve the client origin
    ///
    /// An explicit `country` query parameter wins. Otherwise the geolocation
    /// header is used. Missing or unusable values leave the origin unknown.
    pub fn resolve(&self, query: &MetalinkQuery, headers: &HeaderMap) -> Option<CountryCode> {
        if let Some(country) = &query.country {
            return self.known(country.clone());
        }

        let value = headers.get(&self.geo_header)?.to_str().ok()?;
        match CountryCode::parse(value) {
            Ok(country) => self.known(country),
            Err(_) => {
                debug!("Ignoring unusable {} header value: {:?}", self.geo_header, value);
                None
            }
        }
    }

    fn known(&self, country: CountryCode) -> Option<CountryCode> {
        if UNKNOWN_CODES.contains(&country.as_str()) {
            None
        } else {
            Some(country)
        }
    }
}
