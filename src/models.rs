//! Core data models for the metalink server

use crate::error::{MetalinkError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Path appended to every mirror URL in the generated document
pub const REPOMD_PATH: &str = "repodata/repomd.xml";

/// Transfer protocol a mirror can be reached over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Https,
    Http,
    Ftp,
    Rsync,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Https => "https",
            Protocol::Http => "http",
            Protocol::Ftp => "ftp",
            Protocol::Rsync => "rsync",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate download source as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    /// Host and path of the mirror, without scheme
    pub url: String,

    /// Protocols the mirror serves, in advertised order
    pub protocols: Vec<Protocol>,

    /// Location code of the mirror, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Architecture served by the mirror; `None` serves every architecture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,

    /// Operator-assigned weight, higher is preferred
    #[serde(default)]
    pub preference: i32,
}

impl Mirror {
    /// Create a new mirror serving all architectures
    pub fn new(url: impl Into<String>, protocols: Vec<Protocol>, preference: i32) -> Self {
        Mirror {
            url: url.into(),
            protocols,
            country: None,
            arch: None,
            preference,
        }
    }

    /// Set the mirror's location code
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Restrict the mirror to one architecture
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = Some(arch.into());
        self
    }

    /// Whether the mirror can serve the requested architecture
    ///
    /// A mirror without an arch tag serves everything. Otherwise its tag must
    /// equal the requested arch, so a request with no arch only matches
    /// arch-less mirrors.
    pub fn serves_arch(&self, requested: Option<&str>) -> bool {
        match (&self.arch, requested) {
            (None, _) => true,
            (Some(arch), Some(requested)) => arch == requested,
            (Some(_), None) => false,
        }
    }

    /// Whether the mirror is located in the given country
    pub fn is_in(&self, country: &CountryCode) -> bool {
        self.country
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(country.as_str()))
    }

    /// Fully-qualified URL of `repomd.xml` on this mirror for a protocol
    pub fn resource_url(&self, protocol: Protocol) -> String {
        format!(
            "{}://{}/{}",
            protocol,
            self.url.trim_end_matches('/'),
            REPOMD_PATH
        )
    }
}

/// Two-letter country code of a client, normalized to upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CountryCode(String);

impl CountryCode {
    /// Parse a country code
    ///
    /// Returns an error unless the value is exactly two ASCII letters.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.len() != 2 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MetalinkError::InvalidRequest(format!(
                "country must be a two-letter code, got: {}",
                value
            )));
        }
        Ok(CountryCode(value.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Release metadata published upstream next to `repomd.xml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepomdInfo {
    /// Modification time of `repomd.xml` (unix seconds)
    pub timestamp: i64,

    /// Size of `repomd.xml` in bytes
    pub size: u64,

    /// Hex digests keyed by algorithm name, in upstream order
    #[serde(default)]
    pub hashes: IndexMap<String, String>,
}

/// Validated query of a `GET /metalink` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetalinkQuery {
    pub repo: String,
    pub arch: Option<String>,
    pub country: Option<CountryCode>,
}

impl MetalinkQuery {
    /// Parse and validate a raw query string
    ///
    /// `repo` is required. Empty `arch`/`country` values count as absent.
    pub fn parse(query: Option<&str>) -> Result<Self> {
        let mut repo = None;
        let mut arch = None;
        let mut country = None;

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
            let value = value.trim();
            match key.as_ref() {
                "repo" => repo = Some(value.to_string()),
                "arch" if !value.is_empty() => arch = Some(value.to_string()),
                "country" if !value.is_empty() => country = Some(CountryCode::parse(value)?),
                _ => {}
            }
        }

        let repo = repo.ok_or_else(|| {
            MetalinkError::InvalidRequest("missing required query parameter: repo".to_string())
        })?;
        validate_repo(&repo)?;

        Ok(MetalinkQuery {
            repo,
            arch,
            country,
        })
    }
}

/// Repository names become catalog keys and upstream paths, so they are
/// restricted to a conservative character set.
fn validate_repo(repo: &str) -> Result<()> {
    if repo.is_empty() {
        return Err(MetalinkError::InvalidRequest("repo must not be empty".to_string()));
    }

    if repo == "." || repo == ".." {
        return Err(MetalinkError::InvalidRequest(format!("invalid repo: {}", repo)));
    }

    if let Some(c) = repo
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-')))
    {
        return Err(MetalinkError::InvalidRequest(format!(
            "repo contains invalid character {:?}",
            c
        )));
    }

    Ok(())
}
