//! # Remote Storage Backends
//!
//! One contract over two kinds of remote store:
//!
//! - [`WebDavBackend`]: networked file server, basic auth, hierarchical paths
//! - [`S3Backend`]: object storage, path-style bucket/key addressing, SigV4
//!   with a static credential pair and a custom endpoint
//!
//! Backends are built per call from the current [`BackupConfig`] by a
//! [`BackendFactory`], so credentials never outlive the operation that used
//! them. A backend that is not configured fails in the factory, before any
//! network traffic.

mod s3;
mod sigv4;
mod webdav;
mod xml;

pub use s3::S3Backend;
pub use webdav::WebDavBackend;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::backup::{BackupError, BackupResult};
use crate::config::BackupConfig;

/// Remote store flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    WebDav,
    S3,
}

impl BackendKind {
    /// Failover order for automatic backups
    pub const PRIORITY: [BackendKind; 2] = [BackendKind::WebDav, BackendKind::S3];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::WebDav => "webdav",
            BackendKind::S3 => "s3",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webdav" => Ok(BackendKind::WebDav),
            "s3" => Ok(BackendKind::S3),
            _ => Err(BackupError::configuration(format!(
                "unsupported backend: {}",
                s
            ))),
        }
    }
}

/// One object in a remote listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Uniform remote store contract
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Store `data` under `name`
    async fn write(&self, name: &str, data: Vec<u8>) -> BackupResult<()>;

    /// Fetch the object called `name`
    async fn read(&self, name: &str) -> BackupResult<Vec<u8>>;

    /// Objects whose name starts with `prefix`
    async fn list(&self, prefix: &str) -> BackupResult<Vec<RemoteEntry>>;

    async fn delete(&self, name: &str) -> BackupResult<()>;
}

/// Builds a backend from the current configuration
pub trait BackendFactory: Send + Sync + fmt::Debug {
    fn open(
        &self,
        kind: BackendKind,
        config: &BackupConfig,
    ) -> BackupResult<Arc<dyn StorageBackend>>;
}

/// Factory for the real HTTP backends
///
/// Holds only the connection pool; credentials come from the config passed
/// to each `open`.
#[derive(Debug, Clone)]
pub struct RemoteBackends {
    client: reqwest::Client,
}

impl RemoteBackends {
    /// Every request made through these backends is bounded by `timeout`.
    pub fn new(timeout: Duration) -> BackupResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackupError::configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl BackendFactory for RemoteBackends {
    fn open(
        &self,
        kind: BackendKind,
        config: &BackupConfig,
    ) -> BackupResult<Arc<dyn StorageBackend>> {
        config.require_access(kind)?;
        Ok(match kind {
            BackendKind::WebDav => Arc::new(WebDavBackend::new(
                self.client.clone(),
                &config.webdav_url,
                &config.webdav_user,
                &config.webdav_password,
            )),
            BackendKind::S3 => Arc::new(S3Backend::new(
                self.client.clone(),
                &config.s3_endpoint,
                &config.s3_region,
                &config.s3_bucket,
                &config.s3_access_key,
                &config.s3_secret_key,
            )?),
        })
    }
}

/// Map a response status onto the error taxonomy
pub(crate) fn check_status(
    kind: BackendKind,
    name: &str,
    response: Response,
) -> BackupResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(BackupError::NotFound {
            backend: kind,
            name: name.to_string(),
        });
    }
    Err(BackupError::transport(
        kind,
        format!("unexpected status {} for {}", status, name),
    ))
}

/// Everything except RFC 3986 unreserved characters
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode one URL path segment or query value for either backend
pub(crate) fn encode_segment(s: &str) -> String {
    utf8_percent_encode(s, PATH_SEGMENT).to_string()
}

pub(crate) fn send_error(kind: BackendKind, err: reqwest::Error) -> BackupError {
    if err.is_timeout() {
        BackupError::transport(kind, "request timed out")
    } else {
        BackupError::transport(kind, err.to_string())
    }
}
