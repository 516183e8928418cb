//! Networked file server backend (WebDAV)

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;

use super::xml::collect_records;
use super::{check_status, encode_segment, send_error, BackendKind, RemoteEntry, StorageBackend};
use crate::archive::BackupName;
use crate::backup::{BackupError, BackupResult};

const KIND: BackendKind = BackendKind::WebDav;

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontentlength/>
    <d:getlastmodified/>
  </d:prop>
</d:propfind>"#;

/// WebDAV collection holding archives as direct children
#[derive(Clone)]
pub struct WebDavBackend {
    client: Client,
    base_url: String,
    user: String,
    password: String,
}

impl fmt::Debug for WebDavBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDavBackend")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl WebDavBackend {
    pub fn new(client: Client, base_url: &str, user: &str, password: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
        }
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, encode_segment(name))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.client.request(method, url);
        if self.user.is_empty() {
            request
        } else {
            request.basic_auth(&self.user, Some(&self.password))
        }
    }
}

fn parse_multistatus(body: &str) -> BackupResult<Vec<RemoteEntry>> {
    let records = collect_records(
        body,
        "response",
        &["href", "getcontentlength", "getlastmodified", "collection"],
    )
    .map_err(|e| BackupError::transport(KIND, format!("invalid PROPFIND response: {}", e)))?;

    Ok(records
        .into_iter()
        .filter(|r| !r.contains_key("collection"))
        .filter_map(|r| {
            let href = r.get("href")?.trim();
            if href.ends_with('/') {
                return None;
            }
            let segment = href.rsplit('/').next()?;
            let name = percent_decode_str(segment).decode_utf8_lossy().into_owned();
            if name.is_empty() {
                return None;
            }
            let size = r
                .get("getcontentlength")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0);
            let modified = r
                .get("getlastmodified")
                .and_then(|t| DateTime::parse_from_rfc2822(t.trim()).ok())
                .map(|t| t.with_timezone(&Utc))
                .or_else(|| BackupName::parse(&name).map(|n| n.timestamp.and_utc()))?;
            Some(RemoteEntry {
                name,
                size,
                modified,
            })
        })
        .collect())
}

#[async_trait]
impl StorageBackend for WebDavBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn write(&self, name: &str, data: Vec<u8>) -> BackupResult<()> {
        let bytes = data.len();
        let response = self
            .request(Method::PUT, &self.file_url(name))
            .body(data)
            .send()
            .await
            .map_err(|e| send_error(KIND, e))?;
        check_status(KIND, name, response)?;
        debug!(file = %name, bytes, "webdav upload complete");
        Ok(())
    }

    async fn read(&self, name: &str) -> BackupResult<Vec<u8>> {
        let response = self
            .request(Method::GET, &self.file_url(name))
            .send()
            .await
            .map_err(|e| send_error(KIND, e))?;
        let bytes = check_status(KIND, name, response)?
            .bytes()
            .await
            .map_err(|e| send_error(KIND, e))?;
        Ok(bytes.to_vec())
    }

    async fn list(&self, prefix: &str) -> BackupResult<Vec<RemoteEntry>> {
        let propfind = Method::from_bytes(b"PROPFIND")
            .map_err(|e| BackupError::transport(KIND, e.to_string()))?;
        let response = self
            .request(propfind, &format!("{}/", self.base_url))
            .header("Depth", "1")
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(PROPFIND_BODY)
            .send()
            .await
            .map_err(|e| send_error(KIND, e))?;
        let body = check_status(KIND, &self.base_url, response)?
            .text()
            .await
            .map_err(|e| send_error(KIND, e))?;

        let mut entries = parse_multistatus(&body)?;
        entries.retain(|e| e.name.starts_with(prefix));
        Ok(entries)
    }

    async fn delete(&self, name: &str) -> BackupResult<()> {
        let response = self
            .request(Method::DELETE, &self.file_url(name))
            .send()
            .await
            .map_err(|e| send_error(KIND, e))?;
        check_status(KIND, name, response)?;
        Ok(())
    }
}
