//! Object storage backend (S3 API, path-style)

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Url};
use tracing::debug;

use super::sigv4::{self, Credentials};
use super::xml::collect_records;
use super::{check_status, encode_segment, send_error, BackendKind, RemoteEntry, StorageBackend};
use crate::backup::{BackupError, BackupResult};

const DEFAULT_REGION: &str = "us-east-1";
const KIND: BackendKind = BackendKind::S3;

/// S3-compatible bucket addressed as `{endpoint}/{bucket}/{key}`
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    endpoint: Url,
    region: String,
    bucket: String,
    access_key: String,
    secret_key: String,
}

impl fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Backend")
            .field("endpoint", &self.endpoint.as_str())
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    pub fn new(
        client: Client,
        endpoint: &str,
        region: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
    ) -> BackupResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            BackupError::configuration(format!("invalid S3 endpoint {}: {}", endpoint, e))
        })?;
        if endpoint.host_str().is_none() {
            return Err(BackupError::configuration("invalid S3 endpoint: missing host"));
        }
        let region = if region.is_empty() {
            DEFAULT_REGION
        } else {
            region
        };
        Ok(Self {
            client,
            endpoint,
            region: region.to_string(),
            bucket: bucket.to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    fn bucket_path(&self) -> String {
        format!(
            "{}/{}",
            self.endpoint.path().trim_end_matches('/'),
            encode_segment(&self.bucket)
        )
    }

    fn object_url(&self, key: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.set_path(&format!("{}/{}", self.bucket_path(), encode_segment(key)));
        url.set_query(None);
        url
    }

    fn list_url(&self, prefix: &str, token: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        url.set_path(&self.bucket_path());
        let mut query = format!("list-type=2&prefix={}", encode_segment(prefix));
        if let Some(token) = token {
            query.push_str("&continuation-token=");
            query.push_str(&encode_segment(token));
        }
        url.set_query(Some(&query));
        url
    }

    fn signed(&self, method: Method, url: Url, body: Vec<u8>) -> RequestBuilder {
        let creds = Credentials {
            access_key: &self.access_key,
            secret_key: &self.secret_key,
            region: &self.region,
        };
        let signature = sigv4::sign(method.as_str(), &url, &body, &creds, Utc::now());
        let request = self
            .client
            .request(method, url)
            .header("x-amz-date", signature.amz_date)
            .header("x-amz-content-sha256", signature.content_sha256)
            .header("authorization", signature.authorization);
        if body.is_empty() {
            request
        } else {
            request.body(body)
        }
    }

    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&str>,
    ) -> BackupResult<(Vec<RemoteEntry>, Option<String>)> {
        let response = self
            .signed(Method::GET, self.list_url(prefix, token), Vec::new())
            .send()
            .await
            .map_err(|e| send_error(KIND, e))?;
        let body = check_status(KIND, &self.bucket, response)?
            .text()
            .await
            .map_err(|e| send_error(KIND, e))?;
        parse_list_page(&body)
    }
}

fn xml_error(err: quick_xml::Error) -> BackupError {
    BackupError::transport(KIND, format!("invalid ListObjectsV2 response: {}", err))
}

fn parse_list_page(body: &str) -> BackupResult<(Vec<RemoteEntry>, Option<String>)> {
    let entries = collect_records(body, "Contents", &["Key", "Size", "LastModified"])
        .map_err(xml_error)?
        .into_iter()
        .filter_map(|record| {
            let name = record.get("Key")?.clone();
            let size = record.get("Size").and_then(|s| s.trim().parse().ok()).unwrap_or(0);
            let modified = record
                .get("LastModified")
                .and_then(|t| DateTime::parse_from_rfc3339(t.trim()).ok())?
                .with_timezone(&Utc);
            Some(RemoteEntry {
                name,
                size,
                modified,
            })
        })
        .collect();

    let next = collect_records(body, "ListBucketResult", &["IsTruncated", "NextContinuationToken"])
        .map_err(xml_error)?
        .into_iter()
        .next()
        .filter(|r| r.get("IsTruncated").map(|t| t.trim() == "true").unwrap_or(false))
        .and_then(|r| r.get("NextContinuationToken").cloned())
        .filter(|t| !t.is_empty());

    Ok((entries, next))
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn write(&self, name: &str, data: Vec<u8>) -> BackupResult<()> {
        let bytes = data.len();
        let response = self
            .signed(Method::PUT, self.object_url(name), data)
            .send()
            .await
            .map_err(|e| send_error(KIND, e))?;
        check_status(KIND, name, response)?;
        debug!(bucket = %self.bucket, key = %name, bytes, "object uploaded");
        Ok(())
    }

    async fn read(&self, name: &str) -> BackupResult<Vec<u8>> {
        let response = self
            .signed(Method::GET, self.object_url(name), Vec::new())
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
        let mut entries = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let (page, next) = self.list_page(prefix, token.as_deref()).await?;
            entries.extend(page);
            match next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(entries)
    }

    async fn delete(&self, name: &str) -> BackupResult<()> {
        let response = self
            .signed(Method::DELETE, self.object_url(name), Vec::new())
            .send()
            .await
            .map_err(|e| send_error(KIND, e))?;
        check_status(KIND, name, response)?;
        Ok(())
    }
}
