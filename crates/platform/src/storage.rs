//! Object storage buckets

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{PlatformError, Result};

pub const COMPLIANCE_BUCKET: &str = "compliance";
pub const TENDER_DOCUMENTS_BUCKET: &str = "tenders_documents";
pub const TEMPLATES_BUCKET: &str = "templates";

/// One listing entry. Folders come back without an `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl ObjectEntry {
    pub fn is_folder(&self) -> bool {
        self.id.is_none()
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Direct children of `prefix`, sorted by name
    async fn list(&self, bucket: &str, prefix: &str, limit: usize, offset: usize) -> Result<Vec<ObjectEntry>>;

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;

    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Returns the paths that were removed
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<Vec<String>>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

#[derive(Clone, Default)]
pub struct MemoryObjectStorage {
    buckets: Arc<Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>>,
    failing: Arc<Mutex<BTreeSet<String>>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn buckets(&self) -> MutexGuard<'_, HashMap<String, BTreeMap<String, Vec<u8>>>> {
        self.buckets.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn put(&self, bucket: &str, path: &str, bytes: impl Into<Vec<u8>>) {
        self.buckets()
            .entry(bucket.to_string())
            .or_default()
            .insert(path.to_string(), bytes.into());
    }

    pub fn paths(&self, bucket: &str) -> Vec<String> {
        self.buckets()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every call against `bucket` fails until restored
    pub fn fail_bucket(&self, bucket: &str) {
        self.failing.lock().unwrap_or_else(|p| p.into_inner()).insert(bucket.to_string());
    }

    fn check(&self, bucket: &str) -> Result<()> {
        if self.failing.lock().unwrap_or_else(|p| p.into_inner()).contains(bucket) {
            return Err(PlatformError::status(500, format!("bucket {bucket} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn list(&self, bucket: &str, prefix: &str, limit: usize, offset: usize) -> Result<Vec<ObjectEntry>> {
        self.check(bucket)?;
        let prefix = prefix.trim_matches('/');
        let lead = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };

        let buckets = self.buckets();
        let mut children: BTreeMap<String, bool> = BTreeMap::new();
        if let Some(objects) = buckets.get(bucket) {
            for path in objects.keys() {
                let Some(rest) = path.strip_prefix(&lead) else {
                    continue;
                };
                match rest.split_once('/') {
                    Some((folder, _)) => {
                        children.entry(folder.to_string()).or_insert(true);
                    }
                    None => {
                        children.insert(rest.to_string(), false);
                    }
                }
            }
        }

        Ok(children
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(name, folder)| ObjectEntry {
                id: (!folder).then(|| format!("{lead}{name}")),
                name,
                metadata: None,
            })
            .collect())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        self.check(bucket)?;
        self.buckets()
            .get(bucket)
            .and_then(|objects| objects.get(path))
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("Object not found: {bucket}/{path}")))
    }

    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        self.check(bucket)?;
        self.put(bucket, path, bytes);
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<Vec<String>> {
        self.check(bucket)?;
        let mut buckets = self.buckets();
        let Some(objects) = buckets.get_mut(bucket) else {
            return Ok(Vec::new());
        };
        Ok(paths.iter().filter(|p| objects.remove(p.as_str()).is_some()).cloned().collect())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{bucket}/{path}")
    }
}

#[derive(Debug, Clone)]
pub struct RestObjectStorage {
    client: Client,
    base_url: String,
    api_key: String,
    bearer: String,
}

#[derive(Debug, Deserialize)]
struct StorageErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl RestObjectStorage {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PlatformError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            bearer: api_key.to_string(),
        })
    }

    pub fn with_bearer(mut self, token: &str) -> Self {
        self.bearer = token.trim_start_matches("Bearer ").to_string();
        self
    }

    fn url(&self, tail: &str) -> String {
        format!("{}/storage/v1/{}", self.base_url, tail)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.bearer))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StorageErrorBody>(&body)
            .ok()
            .and_then(|e| e.message.or(e.error))
            .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), body));
        match status.as_u16() {
            404 => Err(PlatformError::NotFound(message)),
            code => Err(PlatformError::status(code, message)),
        }
    }
}

#[async_trait]
impl ObjectStorage for RestObjectStorage {
    async fn list(&self, bucket: &str, prefix: &str, limit: usize, offset: usize) -> Result<Vec<ObjectEntry>> {
        let body = json!({
            "prefix": prefix,
            "limit": limit,
            "offset": offset,
            "sortBy": { "column": "name", "order": "asc" },
        });
        let response = self
            .authed(self.client.post(self.url(&format!("object/list/{bucket}"))))
            .json(&body)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        debug!(bucket, path, "download");
        let response = self
            .authed(self.client.get(self.url(&format!("object/{bucket}/{path}"))))
            .send()
            .await?;
        Ok(Self::check(response).await?.bytes().await?.to_vec())
    }

    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let response = self
            .authed(self.client.post(self.url(&format!("object/{bucket}/{path}"))))
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<Vec<String>> {
        let response = self
            .authed(self.client.delete(self.url(&format!("object/{bucket}"))))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        let removed: Vec<ObjectEntry> = Self::check(response).await?.json().await?;
        Ok(removed.into_iter().map(|e| e.name).collect())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.url(&format!("object/public/{bucket}/{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_memory_listing_separates_folders() {
        let storage = MemoryObjectStorage::new();
        storage.put("compliance", "u1/cidb/a.pdf", b"a".to_vec());
        storage.put("compliance", "u1/readme.txt", b"r".to_vec());
        storage.put("compliance", "u2/b.pdf", b"b".to_vec());

        let root = storage.list("compliance", "", 100, 0).await.unwrap();
        assert_eq!(root.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["u1", "u2"]);
        assert!(root.iter().all(ObjectEntry::is_folder));

        let inner = storage.list("compliance", "u1", 100, 0).await.unwrap();
        assert_eq!(inner.len(), 2);
        assert!(inner[0].is_folder());
        assert_eq!(inner[1].name, "readme.txt");
        assert!(!inner[1].is_folder());
    }

    #[tokio::test]
    async fn test_memory_remove_reports_removed_paths() {
        let storage = MemoryObjectStorage::new();
        storage.put("tenders_documents", "x/a.pdf", b"a".to_vec());

        let removed = storage
            .remove("tenders_documents", &["x/a.pdf".to_string(), "x/missing.pdf".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, vec!["x/a.pdf".to_string()]);
        assert!(storage.download("tenders_documents", "x/a.pdf").await.is_err());
    }

    #[test]
    fn test_rest_public_url() {
        let storage = RestObjectStorage::new("https://proj.supabase.co/", "anon").unwrap();
        assert_eq!(
            storage.public_url("templates", "sbd/sbd4.pdf"),
            "https://proj.supabase.co/storage/v1/object/public/templates/sbd/sbd4.pdf"
        );
    }
}
