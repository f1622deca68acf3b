//! PostgREST client over reqwest

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{literal, Database, Filter, Query};
use crate::error::{PlatformError, Result};

#[derive(Debug, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RestDatabase {
    client: Client,
    base_url: String,
    api_key: String,
    bearer: String,
}

impl RestDatabase {
    /// `base_url` is the project URL; `api_key` doubles as bearer until
    /// [`RestDatabase::with_bearer`] scopes requests to a user token.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        if base_url.is_empty() {
            return Err(PlatformError::Config("project URL cannot be empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
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

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.bearer))
    }

    fn params(query: &Query) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(columns) = &query.columns {
            params.push(("select".to_string(), columns.clone()));
        }
        for filter in &query.filters {
            let value = match filter {
                Filter::Eq(_, v) => format!("eq.{}", literal(v)),
                Filter::Neq(_, v) => format!("neq.{}", literal(v)),
                Filter::In(_, vs) => format!(
                    "in.({})",
                    vs.iter().map(|v| format!("\"{}\"", literal(v))).collect::<Vec<_>>().join(",")
                ),
                Filter::Gt(_, v) => format!("gt.{}", literal(v)),
                Filter::Gte(_, v) => format!("gte.{}", literal(v)),
                Filter::Lt(_, v) => format!("lt.{}", literal(v)),
                Filter::Lte(_, v) => format!("lte.{}", literal(v)),
                Filter::IsNull(_) => "is.null".to_string(),
                Filter::NotNull(_) => "not.is.null".to_string(),
            };
            params.push((filter.column().to_string(), value));
        }
        if !query.order.is_empty() {
            let order = query
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = query.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        params
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<PostgrestError>(&body) {
            Ok(err) => err
                .message
                .or(err.details)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            Err(_) if body.is_empty() => format!("HTTP {}", status.as_u16()),
            Err(_) => body,
        };
        if status.as_u16() == 404 {
            return Err(PlatformError::NotFound(message));
        }
        Err(PlatformError::status(status.as_u16(), message))
    }

    async fn rows(response: Response) -> Result<Vec<Value>> {
        match Self::check(response).await?.json::<Value>().await? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            single => Ok(vec![single]),
        }
    }
}

/// `Content-Range: 0-9/42` → 42
fn total_from_range(header: Option<&str>) -> Option<u64> {
    header?.rsplit('/').next()?.parse().ok()
}

#[async_trait]
impl Database for RestDatabase {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        debug!(table = %query.table, "select");
        let response = self
            .request(Method::GET, &query.table)
            .query(&Self::params(query))
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let mut counted = query.clone();
        counted.columns = Some("id".to_string());
        counted.limit = Some(1);
        counted.offset = None;
        let response = self
            .request(Method::GET, &query.table)
            .query(&Self::params(&counted))
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = Self::check(response).await?;
        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        total_from_range(range.as_deref())
            .ok_or_else(|| PlatformError::Decode(format!("missing count for {}", query.table)))
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>> {
        debug!(table, count = rows.len(), "insert");
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>> {
        let response = self
            .request(Method::PATCH, &query.table)
            .query(&Self::params(query))
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn delete(&self, query: &Query) -> Result<u64> {
        let response = self
            .request(Method::DELETE, &query.table)
            .query(&Self::params(query))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        Ok(Self::rows(response).await?.len() as u64)
    }

    async fn upsert(&self, table: &str, rows: Vec<Value>, on_conflict: &str) -> Result<Vec<Value>> {
        let response = self
            .request(Method::POST, table)
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&rows)
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value> {
        debug!(function, "rpc");
        let response = self
            .request(Method::POST, &format!("rpc/{function}"))
            .json(&args)
            .send()
            .await?;
        Ok(Self::check(response).await?.json::<Value>().await?)
    }
}
