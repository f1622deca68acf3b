//! Table access in the shape of the hosted PostgREST API

mod memory;
mod rest;

pub use memory::MemoryDatabase;
pub use rest::RestDatabase;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{PlatformError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    In(String, Vec<Value>),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    IsNull(String),
    NotNull(String),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Self::Eq(c, _)
            | Self::Neq(c, _)
            | Self::In(c, _)
            | Self::Gt(c, _)
            | Self::Gte(c, _)
            | Self::Lt(c, _)
            | Self::Lte(c, _)
            | Self::IsNull(c)
            | Self::NotNull(c) => c,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: Option<String>,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    pub fn neq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Neq(column.into(), value.into()));
        self
    }

    pub fn in_list<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filters
            .push(Filter::In(column.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn gt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gt(column.into(), value.into()));
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(column.into(), value.into()));
        self
    }

    pub fn lt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lt(column.into(), value.into()));
        self
    }

    pub fn lte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte(column.into(), value.into()));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.into()));
        self
    }

    pub fn not_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::NotNull(column.into()));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[async_trait]
pub trait Database: Send + Sync {
    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    async fn count(&self, query: &Query) -> Result<u64>;

    /// Insert rows and return them as stored
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>>;

    /// Merge `patch` into every matching row
    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>>;

    async fn delete(&self, query: &Query) -> Result<u64>;

    /// Insert or replace on the comma-separated `on_conflict` columns
    async fn upsert(&self, table: &str, rows: Vec<Value>, on_conflict: &str) -> Result<Vec<Value>>;

    async fn rpc(&self, function: &str, args: Value) -> Result<Value>;

    /// Whether `column` can be selected from `table`
    async fn probe_column(&self, table: &str, column: &str) -> Result<bool> {
        match self.select(&Query::table(table).select(column).limit(1)).await {
            Ok(_) => Ok(true),
            Err(PlatformError::Status { status: 400, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

pub async fn fetch<T: DeserializeOwned>(db: &dyn Database, query: &Query) -> Result<Vec<T>> {
    db.select(query)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(PlatformError::from))
        .collect()
}

pub async fn fetch_one<T: DeserializeOwned>(db: &dyn Database, query: &Query) -> Result<Option<T>> {
    let query = query.clone().limit(1);
    Ok(fetch(db, &query).await?.into_iter().next())
}

pub async fn insert_one<T: Serialize + DeserializeOwned>(db: &dyn Database, table: &str, row: &T) -> Result<T> {
    let stored = db.insert(table, vec![serde_json::to_value(row)?]).await?;
    let first = stored
        .into_iter()
        .next()
        .ok_or_else(|| PlatformError::Decode(format!("insert into {table} returned no rows")))?;
    Ok(serde_json::from_value(first)?)
}

/// Render a filter value the way PostgREST expects it in a query string
pub(crate) fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
