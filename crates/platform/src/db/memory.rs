//! In-process database used by tests and local runs

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Database, Filter, Query};
use crate::error::{PlatformError, Result};

type RpcHandler = Arc<dyn Fn(&MemoryDatabase, Value) -> Result<Value> + Send + Sync>;

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    columns: HashMap<String, HashSet<String>>,
    failing: HashSet<String>,
}

/// Rows are plain JSON objects. Inserted rows get an `id` and `created_at`
/// when they arrive without one, like the hosted column defaults.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
    rpcs: Arc<Mutex<HashMap<String, RpcHandler>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Seed rows verbatim
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        self.state()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// Declare the full column set; selecting any other column then fails with 400
    pub fn declare_columns(&self, table: &str, columns: &[&str]) {
        self.state()
            .columns
            .insert(table.to_string(), columns.iter().map(|c| c.to_string()).collect());
    }

    /// Every operation on `table` fails with 500 until [`MemoryDatabase::restore_table`]
    pub fn fail_table(&self, table: &str) {
        self.state().failing.insert(table.to_string());
    }

    pub fn restore_table(&self, table: &str) {
        self.state().failing.remove(table);
    }

    pub fn register_rpc<F>(&self, name: &str, handler: F)
    where
        F: Fn(&MemoryDatabase, Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.rpcs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(name.to_string(), Arc::new(handler));
    }

    fn check(state: &State, table: &str, columns: Option<&str>) -> Result<()> {
        if state.failing.contains(table) {
            return Err(PlatformError::status(500, format!("table {table} unavailable")));
        }
        if let (Some(declared), Some(columns)) = (state.columns.get(table), columns) {
            for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty() && *c != "*") {
                let name = column.split(['(', ':']).next().unwrap_or(column);
                if !declared.contains(name) {
                    return Err(PlatformError::status(
                        400,
                        format!("column {table}.{name} does not exist"),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&y.parse::<f64>().ok()?),
        (Value::String(x), Value::Number(y)) => x.parse::<f64>().ok()?.partial_cmp(&y.as_f64()?),
        _ => None,
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    a == b || compare(a, b) == Some(Ordering::Equal)
}

fn field<'a>(row: &'a Value, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn matches(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(c, v) => loosely_equal(field(row, c), v),
        Filter::Neq(c, v) => !field(row, c).is_null() && !loosely_equal(field(row, c), v),
        Filter::In(c, vs) => vs.iter().any(|v| loosely_equal(field(row, c), v)),
        Filter::Gt(c, v) => compare(field(row, c), v) == Some(Ordering::Greater),
        Filter::Gte(c, v) => matches!(compare(field(row, c), v), Some(Ordering::Greater | Ordering::Equal)),
        Filter::Lt(c, v) => compare(field(row, c), v) == Some(Ordering::Less),
        Filter::Lte(c, v) => matches!(compare(field(row, c), v), Some(Ordering::Less | Ordering::Equal)),
        Filter::IsNull(c) => field(row, c).is_null(),
        Filter::NotNull(c) => !field(row, c).is_null(),
    }
}

fn project(row: &Value, columns: Option<&str>) -> Value {
    let Some(columns) = columns.filter(|c| !c.contains('*')) else {
        return row.clone();
    };
    let mut out = Map::new();
    for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        out.insert(column.to_string(), field(row, column).clone());
    }
    Value::Object(out)
}

fn apply_query(rows: &[Value], query: &Query) -> Vec<Value> {
    let mut selected: Vec<Value> = rows
        .iter()
        .filter(|row| query.filters.iter().all(|f| matches(row, f)))
        .cloned()
        .collect();

    for order in query.order.iter().rev() {
        selected.sort_by(|a, b| {
            let (x, y) = (field(a, &order.column), field(b, &order.column));
            match (x.is_null(), y.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => {
                    let ord = compare(x, y).unwrap_or(Ordering::Equal);
                    if order.ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                }
            }
        });
    }

    selected
        .into_iter()
        .skip(query.offset.unwrap_or(0))
        .take(query.limit.unwrap_or(usize::MAX))
        .collect()
}

fn with_defaults(mut row: Value) -> Value {
    if let Value::Object(map) = &mut row {
        if map.get("id").map_or(true, Value::is_null) {
            map.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        if map.get("created_at").map_or(true, Value::is_null) {
            map.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
        }
    }
    row
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Value::Object(t), Value::Object(p)) = (target, patch) {
        for (k, v) in p {
            t.insert(k.clone(), v.clone());
        }
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let state = self.state();
        Self::check(&state, &query.table, query.columns.as_deref())?;
        let rows = state.tables.get(&query.table).map(Vec::as_slice).unwrap_or_default();
        Ok(apply_query(rows, query)
            .iter()
            .map(|row| project(row, query.columns.as_deref()))
            .collect())
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let state = self.state();
        Self::check(&state, &query.table, None)?;
        let rows = state.tables.get(&query.table).map(Vec::as_slice).unwrap_or_default();
        let unbounded = Query {
            limit: None,
            offset: None,
            ..query.clone()
        };
        Ok(apply_query(rows, &unbounded).len() as u64)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>> {
        let mut state = self.state();
        Self::check(&state, table, None)?;
        let stored: Vec<Value> = rows.into_iter().map(with_defaults).collect();
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>> {
        let mut state = self.state();
        Self::check(&state, &query.table, None)?;
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(&query.table) {
            for row in rows.iter_mut().filter(|row| query.filters.iter().all(|f| matches(row, f))) {
                merge(row, &patch);
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> Result<u64> {
        let mut state = self.state();
        Self::check(&state, &query.table, None)?;
        let Some(rows) = state.tables.get_mut(&query.table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !query.filters.iter().all(|f| matches(row, f)));
        Ok((before - rows.len()) as u64)
    }

    async fn upsert(&self, table: &str, rows: Vec<Value>, on_conflict: &str) -> Result<Vec<Value>> {
        let mut state = self.state();
        Self::check(&state, table, None)?;
        let keys: Vec<&str> = on_conflict.split(',').map(str::trim).collect();
        let existing = state.tables.entry(table.to_string()).or_default();
        let mut stored = Vec::with_capacity(rows.len());

        for row in rows {
            let position = existing
                .iter()
                .position(|e| keys.iter().all(|k| loosely_equal(field(e, k), field(&row, k))));
            match position {
                Some(i) => {
                    merge(&mut existing[i], &row);
                    stored.push(existing[i].clone());
                }
                None => {
                    let row = with_defaults(row);
                    existing.push(row.clone());
                    stored.push(row);
                }
            }
        }
        Ok(stored)
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value> {
        let handler = self
            .rpcs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(function)
            .cloned();
        match handler {
            Some(handler) => handler(self, args),
            None => Err(PlatformError::status(404, format!("function {function} not found"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fetch;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_filters_order_and_limit() {
        let db = MemoryDatabase::new();
        db.seed(
            "tenders",
            vec![
                json!({"id": "t1", "user_id": "u1", "status": "DRAFT", "updated_at": "2025-01-01"}),
                json!({"id": "t2", "user_id": "u1", "status": "ARCHIVED", "updated_at": "2025-03-01"}),
                json!({"id": "t3", "user_id": "u1", "status": "READY", "updated_at": "2025-02-01"}),
                json!({"id": "t4", "user_id": "u2", "status": "DRAFT", "updated_at": "2025-04-01"}),
            ],
        );

        let rows = db
            .select(
                &Query::table("tenders")
                    .select("id")
                    .eq("user_id", "u1")
                    .neq("status", "ARCHIVED")
                    .order("updated_at", false)
                    .limit(5),
            )
            .await
            .unwrap();

        assert_eq!(rows, vec![json!({"id": "t3"}), json!({"id": "t1"})]);
    }

    #[tokio::test]
    async fn test_insert_fills_defaults_and_update_merges() {
        let db = MemoryDatabase::new();
        let stored = db.insert("alerts", vec![json!({"message": "hi", "is_read": false})]).await.unwrap();
        let id = stored[0]["id"].as_str().unwrap().to_string();
        assert!(stored[0]["created_at"].is_string());

        db.update(&Query::table("alerts").eq("id", id.as_str()), json!({"is_read": true}))
            .await
            .unwrap();
        let rows: Vec<Value> = fetch(&db, &Query::table("alerts")).await.unwrap();
        assert_eq!(rows[0]["is_read"], json!(true));
    }

    #[tokio::test]
    async fn test_upsert_replaces_on_conflict() {
        let db = MemoryDatabase::new();
        db.upsert("tender_documents", vec![json!({"tender_id": "t1", "extracted_text": "a"})], "tender_id")
            .await
            .unwrap();
        db.upsert("tender_documents", vec![json!({"tender_id": "t1", "extracted_text": "b"})], "tender_id")
            .await
            .unwrap();

        let rows = db.rows("tender_documents");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["extracted_text"], json!("b"));
    }

    #[tokio::test]
    async fn test_probe_column_respects_declared_schema() {
        let db = MemoryDatabase::new();
        db.declare_columns("compliance_documents", &["id", "user_id", "file_url"]);

        assert!(db.probe_column("compliance_documents", "file_url").await.unwrap());
        assert!(!db.probe_column("compliance_documents", "storage_path").await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_table_and_missing_rpc() {
        let db = MemoryDatabase::new();
        db.fail_table("tenders");
        assert!(db.select(&Query::table("tenders")).await.is_err());
        assert!(db.probe_column("tenders", "id").await.is_err());

        let err = db.rpc("get_admin_stats", json!({})).await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[tokio::test]
    async fn test_count_ignores_limit() {
        let db = MemoryDatabase::new();
        db.seed("profiles", (0..7).map(|i| json!({"id": format!("p{i}")})));
        assert_eq!(db.count(&Query::table("profiles").limit(1)).await.unwrap(), 7);
    }
}
