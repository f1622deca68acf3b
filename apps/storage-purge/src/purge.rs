//! Plan and execute the purge

use std::collections::HashSet;
use std::sync::Arc;

use platform::{Database, ObjectStorage, Query, COMPLIANCE_BUCKET, TENDER_DOCUMENTS_BUCKET};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::PurgeError;
use crate::paths::{extract_storage_path, normalize_key, Keeper};

pub const PAGE_SIZE: usize = 100;
/// Per-folder listing bound (50,000 objects)
pub const MAX_PAGES: usize = 500;
pub const DELETE_BATCH: usize = 100;

/// Columns that may hold an object's storage key, in probe order
pub const PATH_COLUMNS: &[&str] = &[
    "storage_path",
    "file_path",
    "file_url",
    "document_url",
    "object_path",
    "path",
    "url",
];

/// Tables that may link stored files to tenders, in probe order
pub const TENDER_FILE_TABLES: &[&str] = &["tender_documents", "tender_files", "tender_attachments"];

#[derive(Debug, Clone, PartialEq)]
pub struct BucketPlan {
    pub bucket: &'static str,
    pub scanned: usize,
    /// Size of the database allow-list; `None` when the UUID-folder rule applied
    pub protected: Option<usize>,
    pub to_delete: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PurgePlan {
    pub buckets: Vec<BucketPlan>,
}

impl PurgePlan {
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.to_delete.len()).sum()
    }
}

pub struct Purger {
    db: Arc<dyn Database>,
    storage: Arc<dyn ObjectStorage>,
    keeper: Keeper,
}

impl Purger {
    pub fn new(db: Arc<dyn Database>, storage: Arc<dyn ObjectStorage>, keeper: Keeper) -> Self {
        Self { db, storage, keeper }
    }

    /// Work out what would be deleted. Nothing is removed here; a compliance
    /// allow-list failure aborts the whole plan.
    pub async fn plan(&self) -> Result<PurgePlan, PurgeError> {
        let tenders = self.plan_tenders().await?;
        let compliance = self.plan_compliance().await?;
        Ok(PurgePlan {
            buckets: vec![tenders, compliance],
        })
    }

    async fn plan_tenders(&self) -> Result<BucketPlan, PurgeError> {
        let allow_list = self.tenders_allow_list().await?;
        let files = self.list_all(TENDER_DOCUMENTS_BUCKET).await;

        if allow_list.as_ref().is_some_and(HashSet::is_empty) && !files.is_empty() {
            warn!("database returned 0 protected tender files; only the keeper folder is safe");
        }

        let to_delete = files
            .iter()
            .filter(|path| match &allow_list {
                Some(allowed) => !self.keeper.owns_folder(path) && !is_allowed(allowed, path, TENDER_DOCUMENTS_BUCKET),
                None => self.keeper.foreign_uuid_folder(path),
            })
            .cloned()
            .collect();

        Ok(BucketPlan {
            bucket: TENDER_DOCUMENTS_BUCKET,
            scanned: files.len(),
            protected: allow_list.map(|a| a.len()),
            to_delete,
        })
    }

    async fn plan_compliance(&self) -> Result<BucketPlan, PurgeError> {
        let allowed = self.compliance_allow_list().await?;
        let files = self.list_all(COMPLIANCE_BUCKET).await;

        if allowed.is_empty() && !files.is_empty() {
            warn!("database returned 0 protected compliance files; only the keeper folder is safe");
        }

        let to_delete = files
            .iter()
            .filter(|path| !self.keeper.owns_folder(path) && !is_allowed(&allowed, path, COMPLIANCE_BUCKET))
            .cloned()
            .collect();

        Ok(BucketPlan {
            bucket: COMPLIANCE_BUCKET,
            scanned: files.len(),
            protected: Some(allowed.len()),
            to_delete,
        })
    }

    /// Keys of the keeper's compliance documents. Fails closed.
    async fn compliance_allow_list(&self) -> Result<HashSet<String>, PurgeError> {
        let table = "compliance_documents";
        let column = self
            .first_column(table, PATH_COLUMNS)
            .await?
            .ok_or_else(|| PurgeError::NoPathColumn(table.to_string()))?;
        info!(table, column, "building compliance allow-list");

        let rows = self
            .db
            .select(&Query::table(table).select(column).eq("user_id", self.keeper.id.as_str()))
            .await
            .map_err(|source| PurgeError::AllowListQuery {
                table: table.to_string(),
                source,
            })?;

        Ok(collect_keys(&rows, column, COMPLIANCE_BUCKET))
    }

    /// Keys of files attached to the keeper's tenders, or `None` when no
    /// allow-list can be built and the UUID-folder rule should apply
    async fn tenders_allow_list(&self) -> Result<Option<HashSet<String>>, PurgeError> {
        let tenders = match self
            .db
            .select(&Query::table("tenders").select("id").eq("user_id", self.keeper.id.as_str()))
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                info!("could not query tenders ({}), falling back to UUID rule", e);
                return Ok(None);
            }
        };
        let ids: Vec<Value> = tenders.into_iter().filter_map(|row| row.get("id").cloned()).collect();
        if ids.is_empty() {
            info!("keeper has no tenders; allow-list is empty");
            return Ok(Some(HashSet::new()));
        }

        let mut source = None;
        for table in TENDER_FILE_TABLES {
            if self.first_column(table, &["tender_id"]).await.ok().flatten().is_none() {
                continue;
            }
            if let Ok(Some(column)) = self.first_column(table, PATH_COLUMNS).await {
                source = Some((*table, column));
                break;
            }
        }
        let Some((table, column)) = source else {
            info!("no tender file table found, falling back to UUID rule");
            return Ok(None);
        };
        info!(table, column, "building tender allow-list");

        match self
            .db
            .select(&Query::table(table).select(column).in_list("tender_id", ids))
            .await
        {
            Ok(rows) => Ok(Some(collect_keys(&rows, column, TENDER_DOCUMENTS_BUCKET))),
            Err(e) => {
                info!("error querying {} ({}), falling back to UUID rule", table, e);
                Ok(None)
            }
        }
    }

    async fn first_column(
        &self,
        table: &str,
        candidates: &[&'static str],
    ) -> Result<Option<&'static str>, PurgeError> {
        for column in candidates {
            if self.db.probe_column(table, column).await? {
                return Ok(Some(column));
            }
        }
        Ok(None)
    }

    /// Every object key in `bucket`. Listing errors stop the scan of that
    /// folder; the objects found so far are still returned.
    pub async fn list_all(&self, bucket: &str) -> Vec<String> {
        let mut files = Vec::new();
        let mut folders = vec![String::new()];

        while let Some(prefix) = folders.pop() {
            for page in 0..MAX_PAGES {
                let entries = match self.storage.list(bucket, &prefix, PAGE_SIZE, page * PAGE_SIZE).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(bucket, prefix = %prefix, "listing failed: {}", e);
                        break;
                    }
                };
                let count = entries.len();
                for entry in entries {
                    let full = if prefix.is_empty() {
                        entry.name.clone()
                    } else {
                        format!("{}/{}", prefix, entry.name)
                    };
                    if entry.is_folder() {
                        folders.push(full);
                    } else {
                        files.push(full);
                    }
                }
                if count < PAGE_SIZE {
                    break;
                }
            }
        }

        debug!(bucket, count = files.len(), "listing complete");
        files
    }

    /// Remove every planned object in batches; returns how many were removed
    pub async fn execute(&self, plan: &PurgePlan) -> usize {
        let mut deleted = 0;
        for bucket in &plan.buckets {
            if bucket.to_delete.is_empty() {
                continue;
            }
            info!(bucket = bucket.bucket, count = bucket.to_delete.len(), "deleting");
            for batch in bucket.to_delete.chunks(DELETE_BATCH) {
                match self.storage.remove(bucket.bucket, batch).await {
                    Ok(removed) => deleted += removed.len(),
                    Err(e) => warn!(bucket = bucket.bucket, "batch delete failed: {}", e),
                }
            }
        }
        deleted
    }
}

fn is_allowed(allowed: &HashSet<String>, path: &str, bucket: &str) -> bool {
    normalize_key(path, bucket).is_some_and(|key| allowed.contains(&key))
}

fn collect_keys(rows: &[Value], column: &str, bucket: &str) -> HashSet<String> {
    rows.iter()
        .filter_map(|row| row.get(column).and_then(Value::as_str))
        .filter_map(|raw| extract_storage_path(raw, bucket))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::{MemoryDatabase, MemoryObjectStorage, TEMPLATES_BUCKET};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const KEEPER: &str = "faaaf0ba-77d3-4fc6-b3c7-21bf04b55400";
    const OTHER: &str = "0b6a8f2e-1c1d-4c55-9a0e-2f1e0c9d8b7a";

    fn purger(db: &MemoryDatabase, storage: &MemoryObjectStorage) -> Purger {
        Purger::new(Arc::new(db.clone()), Arc::new(storage.clone()), Keeper::new(KEEPER))
    }

    fn compliance_schema(db: &MemoryDatabase) {
        db.declare_columns("compliance_documents", &["id", "user_id", "doc_type", "file_url"]);
    }

    fn plan_for<'a>(plan: &'a PurgePlan, bucket: &str) -> &'a BucketPlan {
        plan.buckets.iter().find(|b| b.bucket == bucket).unwrap()
    }

    #[tokio::test]
    async fn test_compliance_keeps_allow_list_and_keeper_folder() {
        let db = MemoryDatabase::new();
        compliance_schema(&db);
        db.seed(
            "compliance_documents",
            vec![
                json!({"id": "d1", "user_id": KEEPER, "doc_type": "cidb_cert", "file_url": "cidb/cidb_cert/1_cert.pdf"}),
                json!({"id": "d2", "user_id": OTHER, "doc_type": "cidb_cert", "file_url": "cidb/cidb_cert/2_cert.pdf"}),
            ],
        );
        let storage = MemoryObjectStorage::new();
        storage.put(COMPLIANCE_BUCKET, "cidb/cidb_cert/1_cert.pdf", b"a".to_vec());
        storage.put(COMPLIANCE_BUCKET, "cidb/cidb_cert/2_cert.pdf", b"b".to_vec());
        storage.put(COMPLIANCE_BUCKET, &format!("{}/profile.pdf", KEEPER), b"c".to_vec());

        let plan = purger(&db, &storage).plan().await.unwrap();
        let compliance = plan_for(&plan, COMPLIANCE_BUCKET);
        assert_eq!(compliance.scanned, 3);
        assert_eq!(compliance.protected, Some(1));
        assert_eq!(compliance.to_delete, vec!["cidb/cidb_cert/2_cert.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_compliance_without_path_column_aborts() {
        let db = MemoryDatabase::new();
        db.declare_columns("compliance_documents", &["id", "user_id", "doc_type"]);
        let storage = MemoryObjectStorage::new();
        storage.put(COMPLIANCE_BUCKET, "cidb/x.pdf", b"a".to_vec());

        let err = purger(&db, &storage).plan().await.unwrap_err();
        assert!(matches!(err, PurgeError::NoPathColumn(_)));
    }

    #[tokio::test]
    async fn test_compliance_query_failure_aborts() {
        let db = MemoryDatabase::new();
        db.fail_table("compliance_documents");
        let storage = MemoryObjectStorage::new();

        let err = purger(&db, &storage).plan().await.unwrap_err();
        assert!(matches!(err, PurgeError::Platform(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_tenders_allow_list_from_documents_table() {
        let db = MemoryDatabase::new();
        compliance_schema(&db);
        db.declare_columns("tender_documents", &["id", "tender_id", "file_path", "file_name"]);
        db.seed("tenders", vec![json!({"id": "t1", "user_id": KEEPER}), json!({"id": "t2", "user_id": OTHER})]);
        db.seed(
            "tender_documents",
            vec![
                json!({"id": "x1", "tender_id": "t1", "file_path": "t1/spec.pdf"}),
                json!({"id": "x2", "tender_id": "t2", "file_path": "t2/spec.pdf"}),
            ],
        );
        let storage = MemoryObjectStorage::new();
        storage.put(TENDER_DOCUMENTS_BUCKET, "t1/spec.pdf", b"a".to_vec());
        storage.put(TENDER_DOCUMENTS_BUCKET, "t2/spec.pdf", b"b".to_vec());
        storage.put(TENDER_DOCUMENTS_BUCKET, &format!("{}/draft.pdf", KEEPER), b"c".to_vec());
        storage.put(TEMPLATES_BUCKET, "public/sbd4.docx", b"d".to_vec());

        let purger = purger(&db, &storage);
        let plan = purger.plan().await.unwrap();
        let tenders = plan_for(&plan, TENDER_DOCUMENTS_BUCKET);
        assert_eq!(tenders.protected, Some(1));
        assert_eq!(tenders.to_delete, vec!["t2/spec.pdf".to_string()]);

        let deleted = purger.execute(&plan).await;
        assert_eq!(deleted, 1);
        let mut left = storage.paths(TENDER_DOCUMENTS_BUCKET);
        left.sort();
        assert_eq!(left, vec![format!("{}/draft.pdf", KEEPER), "t1/spec.pdf".to_string()]);
        assert_eq!(storage.paths(TEMPLATES_BUCKET), vec!["public/sbd4.docx".to_string()]);
    }

    #[tokio::test]
    async fn test_tenders_fall_back_to_uuid_rule() {
        let db = MemoryDatabase::new();
        compliance_schema(&db);
        db.fail_table("tenders");
        let storage = MemoryObjectStorage::new();
        storage.put(TENDER_DOCUMENTS_BUCKET, &format!("{}/spec.pdf", OTHER), b"a".to_vec());
        storage.put(TENDER_DOCUMENTS_BUCKET, &format!("{}/spec.pdf", KEEPER), b"b".to_vec());
        storage.put(TENDER_DOCUMENTS_BUCKET, "shared/notice.pdf", b"c".to_vec());

        let plan = purger(&db, &storage).plan().await.unwrap();
        let tenders = plan_for(&plan, TENDER_DOCUMENTS_BUCKET);
        assert_eq!(tenders.protected, None);
        assert_eq!(tenders.to_delete, vec![format!("{}/spec.pdf", OTHER)]);
    }

    #[tokio::test]
    async fn test_listing_walks_pages_and_folders() {
        let db = MemoryDatabase::new();
        let storage = MemoryObjectStorage::new();
        for i in 0..250 {
            storage.put(COMPLIANCE_BUCKET, &format!("bulk/{:03}.pdf", i), b"x".to_vec());
        }
        storage.put(COMPLIANCE_BUCKET, "a/b/c/deep.pdf", b"x".to_vec());

        let files = purger(&db, &storage).list_all(COMPLIANCE_BUCKET).await;
        assert_eq!(files.len(), 251);
        assert!(files.contains(&"a/b/c/deep.pdf".to_string()));
    }

    #[tokio::test]
    async fn test_execute_batches_deletes() {
        let db = MemoryDatabase::new();
        let storage = MemoryObjectStorage::new();
        let paths: Vec<String> = (0..230).map(|i| format!("old/{}.pdf", i)).collect();
        for path in &paths {
            storage.put(COMPLIANCE_BUCKET, path, b"x".to_vec());
        }
        let plan = PurgePlan {
            buckets: vec![BucketPlan {
                bucket: COMPLIANCE_BUCKET,
                scanned: paths.len(),
                protected: Some(0),
                to_delete: paths,
            }],
        };

        let deleted = purger(&db, &storage).execute(&plan).await;
        assert_eq!(deleted, 230);
        assert!(storage.paths(COMPLIANCE_BUCKET).is_empty());
        assert_eq!(plan.total(), 230);
    }
}
