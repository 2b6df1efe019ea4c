use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

use crate::entities::kv_entry::{self, Entity as KvEntry};
use crate::errors::ServiceError;

use super::record_store::{RecordStore, StoredRecord, UpdateFn};

fn storage_error(err: DbErr) -> ServiceError {
    error!(error = %err, "record store query failed");
    ServiceError::storage(err.to_string())
}

/// Record store backed by the `kv_entries` table.
#[derive(Debug)]
pub struct SeaOrmRecordStore {
    db: Arc<DatabaseConnection>,
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SeaOrmRecordStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            key_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.key_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn upsert<C: ConnectionTrait>(conn: &C, key: &str, value: String) -> Result<(), DbErr> {
        let model = kv_entry::ActiveModel {
            record_key: Set(key.to_string()),
            record_value: Set(value),
            updated_at: Set(Utc::now()),
        };
        KvEntry::insert(model)
            .on_conflict(
                OnConflict::column(kv_entry::Column::RecordKey)
                    .update_columns([kv_entry::Column::RecordValue, kv_entry::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SeaOrmRecordStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let entry = KvEntry::find_by_id(key.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(storage_error)?;
        Ok(entry.map(|m| m.record_value))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), ServiceError> {
        Self::upsert(self.db.as_ref(), key, value)
            .await
            .map_err(storage_error)
    }

    async fn remove(&self, key: &str) -> Result<(), ServiceError> {
        KvEntry::delete_by_id(key.to_string())
            .exec(self.db.as_ref())
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn list_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, ServiceError> {
        let keys: Vec<String> = KvEntry::find()
            .select_only()
            .column(kv_entry::Column::RecordKey)
            .filter(kv_entry::Column::RecordKey.starts_with(prefix))
            .order_by_asc(kv_entry::Column::RecordKey)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(storage_error)?;
        // LIKE treats '_' as a wildcard, so re-check literally.
        Ok(keys.into_iter().filter(|k| k.starts_with(prefix)).collect())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<StoredRecord>, ServiceError> {
        let entries = KvEntry::find()
            .filter(kv_entry::Column::RecordKey.starts_with(prefix))
            .order_by_asc(kv_entry::Column::RecordKey)
            .all(self.db.as_ref())
            .await
            .map_err(storage_error)?;
        Ok(entries
            .into_iter()
            .filter(|m| m.record_key.starts_with(prefix))
            .map(|m| StoredRecord {
                key: m.record_key,
                raw: m.record_value,
            })
            .collect())
    }

    async fn update(&self, key: &str, f: UpdateFn) -> Result<String, ServiceError> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await.map_err(storage_error)?;
        let current = KvEntry::find_by_id(key.to_string())
            .one(&txn)
            .await
            .map_err(storage_error)?
            .map(|m| m.record_value);
        let next = f(current)?;
        Self::upsert(&txn, key, next.clone())
            .await
            .map_err(storage_error)?;
        txn.commit().await.map_err(storage_error)?;
        Ok(next)
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        self.db.ping().await.map_err(storage_error)
    }

    fn backend_name(&self) -> &'static str {
        "database"
    }
}
