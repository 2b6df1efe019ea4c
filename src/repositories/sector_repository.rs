use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::models::{InventoryReport, LineItem, Sector};

use super::record_store::{RecordStore, StoredRecord};

pub const RECEIVING_PREFIX: &str = "recebimento_";
pub const PACKING_PREFIX: &str = "profarma_carros_";
pub const INVENTORY_PREFIX: &str = "inventario_";
pub const COST_REPORTS_KEY: &str = "relatorios_custos";
pub const INVENTORY_REPORTS_KEY: &str = "relatorios_inventario";

/// Keeps the flat keyspace convention away from the aggregation code.
#[derive(Clone)]
pub struct SectorRepository {
    store: Arc<dyn RecordStore>,
}

impl SectorRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn prefix_for(sector: Sector) -> &'static str {
        match sector {
            Sector::Receiving => RECEIVING_PREFIX,
            Sector::Packing => PACKING_PREFIX,
            Sector::Inventory => INVENTORY_PREFIX,
            Sector::CostEntry => COST_REPORTS_KEY,
        }
    }

    fn inventory_key(session_id: &str) -> String {
        format!("{INVENTORY_PREFIX}{session_id}")
    }

    pub async fn list_by_sector(&self, sector: Sector) -> Result<Vec<StoredRecord>, ServiceError> {
        let records = match sector {
            // Cost reports live under a single fixed key.
            Sector::CostEntry => self
                .store
                .get(COST_REPORTS_KEY)
                .await?
                .map(|raw| StoredRecord {
                    key: COST_REPORTS_KEY.to_string(),
                    raw,
                })
                .into_iter()
                .collect(),
            _ => self.store.scan_prefix(Self::prefix_for(sector)).await?,
        };
        debug!(%sector, count = records.len(), "loaded sector records");
        Ok(records)
    }

    pub async fn save_inventory(
        &self,
        session_id: &str,
        items: &[LineItem],
    ) -> Result<(), ServiceError> {
        let raw = serde_json::to_string(items)?;
        self.store.set(&Self::inventory_key(session_id), raw).await
    }

    pub async fn load_inventory(&self, session_id: &str) -> Result<Vec<LineItem>, ServiceError> {
        match self.store.get(&Self::inventory_key(session_id)).await? {
            Some(raw) if !raw.trim().is_empty() => {
                Ok(line_items(&Self::inventory_key(session_id), &raw))
            }
            _ => Ok(Vec::new()),
        }
    }

    pub async fn clear_inventory(&self, session_id: &str) -> Result<(), ServiceError> {
        self.store.remove(&Self::inventory_key(session_id)).await
    }

    /// Writes a finished pass under its own key so it still counts towards the inventory sector.
    pub async fn archive_inventory(
        &self,
        session_id: &str,
        report_id: &str,
        items: &[LineItem],
    ) -> Result<(), ServiceError> {
        let raw = serde_json::to_string(items)?;
        let key = format!("{INVENTORY_PREFIX}{session_id}_{report_id}");
        self.store.set(&key, raw).await
    }

    /// All stored inventory line items across live and archived passes.
    pub async fn all_inventory_items(&self) -> Result<Vec<LineItem>, ServiceError> {
        let mut items = Vec::new();
        for record in self.store.scan_prefix(INVENTORY_PREFIX).await? {
            items.extend(line_items(&record.key, &record.raw));
        }
        Ok(items)
    }

    pub async fn append_inventory_report(
        &self,
        report: &InventoryReport,
    ) -> Result<(), ServiceError> {
        let entry = serde_json::to_value(report)?;
        self.store
            .update(
                INVENTORY_REPORTS_KEY,
                Box::new(move |current| {
                    let mut reports: Vec<serde_json::Value> = match current.as_deref() {
                        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)?,
                        _ => Vec::new(),
                    };
                    reports.push(entry);
                    Ok(serde_json::to_string(&reports)?)
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn list_inventory_reports(&self) -> Result<Vec<InventoryReport>, ServiceError> {
        match self.store.get(INVENTORY_REPORTS_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn ping(&self) -> Result<(), ServiceError> {
        self.store.ping().await
    }
}

/// Decodes an inventory array entry by entry; unreadable entries are logged and dropped.
fn line_items(key: &str, raw: &str) -> Vec<LineItem> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(e) => {
            warn!(key, error = %e, "skipping unreadable inventory record");
            return Vec::new();
        }
    };
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(key, error = %e, "skipping unreadable inventory entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryRecordStore;

    fn repository() -> SectorRepository {
        SectorRepository::new(Arc::new(InMemoryRecordStore::new()))
    }

    #[tokio::test]
    async fn list_by_sector_respects_prefixes() {
        let repo = repository();
        let store = repo.store().clone();
        store.set("recebimento_2024-05-01", "[]".into()).await.unwrap();
        store.set("profarma_carros_1", "{}".into()).await.unwrap();
        store.set(COST_REPORTS_KEY, "[]".into()).await.unwrap();
        store.set(INVENTORY_REPORTS_KEY, "[]".into()).await.unwrap();

        let receiving = repo.list_by_sector(Sector::Receiving).await.unwrap();
        assert_eq!(receiving.len(), 1);
        assert_eq!(receiving[0].key, "recebimento_2024-05-01");
        assert_eq!(repo.list_by_sector(Sector::Packing).await.unwrap().len(), 1);
        assert_eq!(repo.list_by_sector(Sector::CostEntry).await.unwrap().len(), 1);
        assert!(repo.list_by_sector(Sector::Inventory).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_inventory_loads_empty() {
        let repo = repository();
        assert!(repo.load_inventory("nobody").await.unwrap().is_empty());
        assert!(repo.list_inventory_reports().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_inventory_entry_only_drops_itself() {
        let repo = repository();
        let store = repo.store().clone();
        let good = LineItem {
            id: "1".into(),
            scan_code: "45868|000068310|0014|RJ08|EMS S/A|SAO JO|ROD".into(),
            date: "45868".into(),
            document_number: "000068310".into(),
            volume_count: 14,
            destination: "RJ08".into(),
            supplier: "EMS S/A".into(),
            client_destination: "SAO JO".into(),
            cargo_type: "ROD".into(),
            quantity: 1,
            location_tag: "A1".into(),
            timestamp: chrono::Utc::now(),
        };
        let raw = serde_json::to_string(&serde_json::json!([good, {"numeroNF": 42}])).unwrap();
        store.set("inventario_op-1", raw).await.unwrap();
        store.set("inventario_op-2", "not json".into()).await.unwrap();

        let items = repo.all_inventory_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].document_number, "000068310");

        let restored = repo.load_inventory("op-1").await.unwrap();
        assert_eq!(restored.len(), 1);
    }
}
