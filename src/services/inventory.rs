use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{EventSender, RealtimeEvent, INVENTORY_UPDATED, REPORT_FINALIZED};
use crate::models::{InventoryReport, LineItem, Sector};
use crate::repositories::SectorRepository;
use crate::services::barcode::decode;
use crate::services::inventory_session::{InventorySession, ScanOutcome, SessionState};

pub const CSV_HEADER: &str = "NF,Fornecedor,Cliente Destino,Rua,Volumes,Quantidade,Destino,Data/Hora";
const CSV_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FinalizeRequest {
    #[serde(alias = "turno")]
    #[validate(length(min = 1, message = "turno is required"))]
    pub shift: String,
    #[serde(alias = "colaborador")]
    #[validate(length(min = 1, message = "colaborador is required"))]
    pub operator: String,
    /// When omitted the session start time is used.
    #[serde(default, alias = "tempoInicio")]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub location_tag: Option<String>,
    pub state: SessionState,
    pub scanning: bool,
    pub documents: usize,
    pub total_volumes: u64,
    pub items: Vec<LineItem>,
}

/// Exact-match filters; "todas"/"todos" and empty values mean no filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemFilter {
    #[serde(default)]
    pub rua: Option<String>,
    #[serde(default)]
    pub fornecedor: Option<String>,
    #[serde(default)]
    pub cliente: Option<String>,
}

fn active(filter: &Option<String>) -> Option<&str> {
    filter
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "todas" && *v != "todos")
}

impl ItemFilter {
    pub fn matches(&self, item: &LineItem) -> bool {
        active(&self.rua).map_or(true, |v| item.location_tag == v)
            && active(&self.fornecedor).map_or(true, |v| item.supplier == v)
            && active(&self.cliente).map_or(true, |v| item.client_destination == v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryOverview {
    pub total_items: usize,
    pub total_volumes: u64,
    pub locations: usize,
    pub suppliers: usize,
    pub items: Vec<LineItem>,
}

impl InventoryOverview {
    fn from_items(items: Vec<LineItem>) -> Self {
        let locations: BTreeSet<&str> = items.iter().map(|i| i.location_tag.as_str()).collect();
        let suppliers: BTreeSet<&str> = items.iter().map(|i| i.supplier.as_str()).collect();
        Self {
            total_items: items.len(),
            total_volumes: items.iter().map(LineItem::total_volumes).sum(),
            locations: locations.len(),
            suppliers: suppliers.len(),
            items,
        }
    }
}

/// Renders items as CSV. Fields are not quoted, so embedded commas split columns.
pub fn render_csv(items: &[LineItem]) -> String {
    let mut lines = Vec::with_capacity(items.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for item in items {
        lines.push(
            [
                item.document_number.clone(),
                item.supplier.clone(),
                item.client_destination.clone(),
                item.location_tag.clone(),
                item.volume_count.to_string(),
                item.quantity.to_string(),
                item.destination.clone(),
                item.timestamp.format(CSV_TIMESTAMP_FORMAT).to_string(),
            ]
            .join(","),
        );
    }
    lines.join("\n")
}

/// Barcode-driven inventory passes, one per operator session.
#[derive(Clone)]
pub struct InventoryService {
    repository: SectorRepository,
    events: EventSender,
    sessions: Arc<DashMap<String, Arc<Mutex<InventorySession>>>>,
}

impl InventoryService {
    pub fn new(repository: SectorRepository, events: EventSender) -> Self {
        Self {
            repository,
            events,
            sessions: Arc::new(DashMap::new()),
        }
    }

    fn session_handle(&self, session_id: &str) -> Arc<Mutex<InventorySession>> {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(InventorySession::new(session_id))))
            .clone()
    }

    fn existing_handle(&self, session_id: &str) -> Result<Arc<Mutex<InventorySession>>, ServiceError> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("inventory session {session_id}")))
    }

    /// Opens a pass on `location_tag`, picking up items persisted earlier for this session.
    #[instrument(skip(self))]
    pub async fn start(
        &self,
        session_id: &str,
        location_tag: &str,
    ) -> Result<SessionStats, ServiceError> {
        let handle = self.session_handle(session_id);
        let mut session = handle.lock().await;

        let mut next = session.clone();
        if next.is_empty() {
            let persisted = self.repository.load_inventory(session_id).await?;
            if !persisted.is_empty() {
                info!(session_id, items = persisted.len(), "restored persisted inventory");
                next = InventorySession::restore(session_id, persisted);
            }
        }
        next.start(location_tag, Utc::now())?;
        *session = next;
        info!(session_id, rua = location_tag.trim(), "inventory pass started");
        Ok(stats_of(&session))
    }

    /// Decodes and applies one scan, then writes the whole session through.
    /// Rejected scans leave the session untouched.
    #[instrument(skip(self))]
    pub async fn scan(&self, session_id: &str, raw: &str) -> Result<ScanOutcome, ServiceError> {
        let decoded = decode(raw.trim_end_matches(['\r', '\n'])).map_err(|e| {
            warn!(session_id, error = %e, "rejected scan");
            ServiceError::from(e)
        })?;

        let handle = self.existing_handle(session_id).map_err(|_| {
            ServiceError::Conflict(format!("inventory session {session_id} has not been started"))
        })?;
        let mut session = handle.lock().await;

        let mut next = session.clone();
        let outcome = next.apply_scan(&decoded, Utc::now())?;
        self.repository
            .save_inventory(session_id, next.items())
            .await?;
        *session = next;

        let rua = outcome.item.location_tag.clone();
        self.events.send(RealtimeEvent::new(
            Sector::Inventory,
            INVENTORY_UPDATED,
            format!("NF {} escaneada na rua {}", outcome.item.document_number, rua),
            json!({
                "numeroNF": outcome.item.document_number,
                "rua": rua,
                "fornecedor": outcome.item.supplier,
                "clienteDestino": outcome.item.client_destination,
            }),
        ));
        Ok(outcome)
    }

    /// Discards the session. A non-empty session needs `confirm`.
    #[instrument(skip(self))]
    pub async fn reset(&self, session_id: &str, confirm: bool) -> Result<SessionStats, ServiceError> {
        let handle = self.session_handle(session_id);
        let mut session = handle.lock().await;

        if !session.is_empty() && !confirm {
            return Err(ServiceError::Conflict(format!(
                "session {session_id} has {} items; confirm the reset to discard them",
                session.len()
            )));
        }
        self.repository.clear_inventory(session_id).await?;
        session.reset();
        info!(session_id, "inventory session reset");
        Ok(stats_of(&session))
    }

    /// Archives the pass as a report and clears the session.
    #[instrument(skip(self, request))]
    pub async fn finalize(
        &self,
        session_id: &str,
        request: FinalizeRequest,
    ) -> Result<InventoryReport, ServiceError> {
        request.validate()?;
        let handle = self.existing_handle(session_id)?;
        let mut session = handle.lock().await;

        if session.is_empty() {
            return Err(ServiceError::ValidationError(
                "cannot finalize an empty inventory session".to_string(),
            ));
        }

        let now = Utc::now();
        let items = session.items().to_vec();
        let report = InventoryReport {
            id: Uuid::new_v4().to_string(),
            location_tag: session.location_tag().unwrap_or_default().to_string(),
            date: now.format("%Y-%m-%d").to_string(),
            shift: request.shift,
            operator: request.operator,
            total_items: items.len(),
            items,
            started_at: request
                .started_at
                .or_else(|| session.started_at())
                .unwrap_or(now),
            finished_at: now,
        };

        self.repository
            .archive_inventory(session_id, &report.id, &report.items)
            .await?;
        self.repository.append_inventory_report(&report).await?;
        self.repository.clear_inventory(session_id).await?;
        session.close();

        info!(session_id, report_id = %report.id, items = report.total_items, "inventory report finalized");
        self.events.send(RealtimeEvent::new(
            Sector::Inventory,
            REPORT_FINALIZED,
            format!("Relatório finalizado para rua {}", report.location_tag),
            json!({
                "rua": report.location_tag,
                "totalItens": report.total_items,
                "colaborador": report.operator,
            }),
        ));
        Ok(report)
    }

    pub async fn session_stats(&self, session_id: &str) -> Result<SessionStats, ServiceError> {
        let handle = self.existing_handle(session_id)?;
        let session = handle.lock().await;
        Ok(stats_of(&session))
    }

    /// Every stored line item, newest first, narrowed by `filter`.
    pub async fn list_items(&self, filter: &ItemFilter) -> Result<InventoryOverview, ServiceError> {
        let mut items: Vec<LineItem> = self
            .repository
            .all_inventory_items()
            .await?
            .into_iter()
            .filter(|item| filter.matches(item))
            .collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(InventoryOverview::from_items(items))
    }

    pub async fn export_csv(&self, filter: &ItemFilter) -> Result<String, ServiceError> {
        let overview = self.list_items(filter).await?;
        Ok(render_csv(&overview.items))
    }

    pub async fn reports(&self) -> Result<Vec<InventoryReport>, ServiceError> {
        self.repository.list_inventory_reports().await
    }
}

fn stats_of(session: &InventorySession) -> SessionStats {
    SessionStats {
        session_id: session.session_id().to_string(),
        location_tag: session.location_tag().map(str::to_string),
        state: session.state(),
        scanning: session.is_scanning(),
        documents: session.len(),
        total_volumes: session.total_volumes(),
        items: session.items().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{InMemoryRecordStore, RecordStore};
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    const SCAN: &str = "45868|000068310|0014|RJ08|EMS S/A|SAO JO|ROD";

    fn service() -> (InventoryService, Arc<InMemoryRecordStore>, EventSender) {
        let store = Arc::new(InMemoryRecordStore::new());
        let events = EventSender::new(16);
        let service = InventoryService::new(
            SectorRepository::new(store.clone() as Arc<dyn RecordStore>),
            events.clone(),
        );
        (service, store, events)
    }

    #[tokio::test]
    async fn scan_writes_through_and_publishes() {
        let (service, store, events) = service();
        let mut rx = events.subscribe();
        service.start("op-1", "A1").await.unwrap();

        service.scan("op-1", SCAN).await.unwrap();
        let outcome = service.scan("op-1", &format!("{SCAN}\r\n")).await.unwrap();
        assert!(outcome.merged);
        assert_eq!(outcome.item.quantity, 2);

        let raw = store.get("inventario_op-1").await.unwrap().unwrap();
        let persisted: Vec<LineItem> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].quantity, 2);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, INVENTORY_UPDATED);
        assert_eq!(event.message, "NF 000068310 escaneada na rua A1");
        assert_eq!(event.data["fornecedor"], "EMS S/A");
    }

    #[tokio::test]
    async fn rejected_scan_does_not_touch_session() {
        let (service, store, _events) = service();
        service.start("op-1", "A1").await.unwrap();
        service.scan("op-1", SCAN).await.unwrap();

        assert_matches!(
            service.scan("op-1", "45868|000068310|0|RJ08|EMS S/A|SAO JO|ROD").await,
            Err(ServiceError::InvalidVolume(_))
        );
        assert_matches!(
            service.scan("op-1", "garbage").await,
            Err(ServiceError::MalformedPayload { found: 1, expected: 7 })
        );
        let stats = service.session_stats("op-1").await.unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.items[0].quantity, 1);
        assert!(store.get("inventario_op-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn scan_without_start_is_conflict() {
        let (service, _store, _events) = service();
        assert_matches!(
            service.scan("ghost", SCAN).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn reset_requires_confirmation_when_not_empty() {
        let (service, store, _events) = service();
        service.start("op-1", "A1").await.unwrap();
        service.scan("op-1", SCAN).await.unwrap();

        assert_matches!(
            service.reset("op-1", false).await,
            Err(ServiceError::Conflict(_))
        );
        let stats = service.reset("op-1", true).await.unwrap();
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.location_tag, None);
        assert!(store.get("inventario_op-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn start_restores_persisted_items() {
        let (service, store, _events) = service();
        service.start("op-1", "A1").await.unwrap();
        service.scan("op-1", SCAN).await.unwrap();

        let restarted = InventoryService::new(
            SectorRepository::new(store as Arc<dyn RecordStore>),
            EventSender::new(4),
        );
        let stats = restarted.start("op-1", "A1").await.unwrap();
        assert_eq!(stats.documents, 1);
        let outcome = restarted.scan("op-1", SCAN).await.unwrap();
        assert!(outcome.merged);
    }

    #[tokio::test]
    async fn restart_on_another_rua_is_conflict_until_reset() {
        let (service, store, _events) = service();
        service.start("op-1", "A1").await.unwrap();
        service.scan("op-1", SCAN).await.unwrap();

        assert_matches!(
            service.start("op-1", "B2").await,
            Err(ServiceError::Conflict(_))
        );
        let stats = service.start("op-1", "A1").await.unwrap();
        assert_eq!(stats.location_tag.as_deref(), Some("A1"));
        assert_eq!(stats.documents, 1);

        let restarted = InventoryService::new(
            SectorRepository::new(store as Arc<dyn RecordStore>),
            EventSender::new(4),
        );
        assert_matches!(
            restarted.start("op-1", "B2").await,
            Err(ServiceError::Conflict(_))
        );
        restarted.reset("op-1", true).await.unwrap();
        let stats = restarted.start("op-1", "B2").await.unwrap();
        assert_eq!(stats.documents, 0);
        let outcome = restarted.scan("op-1", SCAN).await.unwrap();
        assert_eq!(outcome.item.location_tag, "B2");
    }

    #[tokio::test]
    async fn finalize_archives_report_and_clears_session() {
        let (service, store, _events) = service();
        service.start("op-1", "B7").await.unwrap();
        service.scan("op-1", SCAN).await.unwrap();
        service
            .scan("op-1", "45868|000068311|0002|RJ08|OUTRO|SAO JO|ROD")
            .await
            .unwrap();

        let report = service
            .finalize(
                "op-1",
                FinalizeRequest {
                    shift: "A".into(),
                    operator: "Ana".into(),
                    started_at: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(report.total_items, 2);
        assert_eq!(report.location_tag, "B7");

        assert!(store.get("inventario_op-1").await.unwrap().is_none());
        assert_eq!(service.reports().await.unwrap().len(), 1);
        let overview = service.list_items(&ItemFilter::default()).await.unwrap();
        assert_eq!(overview.total_items, 2);
        assert_eq!(overview.total_volumes, 16);

        let stats = service.session_stats("op-1").await.unwrap();
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.state, SessionState::Closed);
    }

    #[tokio::test]
    async fn finalize_empty_session_is_rejected() {
        let (service, _store, _events) = service();
        service.start("op-1", "B7").await.unwrap();
        assert_matches!(
            service
                .finalize(
                    "op-1",
                    FinalizeRequest {
                        shift: "A".into(),
                        operator: "Ana".into(),
                        started_at: None,
                    },
                )
                .await,
            Err(ServiceError::ValidationError(_))
        );
    }

    fn item(nf: &str, supplier: &str, rua: &str, minute: u32) -> LineItem {
        LineItem {
            id: nf.into(),
            scan_code: nf.into(),
            date: "45868".into(),
            document_number: nf.into(),
            volume_count: 3,
            destination: "RJ08".into(),
            supplier: supplier.into(),
            client_destination: "SAO JO".into(),
            cargo_type: "ROD".into(),
            quantity: 2,
            location_tag: rua.into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 14, minute, 5).unwrap(),
        }
    }

    #[test]
    fn filters_are_exact_and_combined() {
        let filter = ItemFilter {
            rua: Some("A1".into()),
            fornecedor: Some("todos".into()),
            cliente: Some("SAO JO".into()),
        };
        assert!(filter.matches(&item("1", "EMS", "A1", 0)));
        assert!(!filter.matches(&item("2", "EMS", "A10", 0)));
    }

    #[test]
    fn csv_has_header_and_unescaped_rows() {
        let csv = render_csv(&[item("000068310", "EMS S/A, FILIAL", "A1", 7)]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            "000068310,EMS S/A, FILIAL,SAO JO,A1,3,2,RJ08,01/05/2024 14:07:05"
        );
    }
}
