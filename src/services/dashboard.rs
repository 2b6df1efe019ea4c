use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::{process_events, EventHandler, EventSender, RealtimeEvent};
use crate::models::Sector;
use crate::repositories::SectorRepository;
use crate::services::aggregator::{aggregate, SectorSummary};
use crate::services::reconciler::{reconcile, CrossSectorView, SectorSnapshot};

/// Layered time budgets for store access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardTimeouts {
    /// Connectivity probe at startup.
    pub connect: Duration,
    /// Loading a single sector.
    pub data_load: Duration,
    /// Composing the whole view.
    pub safety: Duration,
}

impl Default for DashboardTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(5_000),
            data_load: Duration::from_millis(8_000),
            safety: Duration::from_millis(15_000),
        }
    }
}

impl From<&AppConfig> for DashboardTimeouts {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            connect: cfg.connect_timeout(),
            data_load: cfg.data_load_timeout(),
            safety: cfg.safety_timeout(),
        }
    }
}

struct DashboardInner {
    repository: SectorRepository,
    timeouts: DashboardTimeouts,
    sequence: AtomicU64,
    latest: RwLock<Option<(u64, Arc<CrossSectorView>)>>,
    recent_events: Mutex<VecDeque<RealtimeEvent>>,
    recent_events_limit: usize,
}

/// Loads sector data and keeps the most recent composed view.
#[derive(Clone)]
pub struct DashboardService {
    inner: Arc<DashboardInner>,
}

impl DashboardService {
    pub fn new(
        repository: SectorRepository,
        timeouts: DashboardTimeouts,
        recent_events_limit: usize,
    ) -> Self {
        Self {
            inner: Arc::new(DashboardInner {
                repository,
                timeouts,
                sequence: AtomicU64::new(0),
                latest: RwLock::new(None),
                recent_events: Mutex::new(VecDeque::with_capacity(recent_events_limit)),
                recent_events_limit: recent_events_limit.max(1),
            }),
        }
    }

    pub fn timeouts(&self) -> DashboardTimeouts {
        self.inner.timeouts
    }

    /// Aggregates one sector within the data-load budget.
    #[instrument(skip(self))]
    pub async fn load_sector(&self, sector: Sector) -> Result<SectorSummary, ServiceError> {
        let budget = self.inner.timeouts.data_load;
        let records = timeout(budget, self.inner.repository.list_by_sector(sector))
            .await
            .map_err(|_| {
                ServiceError::Timeout(format!(
                    "loading sector {} exceeded {}ms",
                    sector,
                    budget.as_millis()
                ))
            })??;
        Ok(aggregate(sector, &records))
    }

    async fn load_or_absorb(&self, sector: Sector) -> Option<SectorSummary> {
        match self.load_sector(sector).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(%sector, error = %e, "sector unavailable; using zeroed summary");
                None
            }
        }
    }

    /// Builds a fresh view. Never fails: degraded sectors are zeroed and, if the
    /// safety budget runs out, the last completed view (or an empty one) is returned.
    pub async fn load_view(&self) -> Arc<CrossSectorView> {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let compose = async {
            let (receiving, packing, inventory, cost_entry) = tokio::join!(
                self.load_or_absorb(Sector::Receiving),
                self.load_or_absorb(Sector::Packing),
                self.load_or_absorb(Sector::Inventory),
                self.load_or_absorb(Sector::CostEntry),
            );
            reconcile(SectorSnapshot {
                receiving,
                packing,
                inventory,
                cost_entry,
            })
        };

        match timeout(self.inner.timeouts.safety, compose).await {
            Ok(view) => {
                let view = Arc::new(view);
                self.publish(sequence, view.clone()).await;
                view
            }
            Err(_) => {
                warn!(
                    sequence,
                    budget_ms = self.inner.timeouts.safety.as_millis() as u64,
                    "dashboard load hit the safety timeout; serving fallback view"
                );
                match self.latest().await {
                    Some(view) => view,
                    None => Arc::new(CrossSectorView::unavailable()),
                }
            }
        }
    }

    /// Stores `view` unless a newer load already landed.
    async fn publish(&self, sequence: u64, view: Arc<CrossSectorView>) {
        let mut latest = self.inner.latest.write().await;
        match latest.as_ref() {
            Some((current, _)) if *current > sequence => {
                info!(sequence, current, "discarding stale dashboard view");
            }
            _ => *latest = Some((sequence, view)),
        }
    }

    pub async fn latest(&self) -> Option<Arc<CrossSectorView>> {
        self.inner
            .latest
            .read()
            .await
            .as_ref()
            .map(|(_, view)| view.clone())
    }

    pub async fn record_event(&self, event: RealtimeEvent) {
        let mut events = self.inner.recent_events.lock().await;
        events.push_front(event);
        events.truncate(self.inner.recent_events_limit);
    }

    /// Newest first.
    pub async fn recent_events(&self) -> Vec<RealtimeEvent> {
        self.inner
            .recent_events
            .lock()
            .await
            .iter()
            .cloned()
            .collect()
    }

    /// Checks the store within the connect budget.
    pub async fn probe_store(&self) -> Result<(), ServiceError> {
        let budget = self.inner.timeouts.connect;
        timeout(budget, self.inner.repository.ping())
            .await
            .map_err(|_| {
                ServiceError::Timeout(format!(
                    "store connectivity check exceeded {}ms",
                    budget.as_millis()
                ))
            })?
    }

    /// Re-runs the aggregation on every realtime event.
    pub fn spawn_refresher(&self, events: &EventSender) -> JoinHandle<()> {
        let handler: Arc<dyn EventHandler> = Arc::new(self.clone());
        tokio::spawn(process_events(events.subscribe(), vec![handler]))
    }
}

#[async_trait]
impl EventHandler for DashboardService {
    async fn handle_event(&self, event: &RealtimeEvent) -> Result<(), String> {
        self.record_event(event.clone()).await;
        let view = self.load_view().await;
        info!(
            event_id = %event.id,
            degraded = view.degraded_sectors.len(),
            "dashboard refreshed after realtime event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{InMemoryRecordStore, RecordStore};
    use serde_json::json;

    fn service_with(store: Arc<dyn RecordStore>, limit: usize) -> DashboardService {
        DashboardService::new(
            SectorRepository::new(store),
            DashboardTimeouts::default(),
            limit,
        )
    }

    #[tokio::test]
    async fn load_view_aggregates_all_sectors() {
        let store = Arc::new(InMemoryRecordStore::new());
        store
            .set(
                "recebimento_2024-05-01",
                json!([{"numeroNF": "1", "volumes": 5, "status": "ok"}]).to_string(),
            )
            .await
            .unwrap();
        let service = service_with(store, 10);

        let view = service.load_view().await;
        assert_eq!(view.receiving.total_volumes, 5);
        assert!(view.degraded_sectors.is_empty());
        assert_eq!(service.latest().await.unwrap().receiving.total_volumes, 5);
    }

    #[tokio::test]
    async fn stale_load_does_not_overwrite_newer_view() {
        let service = service_with(Arc::new(InMemoryRecordStore::new()), 10);
        let newer = Arc::new(CrossSectorView::unavailable());
        service.publish(5, newer.clone()).await;

        let mut stale = CrossSectorView::unavailable();
        stale.insights = vec!["stale".into()];
        service.publish(3, Arc::new(stale)).await;

        let latest = service.latest().await.unwrap();
        assert!(Arc::ptr_eq(&latest, &newer));
    }

    #[tokio::test]
    async fn recent_events_are_bounded_newest_first() {
        let service = service_with(Arc::new(InMemoryRecordStore::new()), 2);
        for n in 0..3 {
            service
                .record_event(RealtimeEvent::new(
                    Sector::Inventory,
                    "inventory_updated",
                    format!("event {n}"),
                    serde_json::Value::Null,
                ))
                .await;
        }
        let events = service.recent_events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "event 2");
        assert_eq!(events[1].message, "event 1");
    }
}
