pub mod aggregator;
pub mod barcode;
pub mod dashboard;
pub mod inventory;
pub mod inventory_session;
pub mod reconciler;

pub use aggregator::{aggregate, SectorCounters, SectorSummary};
pub use barcode::{decode, DecodeError, DecodedScan};
pub use dashboard::{DashboardService, DashboardTimeouts};
pub use inventory::InventoryService;
pub use inventory_session::{InventorySession, ScanOutcome};
pub use reconciler::{reconcile, CrossSectorView, SectorSnapshot};
