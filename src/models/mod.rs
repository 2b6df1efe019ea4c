pub mod cost_report;
pub mod inventory_report;
pub mod line_item;
pub mod packing;
pub mod receiving;
pub mod sector;

pub use cost_report::{CostReport, CostReportStatus};
pub use inventory_report::InventoryReport;
pub use line_item::LineItem;
pub use packing::{CartStatus, PackingCart, PackingNf, PackingNfStatus, PackingSnapshot};
pub use receiving::{Divergence, ReceivingNote, ReceivingStatus};
pub use sector::Sector;
