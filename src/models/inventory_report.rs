use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LineItem;

/// Archived result of a finalized inventory pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryReport {
    pub id: String,
    #[serde(rename = "rua")]
    pub location_tag: String,
    #[serde(rename = "data")]
    pub date: String,
    #[serde(rename = "turno")]
    pub shift: String,
    #[serde(rename = "colaborador")]
    pub operator: String,
    #[serde(rename = "itens")]
    pub items: Vec<LineItem>,
    #[serde(rename = "totalItens")]
    pub total_items: usize,
    #[serde(rename = "tempoInicio")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "tempoFim")]
    pub finished_at: DateTime<Utc>,
}
