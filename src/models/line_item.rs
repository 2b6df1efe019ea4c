use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scanned unit as persisted under the inventory keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    /// Raw barcode payload; unique within an inventory session.
    #[serde(rename = "codigoCompleto")]
    pub scan_code: String,
    #[serde(rename = "data", default)]
    pub date: String,
    #[serde(rename = "numeroNF")]
    pub document_number: String,
    #[serde(rename = "volumes")]
    pub volume_count: u32,
    #[serde(rename = "destino", default)]
    pub destination: String,
    #[serde(rename = "fornecedor", default)]
    pub supplier: String,
    #[serde(rename = "clienteDestino", default)]
    pub client_destination: String,
    #[serde(rename = "tipoCarga", default)]
    pub cargo_type: String,
    #[serde(rename = "quantidade", default = "default_quantity")]
    pub quantity: u32,
    #[serde(rename = "rua", default)]
    pub location_tag: String,
    pub timestamp: DateTime<Utc>,
}

fn default_quantity() -> u32 {
    1
}

impl LineItem {
    pub fn total_volumes(&self) -> u64 {
        u64::from(self.volume_count) * u64::from(self.quantity)
    }
}
