use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceivingStatus {
    Ok,
    Divergencia,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    #[serde(rename = "tipo", default)]
    pub kind: String,
    #[serde(rename = "descricao", default)]
    pub description: String,
    #[serde(rename = "volumesInformados", default)]
    pub informed_volumes: u32,
}

/// Invoice checked in at the receiving dock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivingNote {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "codigoCompleto", default)]
    pub scan_code: String,
    #[serde(rename = "numeroNF")]
    pub document_number: String,
    #[serde(rename = "volumes")]
    pub volume_count: u32,
    #[serde(rename = "fornecedor", default)]
    pub supplier: String,
    #[serde(default)]
    pub timestamp: String,
    pub status: ReceivingStatus,
    #[serde(rename = "divergencia", default, skip_serializing_if = "Option::is_none")]
    pub divergence: Option<Divergence>,
}

impl ReceivingNote {
    /// Informed volume overrides the nominal one when a divergence was recorded.
    pub fn effective_volumes(&self) -> u32 {
        match &self.divergence {
            Some(d) if d.informed_volumes > 0 => d.informed_volumes,
            _ => self.volume_count,
        }
    }

    pub fn is_divergent(&self) -> bool {
        self.status == ReceivingStatus::Divergencia
    }
}
