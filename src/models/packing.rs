use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    AguardandoColagem,
    EmConferencia,
    Liberado,
    EmProducao,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackingNfStatus {
    Valida,
    Invalida,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackingNf {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "numeroNF")]
    pub document_number: String,
    #[serde(rename = "volume")]
    pub volume_count: u32,
    #[serde(rename = "fornecedor", default)]
    pub supplier: String,
    #[serde(rename = "codigo", default)]
    pub code: String,
    #[serde(default)]
    pub status: PackingNfStatus,
}

impl PackingNf {
    pub fn is_valid(&self) -> bool {
        self.status == PackingNfStatus::Valida
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackingCart {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "nome", default)]
    pub name: String,
    #[serde(rename = "destinoFinal", default)]
    pub final_destination: String,
    #[serde(default)]
    pub nfs: Vec<PackingNf>,
    #[serde(rename = "statusCarro")]
    pub status: CartStatus,
    #[serde(rename = "dataInicio", default)]
    pub started_at: String,
    #[serde(rename = "ativo", default)]
    pub active: bool,
}

impl PackingCart {
    pub fn valid_nfs(&self) -> impl Iterator<Item = &PackingNf> {
        self.nfs.iter().filter(|nf| nf.is_valid())
    }
}

/// Value stored under each packing key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackingSnapshot {
    #[serde(rename = "carros", default)]
    pub carts: Vec<PackingCart>,
}
