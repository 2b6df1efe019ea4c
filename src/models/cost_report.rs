use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostReportStatus {
    AguardandoLancamento,
    EmLancamento,
    Lancado,
    ErroLancamento,
}

/// Carrier report waiting to be posted by the cost-entry team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    #[serde(default)]
    pub id: String,
    /// Carrier name.
    #[serde(rename = "nome", default)]
    pub name: String,
    #[serde(rename = "colaborador", default, deserialize_with = "one_or_many")]
    pub operators: Vec<String>,
    #[serde(rename = "data", default)]
    pub date: String,
    #[serde(rename = "turno", default)]
    pub shift: String,
    #[serde(default)]
    pub area: String,
    #[serde(rename = "quantidadeNotas", default)]
    pub document_count: u64,
    #[serde(rename = "somaVolumes", default)]
    pub volume_sum: u64,
    #[serde(rename = "notas", default)]
    pub notes: Vec<serde_json::Value>,
    #[serde(rename = "dataFinalizacao", default)]
    pub finalized_at: String,
    pub status: CostReportStatus,
    #[serde(rename = "observacoes", default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(rename = "dataLancamento", default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<String>,
    #[serde(rename = "numeroLancamento", default, skip_serializing_if = "Option::is_none")]
    pub posting_number: Option<String>,
    #[serde(
        rename = "responsavelLancamento",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub posted_by: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

// Older reports stored a single operator name instead of a list.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    })
}
