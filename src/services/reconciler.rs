//! Composes the four sector summaries into the dashboard view.
//!
//! A missing summary never fails the composition: the sector is zeroed and
//! reported in `degraded_sectors`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Sector;
use crate::services::aggregator::{SectorCounters, SectorSummary};

pub const UNAVAILABLE_INSIGHT: &str = "Dados temporariamente indisponíveis";
pub const BALANCED_INSIGHT: &str = "Operação equilibrada entre os setores";

/// Per-sector aggregates as loaded; `None` means the load failed.
#[derive(Debug, Clone, Default)]
pub struct SectorSnapshot {
    pub receiving: Option<SectorSummary>,
    pub packing: Option<SectorSummary>,
    pub inventory: Option<SectorSummary>,
    pub cost_entry: Option<SectorSummary>,
}

impl SectorSnapshot {
    pub fn set(&mut self, sector: Sector, summary: Option<SectorSummary>) {
        let slot = match sector {
            Sector::Receiving => &mut self.receiving,
            Sector::Packing => &mut self.packing,
            Sector::Inventory => &mut self.inventory,
            Sector::CostEntry => &mut self.cost_entry,
        };
        *slot = summary;
    }

    pub fn get(&self, sector: Sector) -> Option<&SectorSummary> {
        match sector {
            Sector::Receiving => self.receiving.as_ref(),
            Sector::Packing => self.packing.as_ref(),
            Sector::Inventory => self.inventory.as_ref(),
            Sector::CostEntry => self.cost_entry.as_ref(),
        }
    }
}

/// One bar of the sector chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    #[serde(rename = "NFs")]
    pub documents: u64,
    #[serde(rename = "Volumes")]
    pub volumes: u64,
    pub fill: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorEfficiency {
    pub sector: Sector,
    /// Completion rate in percent, 0 when the sector has no documents.
    pub score: f64,
    pub volumes_per_document: f64,
    pub completed: u64,
    pub total: u64,
}

impl SectorEfficiency {
    fn from_summary(summary: &SectorSummary) -> Self {
        let total = summary.total_documents;
        let completed = summary.completed_documents.min(total);
        let (score, volumes_per_document) = if total == 0 {
            (0.0, 0.0)
        } else {
            (
                100.0 * completed as f64 / total as f64,
                summary.total_volumes as f64 / total as f64,
            )
        };
        Self {
            sector: summary.sector,
            score,
            volumes_per_document,
            completed,
            total,
        }
    }
}

/// Complete dashboard view, rebuilt wholesale on every load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSectorView {
    pub receiving: SectorSummary,
    pub packing: SectorSummary,
    pub inventory: SectorSummary,
    pub cost_entry: SectorSummary,
    pub chart: Vec<ChartPoint>,
    pub efficiency: Vec<SectorEfficiency>,
    pub insights: Vec<String>,
    pub degraded_sectors: Vec<Sector>,
    pub generated_at: DateTime<Utc>,
}

impl CrossSectorView {
    /// Fully degraded view used when nothing could be loaded in time.
    pub fn unavailable() -> Self {
        reconcile(SectorSnapshot::default())
    }

    pub fn summary(&self, sector: Sector) -> &SectorSummary {
        match sector {
            Sector::Receiving => &self.receiving,
            Sector::Packing => &self.packing,
            Sector::Inventory => &self.inventory,
            Sector::CostEntry => &self.cost_entry,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded_sectors.is_empty()
    }
}

pub fn reconcile(snapshot: SectorSnapshot) -> CrossSectorView {
    let degraded_sectors: Vec<Sector> = Sector::ALL
        .into_iter()
        .filter(|sector| snapshot.get(*sector).is_none())
        .collect();

    let resolve = |summary: Option<SectorSummary>, sector: Sector| {
        summary.unwrap_or_else(|| SectorSummary::empty(sector))
    };
    let receiving = resolve(snapshot.receiving, Sector::Receiving);
    let packing = resolve(snapshot.packing, Sector::Packing);
    let inventory = resolve(snapshot.inventory, Sector::Inventory);
    let cost_entry = resolve(snapshot.cost_entry, Sector::CostEntry);

    let ordered = [&receiving, &packing, &inventory, &cost_entry];
    let chart = ordered
        .iter()
        .map(|summary| ChartPoint {
            name: summary.sector.display_name().to_string(),
            documents: summary.total_documents,
            volumes: summary.total_volumes,
            fill: summary.sector.chart_color().to_string(),
        })
        .collect();
    let efficiency = ordered
        .iter()
        .map(|summary| SectorEfficiency::from_summary(summary))
        .collect();

    let insights = if degraded_sectors.len() == Sector::ALL.len() {
        vec![UNAVAILABLE_INSIGHT.to_string()]
    } else {
        derive_insights(&receiving, &packing, &inventory, &cost_entry, &degraded_sectors)
    };

    CrossSectorView {
        receiving,
        packing,
        inventory,
        cost_entry,
        chart,
        efficiency,
        insights,
        degraded_sectors,
        generated_at: Utc::now(),
    }
}

fn derive_insights(
    receiving: &SectorSummary,
    packing: &SectorSummary,
    inventory: &SectorSummary,
    cost_entry: &SectorSummary,
    degraded: &[Sector],
) -> Vec<String> {
    let mut insights = Vec::new();

    if !degraded.is_empty() {
        let names: Vec<&str> = degraded.iter().map(|s| s.display_name()).collect();
        insights.push(format!(
            "Dados indisponíveis para: {} (valores zerados)",
            names.join(", ")
        ));
    }

    if receiving.total_volumes > packing.total_volumes && packing.total_documents > 0 {
        insights.push(format!(
            "Recebimento excede a embalagem em {} volumes: possível acúmulo",
            receiving.total_volumes - packing.total_volumes
        ));
    } else if packing.total_volumes > receiving.total_volumes && receiving.total_documents > 0 {
        insights.push(format!(
            "Embalagem processou {} volumes a mais que o recebido no período",
            packing.total_volumes - receiving.total_volumes
        ));
    }

    let divergences = receiving.divergences();
    if divergences > 0 && receiving.total_documents > 0 {
        let rate = 100.0 * divergences as f64 / receiving.total_documents as f64;
        insights.push(format!(
            "{} notas com divergência no recebimento ({:.1}%)",
            divergences, rate
        ));
    }

    if let SectorCounters::CostEntry {
        awaiting_posting,
        failed,
        ..
    } = &cost_entry.counters
    {
        if *awaiting_posting > 0 {
            insights.push(format!(
                "{} relatórios aguardando lançamento em custos",
                awaiting_posting
            ));
        }
        if *failed > 0 {
            insights.push(format!("{} relatórios com erro de lançamento", failed));
        }
    }

    let locations = inventory.location_count();
    if locations > 0 {
        insights.push(format!(
            "Inventário cobre {} ruas com {} volumes contados",
            locations, inventory.total_volumes
        ));
    }

    let in_production = packing.carts_in_production();
    if in_production > 0 {
        insights.push(format!("{} carros em produção na embalagem", in_production));
    }

    if insights.is_empty() {
        insights.push(BALANCED_INSIGHT.to_string());
    }
    insights
}
