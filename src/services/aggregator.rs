//! Reduces the stored records of one sector into a [`SectorSummary`].
//!
//! The reduction is a fold over independent per-entry contributions, so
//! `aggregate(a ++ b) == aggregate(a).merge(aggregate(b))` for any split.
//! Entries that fail to parse are logged and counted in `skipped_records`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::models::{
    CartStatus, CostReport, CostReportStatus, LineItem, PackingSnapshot, ReceivingNote, Sector,
};
use crate::repositories::StoredRecord;

/// Counters that only make sense for one sector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectorCounters {
    Receiving {
        divergences: u64,
    },
    Packing {
        carts: u64,
        carts_in_production: u64,
    },
    Inventory {
        locations: BTreeSet<String>,
    },
    CostEntry {
        reports: u64,
        awaiting_posting: u64,
        posting: u64,
        posted: u64,
        failed: u64,
        reports_by_area: BTreeMap<String, u64>,
    },
}

impl SectorCounters {
    pub fn empty(sector: Sector) -> Self {
        match sector {
            Sector::Receiving => SectorCounters::Receiving { divergences: 0 },
            Sector::Packing => SectorCounters::Packing {
                carts: 0,
                carts_in_production: 0,
            },
            Sector::Inventory => SectorCounters::Inventory {
                locations: BTreeSet::new(),
            },
            Sector::CostEntry => SectorCounters::CostEntry {
                reports: 0,
                awaiting_posting: 0,
                posting: 0,
                posted: 0,
                failed: 0,
                reports_by_area: BTreeMap::new(),
            },
        }
    }

    fn merge(&mut self, other: SectorCounters) {
        match (self, other) {
            (
                SectorCounters::Receiving { divergences },
                SectorCounters::Receiving { divergences: d },
            ) => *divergences += d,
            (
                SectorCounters::Packing {
                    carts,
                    carts_in_production,
                },
                SectorCounters::Packing {
                    carts: c,
                    carts_in_production: p,
                },
            ) => {
                *carts += c;
                *carts_in_production += p;
            }
            (
                SectorCounters::Inventory { locations },
                SectorCounters::Inventory { locations: l },
            ) => locations.extend(l),
            (
                SectorCounters::CostEntry {
                    reports,
                    awaiting_posting,
                    posting,
                    posted,
                    failed,
                    reports_by_area,
                },
                SectorCounters::CostEntry {
                    reports: r,
                    awaiting_posting: a,
                    posting: p,
                    posted: d,
                    failed: f,
                    reports_by_area: by_area,
                },
            ) => {
                *reports += r;
                *awaiting_posting += a;
                *posting += p;
                *posted += d;
                *failed += f;
                for (area, count) in by_area {
                    *reports_by_area.entry(area).or_default() += count;
                }
            }
            (mine, theirs) => {
                warn!(?mine, ?theirs, "ignoring counters from a different sector");
            }
        }
    }
}

/// Derived statistics for one sector. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorSummary {
    pub sector: Sector,
    pub total_documents: u64,
    pub total_volumes: u64,
    /// Documents that reached the sector's final state.
    pub completed_documents: u64,
    pub skipped_records: u64,
    pub counters: SectorCounters,
}

impl SectorSummary {
    pub fn empty(sector: Sector) -> Self {
        Self {
            sector,
            total_documents: 0,
            total_volumes: 0,
            completed_documents: 0,
            skipped_records: 0,
            counters: SectorCounters::empty(sector),
        }
    }

    /// Combines two partial aggregates of the same sector.
    pub fn merge(mut self, other: SectorSummary) -> SectorSummary {
        self.total_documents += other.total_documents;
        self.total_volumes += other.total_volumes;
        self.completed_documents += other.completed_documents;
        self.skipped_records += other.skipped_records;
        self.counters.merge(other.counters);
        self
    }

    pub fn divergences(&self) -> u64 {
        match self.counters {
            SectorCounters::Receiving { divergences } => divergences,
            _ => 0,
        }
    }

    pub fn carts_in_production(&self) -> u64 {
        match self.counters {
            SectorCounters::Packing {
                carts_in_production,
                ..
            } => carts_in_production,
            _ => 0,
        }
    }

    pub fn location_count(&self) -> usize {
        match &self.counters {
            SectorCounters::Inventory { locations } => locations.len(),
            _ => 0,
        }
    }

    fn skip(&mut self, key: &str, error: &serde_json::Error) {
        warn!(sector = %self.sector, key, error = %error, "skipping corrupt stored record");
        self.skipped_records += 1;
    }
}

pub fn aggregate(sector: Sector, records: &[StoredRecord]) -> SectorSummary {
    let mut summary = SectorSummary::empty(sector);
    for record in records {
        absorb_record(&mut summary, record);
    }
    summary
}

fn absorb_record(summary: &mut SectorSummary, record: &StoredRecord) {
    if record.raw.trim().is_empty() {
        return;
    }
    match summary.sector {
        Sector::Receiving => {
            for note in parse_entries::<ReceivingNote>(summary, record) {
                absorb_receiving(summary, &note);
            }
        }
        Sector::Packing => match serde_json::from_str::<PackingSnapshot>(&record.raw) {
            Ok(snapshot) => absorb_packing(summary, &snapshot),
            Err(e) => summary.skip(&record.key, &e),
        },
        Sector::Inventory => {
            for item in parse_entries::<LineItem>(summary, record) {
                absorb_inventory(summary, &item);
            }
        }
        Sector::CostEntry => {
            for report in parse_entries::<CostReport>(summary, record) {
                absorb_cost(summary, &report);
            }
        }
    }
}

/// Parses an array value entry by entry so one bad element only drops itself.
fn parse_entries<T: DeserializeOwned>(summary: &mut SectorSummary, record: &StoredRecord) -> Vec<T> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(&record.raw) {
        Ok(values) => values,
        Err(e) => {
            summary.skip(&record.key, &e);
            return Vec::new();
        }
    };
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                summary.skip(&record.key, &e);
                None
            }
        })
        .collect()
}

fn absorb_receiving(summary: &mut SectorSummary, note: &ReceivingNote) {
    summary.total_documents += 1;
    summary.total_volumes += u64::from(note.effective_volumes());
    if note.is_divergent() {
        if let SectorCounters::Receiving { divergences } = &mut summary.counters {
            *divergences += 1;
        }
    } else {
        summary.completed_documents += 1;
    }
}

fn absorb_packing(summary: &mut SectorSummary, snapshot: &PackingSnapshot) {
    for cart in &snapshot.carts {
        let (documents, volumes) = cart
            .valid_nfs()
            .fold((0u64, 0u64), |(n, v), nf| (n + 1, v + u64::from(nf.volume_count)));
        summary.total_documents += documents;
        summary.total_volumes += volumes;
        if cart.status == CartStatus::Liberado {
            summary.completed_documents += documents;
        }
        if let SectorCounters::Packing {
            carts,
            carts_in_production,
        } = &mut summary.counters
        {
            *carts += 1;
            if cart.status == CartStatus::EmProducao {
                *carts_in_production += 1;
            }
        }
    }
}

fn absorb_inventory(summary: &mut SectorSummary, item: &LineItem) {
    summary.total_documents += 1;
    summary.completed_documents += 1;
    summary.total_volumes += item.total_volumes();
    if let SectorCounters::Inventory { locations } = &mut summary.counters {
        if !item.location_tag.is_empty() {
            locations.insert(item.location_tag.clone());
        }
    }
}

fn absorb_cost(summary: &mut SectorSummary, report: &CostReport) {
    summary.total_documents += report.document_count;
    summary.total_volumes += report.volume_sum;
    if report.status == CostReportStatus::Lancado {
        summary.completed_documents += report.document_count;
    }
    if let SectorCounters::CostEntry {
        reports,
        awaiting_posting,
        posting,
        posted,
        failed,
        reports_by_area,
    } = &mut summary.counters
    {
        *reports += 1;
        match report.status {
            CostReportStatus::AguardandoLancamento => *awaiting_posting += 1,
            CostReportStatus::EmLancamento => *posting += 1,
            CostReportStatus::Lancado => *posted += 1,
            CostReportStatus::ErroLancamento => *failed += 1,
        }
        *reports_by_area.entry(report.area.clone()).or_default() += 1;
    }
}
