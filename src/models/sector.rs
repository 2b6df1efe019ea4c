use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One of the four operational domains tracked by the control tower.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum Sector {
    #[serde(alias = "recebimento")]
    #[strum(to_string = "receiving", serialize = "recebimento")]
    Receiving,
    #[serde(alias = "embalagem")]
    #[strum(to_string = "packing", serialize = "embalagem")]
    Packing,
    #[serde(alias = "inventario")]
    #[strum(to_string = "inventory", serialize = "inventario")]
    Inventory,
    #[serde(alias = "custos")]
    #[strum(to_string = "cost_entry", serialize = "custos")]
    CostEntry,
}

impl Sector {
    pub const ALL: [Sector; 4] = [
        Sector::Receiving,
        Sector::Packing,
        Sector::Inventory,
        Sector::CostEntry,
    ];

    /// Label used in the chart series.
    pub fn display_name(&self) -> &'static str {
        match self {
            Sector::Receiving => "Recebimento",
            Sector::Packing => "Embalagem",
            Sector::Inventory => "Inventário",
            Sector::CostEntry => "Custos",
        }
    }

    pub fn chart_color(&self) -> &'static str {
        match self {
            Sector::Receiving => "#3b82f6",
            Sector::Packing => "#10b981",
            Sector::Inventory => "#f59e0b",
            Sector::CostEntry => "#ef4444",
        }
    }
}
