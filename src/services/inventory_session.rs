use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::LineItem;
use crate::services::barcode::DecodedScan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Scanning,
    Closed,
}

/// Result of applying one scan to a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanOutcome {
    pub item: LineItem,
    /// True when the scan code was already present and its quantity was bumped.
    pub merged: bool,
}

/// Working set of one aisle pass. Items keep scan order and are unique by scan code.
#[derive(Debug, Clone)]
pub struct InventorySession {
    session_id: String,
    location_tag: Option<String>,
    items: Vec<LineItem>,
    index: HashMap<String, usize>,
    state: SessionState,
    started_at: Option<DateTime<Utc>>,
}

impl InventorySession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            location_tag: None,
            items: Vec::new(),
            index: HashMap::new(),
            state: SessionState::Idle,
            started_at: None,
        }
    }

    /// Rebuilds a session from persisted items. Later duplicates fold into the first occurrence.
    pub fn restore(session_id: impl Into<String>, items: Vec<LineItem>) -> Self {
        let mut session = Self::new(session_id);
        for item in items {
            match session.index.get(&item.scan_code) {
                Some(&pos) => session.items[pos].quantity += item.quantity,
                None => {
                    session.index.insert(item.scan_code.clone(), session.items.len());
                    session.items.push(item);
                }
            }
        }
        session
    }

    pub fn start(&mut self, location_tag: &str, now: DateTime<Utc>) -> Result<(), ServiceError> {
        let tag = location_tag.trim();
        if tag.is_empty() {
            return Err(ServiceError::ValidationError(
                "rua must not be empty".to_string(),
            ));
        }
        let other_aisle = self.location_tag.as_deref().is_some_and(|current| current != tag)
            || self.items.iter().any(|item| item.location_tag != tag);
        if !self.items.is_empty() && other_aisle {
            return Err(ServiceError::Conflict(format!(
                "session {} still holds {} items from another rua; reset it before starting {}",
                self.session_id,
                self.items.len(),
                tag
            )));
        }
        self.location_tag = Some(tag.to_string());
        self.state = SessionState::Scanning;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn apply_scan(
        &mut self,
        decoded: &DecodedScan,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, ServiceError> {
        let location_tag = match (&self.state, &self.location_tag) {
            (SessionState::Scanning, Some(tag)) => tag.clone(),
            _ => {
                return Err(ServiceError::Conflict(format!(
                    "session {} is not scanning",
                    self.session_id
                )))
            }
        };

        if let Some(&pos) = self.index.get(&decoded.raw_payload) {
            let item = &mut self.items[pos];
            item.quantity += 1;
            item.timestamp = now;
            return Ok(ScanOutcome {
                item: item.clone(),
                merged: true,
            });
        }

        let item = LineItem {
            id: Uuid::new_v4().to_string(),
            scan_code: decoded.raw_payload.clone(),
            date: decoded.date.clone(),
            document_number: decoded.document_number.clone(),
            volume_count: decoded.volume_count,
            destination: decoded.destination.clone(),
            supplier: decoded.supplier.clone(),
            client_destination: decoded.client_destination.clone(),
            cargo_type: decoded.cargo_type.clone(),
            quantity: 1,
            location_tag,
            timestamp: now,
        };
        self.index.insert(item.scan_code.clone(), self.items.len());
        self.items.push(item.clone());
        Ok(ScanOutcome {
            item,
            merged: false,
        })
    }

    /// Drops every item and the location tag.
    pub fn reset(&mut self) {
        self.items.clear();
        self.index.clear();
        self.location_tag = None;
        self.state = SessionState::Idle;
        self.started_at = None;
    }

    /// Marks the pass as finished and hands its items out, leaving the session empty.
    pub fn close(&mut self) -> Vec<LineItem> {
        self.index.clear();
        self.location_tag = None;
        self.started_at = None;
        self.state = SessionState::Closed;
        std::mem::take(&mut self.items)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn location_tag(&self) -> Option<&str> {
        self.location_tag.as_deref()
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn is_scanning(&self) -> bool {
        self.state == SessionState::Scanning
    }

    pub fn total_volumes(&self) -> u64 {
        self.items.iter().map(LineItem::total_volumes).sum()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
