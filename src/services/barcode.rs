//! Decoding of the pipe-delimited payload printed on incoming invoices.
//!
//! Field order is fixed: `data|nf|volumes|destino|fornecedor|cliente_destino|tipo_carga`.
//! Only the volume field is validated; every other field is kept verbatim,
//! so empty supplier or destination strings are accepted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FIELD_DELIMITER: char = '|';
pub const FIELD_COUNT: usize = 7;
pub const EXPECTED_FORMAT: &str = "data|nf|volumes|destino|fornecedor|cliente_destino|tipo_carga";
pub const EXAMPLE_PAYLOAD: &str = "45868|000068310|0014|RJ08|EMS S/A|SAO JO|ROD";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected {expected} fields, found {found}")]
    MalformedPayload { found: usize, expected: usize },
    #[error("invalid volume count {0:?}")]
    InvalidVolume(String),
}

/// Structured view of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedScan {
    pub raw_payload: String,
    pub date: String,
    pub document_number: String,
    pub volume_count: u32,
    pub destination: String,
    pub supplier: String,
    pub client_destination: String,
    pub cargo_type: String,
}

pub fn decode(raw: &str) -> Result<DecodedScan, DecodeError> {
    let fields: Vec<&str> = raw.split(FIELD_DELIMITER).collect();
    if fields.len() != FIELD_COUNT {
        return Err(DecodeError::MalformedPayload {
            found: fields.len(),
            expected: FIELD_COUNT,
        });
    }

    let volume_count = parse_volume(fields[2])?;

    Ok(DecodedScan {
        raw_payload: raw.to_string(),
        date: fields[0].to_string(),
        document_number: fields[1].to_string(),
        volume_count,
        destination: fields[3].to_string(),
        supplier: fields[4].to_string(),
        client_destination: fields[5].to_string(),
        cargo_type: fields[6].to_string(),
    })
}

fn parse_volume(field: &str) -> Result<u32, DecodeError> {
    let invalid = || DecodeError::InvalidVolume(field.to_string());
    let value: i64 = field.trim().parse().map_err(|_| invalid())?;
    if value <= 0 {
        return Err(invalid());
    }
    u32::try_from(value).map_err(|_| invalid())
}
