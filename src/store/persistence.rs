//! JSON snapshot format for a quantized store.
//!
//! ```text
//! {
//!   "version": 1,
//!   "config":   { "dimension": .., "quantizationType": .., ... },
//!   "vectors":  [ { "id": .., "quantized": { "scalar": [..] }, "metadata": {..} }, .. ],
//!   "ranges":    { "mins": [..], "maxs": [..] },          // scalar stores
//!   "codebooks": { "dimension": .., "centroids": [..], .. } // product stores
//! }
//! ```
//!
//! Parsing is typed (unknown fields and wrong leaf types are rejected by
//! serde); [`validate_snapshot`] then checks every structural invariant
//! before the store builds anything from it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::error::{QuantError, Result};
use crate::index::quantization::pq::CodebookSnapshot;
use crate::index::quantization::sq::ScalarRanges;
use crate::index::quantization::{QuantizationType, QuantizedPayload};
use crate::types::{Metadata, VectorId};

/// Snapshot format version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreSnapshot {
    pub version: u32,
    pub config: StoreConfig,
    pub vectors: Vec<EntrySnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranges: Option<RangesSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codebooks: Option<CodebookSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EntrySnapshot {
    pub id: VectorId,
    pub quantized: QuantizedPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RangesSnapshot {
    pub mins: Vec<f32>,
    pub maxs: Vec<f32>,
}

impl From<&ScalarRanges> for RangesSnapshot {
    fn from(ranges: &ScalarRanges) -> Self {
        Self {
            mins: ranges.mins.clone(),
            maxs: ranges.maxs.clone(),
        }
    }
}

/// Parse a snapshot without validating it.
pub fn parse_snapshot(json: &str) -> Result<StoreSnapshot> {
    Ok(serde_json::from_str(json)?)
}

/// Check a parsed snapshot against every invariant the store relies on and
/// return its resolved config.
pub fn validate_snapshot(snapshot: &StoreSnapshot) -> Result<StoreConfig> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(QuantError::Integrity(format!(
            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            snapshot.version
        )));
    }

    let config = snapshot
        .config
        .clone()
        .resolve()
        .map_err(|e| QuantError::Integrity(format!("invalid config: {e}")))?;

    if snapshot.vectors.len() > config.max_vectors {
        return Err(QuantError::Integrity(format!(
            "snapshot holds {} vectors, above maxVectors {}",
            snapshot.vectors.len(),
            config.max_vectors
        )));
    }

    let mut seen = HashSet::with_capacity(snapshot.vectors.len());
    for entry in &snapshot.vectors {
        if entry.id.is_empty() {
            return Err(QuantError::Integrity("empty vector id".into()));
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(QuantError::Integrity(format!(
                "duplicate vector id {:?}",
                entry.id
            )));
        }
    }

    match config.quantization_type {
        QuantizationType::Scalar8 | QuantizationType::Scalar4 => {
            validate_scalar(snapshot, &config)?
        }
        QuantizationType::Product => validate_product(snapshot, &config)?,
    }

    Ok(config)
}

fn validate_scalar(snapshot: &StoreSnapshot, config: &StoreConfig) -> Result<()> {
    if snapshot.codebooks.is_some() {
        return Err(QuantError::Integrity(
            "scalar snapshot carries codebooks".into(),
        ));
    }
    match &snapshot.ranges {
        Some(ranges) => {
            if ranges.mins.len() != config.dimension || ranges.maxs.len() != config.dimension {
                return Err(QuantError::Integrity(format!(
                    "ranges have {}/{} entries for dimension {}",
                    ranges.mins.len(),
                    ranges.maxs.len(),
                    config.dimension
                )));
            }
            // Finiteness and ordering.
            let bits = config
                .quantization_type
                .scalar_bits()
                .ok_or_else(|| QuantError::Integrity("not a scalar store".into()))?;
            ScalarRanges::from_bounds(bits, ranges.mins.clone(), ranges.maxs.clone())?;
        }
        None if !snapshot.vectors.is_empty() => {
            return Err(QuantError::Integrity(
                "scalar snapshot with vectors has no ranges".into(),
            ));
        }
        None => {}
    }

    let bits = config
        .quantization_type
        .scalar_bits()
        .ok_or_else(|| QuantError::Integrity("not a scalar store".into()))?;
    let expected = bits.packed_len(config.dimension);
    let odd_nibble = bits.bits() == 4 && config.dimension % 2 == 1;

    for entry in &snapshot.vectors {
        let codes = match &entry.quantized {
            QuantizedPayload::Scalar(codes) => codes,
            QuantizedPayload::Product(_) => {
                return Err(QuantError::Integrity(format!(
                    "vector {:?} has a product payload in a scalar store",
                    entry.id
                )))
            }
        };
        if codes.len() != expected {
            return Err(QuantError::Integrity(format!(
                "vector {:?} has {} code bytes, expected {expected}",
                entry.id,
                codes.len()
            )));
        }
        if odd_nibble && codes.last().is_some_and(|b| b & 0x0F != 0) {
            return Err(QuantError::Integrity(format!(
                "vector {:?} has a non-zero padding nibble",
                entry.id
            )));
        }
    }
    Ok(())
}

fn validate_product(snapshot: &StoreSnapshot, config: &StoreConfig) -> Result<()> {
    if snapshot.ranges.is_some() {
        return Err(QuantError::Integrity(
            "product snapshot carries scalar ranges".into(),
        ));
    }
    let pc = config
        .product_config
        .as_ref()
        .ok_or_else(|| QuantError::Integrity("product config missing".into()))?;

    match &snapshot.codebooks {
        Some(codebooks) => {
            codebooks.validate()?;
            if codebooks.dimension != config.dimension
                || codebooks.num_subspaces != pc.num_subspaces
                || codebooks.num_centroids != pc.num_centroids
            {
                return Err(QuantError::Integrity(
                    "codebook shape does not match store config".into(),
                ));
            }
        }
        None if !snapshot.vectors.is_empty() => {
            return Err(QuantError::Integrity(
                "product snapshot with vectors has no codebooks".into(),
            ));
        }
        None => {}
    }

    for entry in &snapshot.vectors {
        let encoded = match &entry.quantized {
            QuantizedPayload::Product(encoded) => encoded,
            QuantizedPayload::Scalar(_) => {
                return Err(QuantError::Integrity(format!(
                    "vector {:?} has a scalar payload in a product store",
                    entry.id
                )))
            }
        };
        if encoded.codes.len() != pc.num_subspaces {
            return Err(QuantError::Integrity(format!(
                "vector {:?} has {} codes, expected {}",
                entry.id,
                encoded.codes.len(),
                pc.num_subspaces
            )));
        }
        if let Some(&bad) = encoded
            .codes
            .iter()
            .find(|&&c| c as usize >= pc.num_centroids)
        {
            return Err(QuantError::Integrity(format!(
                "vector {:?} has code {bad} >= numCentroids {}",
                entry.id, pc.num_centroids
            )));
        }
        if !encoded.norm.is_finite() || encoded.norm < 0.0 {
            return Err(QuantError::Integrity(format!(
                "vector {:?} has invalid norm {}",
                entry.id, encoded.norm
            )));
        }
    }
    Ok(())
}
