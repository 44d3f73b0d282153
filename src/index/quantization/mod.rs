//! Vector quantization codecs.
//!
//! Provides compression schemes that let the store search directly against
//! compact codes.
//!
//! Supported schemes:
//! - **SQ8 / SQ4** (Scalar Quantization): maps each f32 dimension to an 8-bit
//!   or 4-bit code using per-dimension min/max. Fast and training-free.
//! - **PQ** (Product Quantization): divides vectors into M subvectors,
//!   trains codebooks via k-means, stores M-byte codes plus a norm.

pub mod kmeans;
pub mod pq;
pub mod sq;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::DistanceMetric;

pub use pq::{ProductCodec, ProductConfig, ProductEncoded};
pub use sq::{ScalarBits, ScalarCodec, ScalarQuantized};

/// Quantization method selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantizationType {
    /// Scalar quantization to u8 (4x compression).
    #[default]
    #[serde(rename = "scalar-8bit")]
    Scalar8,
    /// Scalar quantization to 4-bit nibbles (8x compression).
    #[serde(rename = "scalar-4bit")]
    Scalar4,
    /// Product quantization.
    #[serde(rename = "product")]
    Product,
}

impl QuantizationType {
    /// Bit depth for the scalar variants.
    pub fn scalar_bits(self) -> Option<ScalarBits> {
        match self {
            QuantizationType::Scalar8 => Some(ScalarBits::Eight),
            QuantizationType::Scalar4 => Some(ScalarBits::Four),
            QuantizationType::Product => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuantizationType::Scalar8 => "scalar-8bit",
            QuantizationType::Scalar4 => "scalar-4bit",
            QuantizationType::Product => "product",
        }
    }
}

impl std::fmt::Display for QuantizationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuantizationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scalar-8bit" | "scalar8" | "sq8" => Ok(QuantizationType::Scalar8),
            "scalar-4bit" | "scalar4" | "sq4" => Ok(QuantizationType::Scalar4),
            "product" | "pq" => Ok(QuantizationType::Product),
            other => Err(format!("unknown quantization type: {other}")),
        }
    }
}

/// One stored vector's compressed form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantizedPayload {
    /// Packed scalar codes, decoded against the store's shared ranges.
    Scalar(Vec<u8>),
    /// Product codes plus the original norm.
    Product(ProductEncoded),
}

impl QuantizedPayload {
    /// Bytes of code data held by this payload.
    pub fn size_bytes(&self) -> usize {
        match self {
            QuantizedPayload::Scalar(codes) => codes.len(),
            QuantizedPayload::Product(encoded) => {
                encoded.codes.len() + std::mem::size_of::<f32>()
            }
        }
    }
}

/// The interface the store drives every codec through.
///
/// `Query` is whatever per-query state makes repeated `distance` calls cheap
/// (a copy of the query for scalar codes, lookup tables for product codes).
/// Distances follow the store's "lower is closer" convention for the
/// metric the query was prepared with.
pub trait VectorCodec {
    type Query;

    fn dimension(&self) -> usize;

    fn encode(&self, vector: &[f32]) -> Result<QuantizedPayload>;

    fn decode(&self, payload: &QuantizedPayload) -> Result<Vec<f32>>;

    fn prepare_query(&self, query: &[f32], metric: DistanceMetric) -> Result<Self::Query>;

    fn distance(&self, query: &Self::Query, payload: &QuantizedPayload) -> Result<f32>;

    /// Bytes stored per vector.
    fn payload_bytes(&self) -> usize;

    /// Bytes of shared state (ranges, codebooks).
    fn overhead_bytes(&self) -> usize;
}
