//! Scalar Quantization (SQ8 / SQ4): maps each f32 dimension to an 8-bit or
//! 4-bit code.
//!
//! For each dimension we keep a `min` and `max`. Encoding maps `[min, max]`
//! onto `[0, max_code]` with rounding; decoding maps back to approximate f32
//! values. A dimension whose range is degenerate (constant) gets scale 0 and
//! always decodes to its `min`.
//!
//! **Compression**: 4x for 8-bit, 8x for 4-bit.
//!
//! ## Packed layout
//!
//! 8-bit: one byte per dimension, in order.
//!
//! 4-bit: two dimensions per byte. Even index → high nibble, odd index → low
//! nibble:
//! ```text
//! byte[i] = (code[2i] << 4) | code[2i + 1]
//! ```
//! Odd-length vectors pad the final low nibble with 0.

use serde::{Deserialize, Serialize};

use super::{QuantizedPayload, VectorCodec};
use crate::error::{QuantError, Result};
use crate::index::distance::cosine_from_components;
use crate::types::DistanceMetric;

/// Bit depth of a scalar code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ScalarBits {
    Four,
    Eight,
}

impl ScalarBits {
    /// Largest representable code (15 or 255).
    #[inline]
    pub fn max_code(self) -> u8 {
        match self {
            ScalarBits::Four => 15,
            ScalarBits::Eight => 255,
        }
    }

    /// Number of bytes needed to pack `dim` codes.
    #[inline]
    pub fn packed_len(self, dim: usize) -> usize {
        match self {
            ScalarBits::Four => dim.div_ceil(2),
            ScalarBits::Eight => dim,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            ScalarBits::Four => 4,
            ScalarBits::Eight => 8,
        }
    }
}

impl TryFrom<u8> for ScalarBits {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            4 => Ok(ScalarBits::Four),
            8 => Ok(ScalarBits::Eight),
            other => Err(format!("unsupported scalar bit depth: {other}")),
        }
    }
}

impl From<ScalarBits> for u8 {
    fn from(bits: ScalarBits) -> u8 {
        bits.bits()
    }
}

// ---------------------------------------------------------------------------
// Nibble packing
// ---------------------------------------------------------------------------

/// Pack 4-bit codes two per byte (even index in the high nibble).
pub fn pack_nibbles(codes: &[u8]) -> Vec<u8> {
    codes
        .chunks(2)
        .map(|pair| {
            let high = pair[0] & 0x0F;
            let low = pair.get(1).copied().unwrap_or(0) & 0x0F;
            (high << 4) | low
        })
        .collect()
}

/// Unpack `len` 4-bit codes from a packed buffer.
pub fn unpack_nibbles(packed: &[u8], len: usize) -> Vec<u8> {
    (0..len).map(|i| nibble_at(packed, i)).collect()
}

/// Read the `i`-th 4-bit code from a packed buffer.
#[inline]
pub fn nibble_at(packed: &[u8], i: usize) -> u8 {
    let byte = packed[i / 2];
    if i % 2 == 0 {
        byte >> 4
    } else {
        byte & 0x0F
    }
}

#[inline]
fn code_at(packed: &[u8], i: usize, bits: ScalarBits) -> u8 {
    match bits {
        ScalarBits::Eight => packed[i],
        ScalarBits::Four => nibble_at(packed, i),
    }
}

// ---------------------------------------------------------------------------
// Calibrated ranges
// ---------------------------------------------------------------------------

/// Per-dimension calibration parameters shared by every vector encoded with
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarRanges {
    /// Bit depth of the codes.
    pub bits: ScalarBits,
    /// Minimum value per dimension.
    pub mins: Vec<f32>,
    /// Maximum value per dimension.
    pub maxs: Vec<f32>,
    /// `(max - min) / max_code` per dimension (for decoding). Held in f64
    /// so spans near `f32::MAX` do not overflow.
    steps: Vec<f64>,
    /// `max_code / (max - min)` per dimension (for encoding).
    scales: Vec<f64>,
}

impl ScalarRanges {
    /// Calibrate from a set of vectors by computing per-dimension min/max.
    ///
    /// All vectors must have length `dim`; callers validate beforehand.
    pub fn calibrate(vectors: &[&[f32]], dim: usize, bits: ScalarBits) -> Self {
        let mut mins = vec![f32::MAX; dim];
        let mut maxs = vec![f32::MIN; dim];

        for vec in vectors {
            for (d, &val) in vec.iter().enumerate() {
                if val < mins[d] {
                    mins[d] = val;
                }
                if val > maxs[d] {
                    maxs[d] = val;
                }
            }
        }

        // No data at all: collapse to a zero range.
        if vectors.is_empty() {
            mins.iter_mut().for_each(|m| *m = 0.0);
            maxs.iter_mut().for_each(|m| *m = 0.0);
        }

        Self::build(bits, mins, maxs)
    }

    /// Range spanning a single vector: its global min/max, applied to every
    /// dimension.
    pub fn for_vector(vector: &[f32], bits: ScalarBits) -> Self {
        let (lo, hi) = vector
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let (lo, hi) = if vector.is_empty() { (0.0, 0.0) } else { (lo, hi) };
        Self::build(bits, vec![lo; vector.len()], vec![hi; vector.len()])
    }

    /// Rebuild from stored bounds, checking their shape.
    pub fn from_bounds(bits: ScalarBits, mins: Vec<f32>, maxs: Vec<f32>) -> Result<Self> {
        if mins.len() != maxs.len() {
            return Err(QuantError::Integrity(format!(
                "scalar ranges length mismatch: {} mins, {} maxs",
                mins.len(),
                maxs.len()
            )));
        }
        for (d, (&lo, &hi)) in mins.iter().zip(maxs.iter()).enumerate() {
            if !lo.is_finite() || !hi.is_finite() {
                return Err(QuantError::Integrity(format!(
                    "scalar range for dimension {d} is not finite"
                )));
            }
            if lo > hi {
                return Err(QuantError::Integrity(format!(
                    "scalar range for dimension {d} is inverted: min {lo} > max {hi}"
                )));
            }
        }
        Ok(Self::build(bits, mins, maxs))
    }

    fn build(bits: ScalarBits, mins: Vec<f32>, maxs: Vec<f32>) -> Self {
        let max_code = f64::from(bits.max_code());
        let dim = mins.len();
        let mut steps = Vec::with_capacity(dim);
        let mut scales = Vec::with_capacity(dim);
        for d in 0..dim {
            let range = f64::from(maxs[d]) - f64::from(mins[d]);
            // Constant dimension: every value decodes to min.
            if range <= 0.0 {
                steps.push(0.0);
                scales.push(0.0);
            } else {
                steps.push(range / max_code);
                scales.push(max_code / range);
            }
        }
        Self {
            bits,
            mins,
            maxs,
            steps,
            scales,
        }
    }

    /// Dimensionality of the ranges.
    #[inline]
    pub fn dim(&self) -> usize {
        self.mins.len()
    }

    /// Whether every value of `vector` already lies inside the ranges.
    pub fn contains(&self, vector: &[f32]) -> bool {
        vector
            .iter()
            .enumerate()
            .all(|(d, &v)| v >= self.mins[d] && v <= self.maxs[d])
    }

    /// Ranges covering both `self` and every vector in `vectors`.
    pub fn widened(&self, vectors: &[&[f32]]) -> Self {
        let mut mins = self.mins.clone();
        let mut maxs = self.maxs.clone();
        for vec in vectors {
            for (d, &val) in vec.iter().enumerate() {
                mins[d] = mins[d].min(val);
                maxs[d] = maxs[d].max(val);
            }
        }
        Self::build(self.bits, mins, maxs)
    }

    /// Encode a single f32 vector to packed codes.
    pub fn encode(&self, vector: &[f32]) -> Vec<u8> {
        debug_assert_eq!(vector.len(), self.dim());
        let max_code = f64::from(self.bits.max_code());
        let codes = vector.iter().enumerate().map(|(d, &v)| {
            let val = ((f64::from(v) - f64::from(self.mins[d])) * self.scales[d]).round();
            val.clamp(0.0, max_code) as u8
        });
        match self.bits {
            ScalarBits::Eight => codes.collect(),
            ScalarBits::Four => pack_nibbles(&codes.collect::<Vec<u8>>()),
        }
    }

    /// Reconstruct the value of dimension `d` from a packed buffer.
    #[inline]
    pub fn value_at(&self, packed: &[u8], d: usize) -> f32 {
        (f64::from(self.mins[d]) + f64::from(code_at(packed, d, self.bits)) * self.steps[d]) as f32
    }

    /// Decode packed codes back to an approximate f32 vector.
    pub fn decode(&self, packed: &[u8]) -> Vec<f32> {
        debug_assert_eq!(packed.len(), self.bits.packed_len(self.dim()));
        (0..self.dim()).map(|d| self.value_at(packed, d)).collect()
    }

    /// Approximate squared L2 distance between a query (f32) and a packed
    /// vector, reconstructing one value at a time.
    #[inline]
    pub fn asymmetric_l2_squared(&self, query: &[f32], packed: &[u8]) -> f32 {
        debug_assert_eq!(query.len(), self.dim());
        query
            .iter()
            .enumerate()
            .map(|(d, &q)| {
                let diff = q - self.value_at(packed, d);
                diff * diff
            })
            .sum()
    }

    /// Approximate inner product between a query and a packed vector.
    #[inline]
    pub fn asymmetric_dot(&self, query: &[f32], packed: &[u8]) -> f32 {
        debug_assert_eq!(query.len(), self.dim());
        query
            .iter()
            .enumerate()
            .map(|(d, &q)| q * self.value_at(packed, d))
            .sum()
    }

    /// `(dot(query, r), ||r||^2)` for the reconstruction `r` of a packed
    /// vector, in one pass.
    #[inline]
    pub fn asymmetric_cosine_components(&self, query: &[f32], packed: &[u8]) -> (f32, f32) {
        debug_assert_eq!(query.len(), self.dim());
        query
            .iter()
            .enumerate()
            .fold((0.0f32, 0.0f32), |(dot, norm), (d, &q)| {
                let r = self.value_at(packed, d);
                (dot + q * r, norm + r * r)
            })
    }

    /// Bytes held by the bounds themselves.
    pub fn size_bytes(&self) -> usize {
        self.dim() * 2 * std::mem::size_of::<f32>()
    }
}

// ---------------------------------------------------------------------------
// Self-describing per-vector quantization
// ---------------------------------------------------------------------------

/// A vector quantized against its own range, carrying everything needed to
/// reconstruct it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScalarQuantized {
    /// Packed codes.
    pub data: Vec<u8>,
    /// Minimum value per dimension.
    pub mins: Vec<f32>,
    /// Maximum value per dimension.
    pub maxs: Vec<f32>,
    /// Number of encoded dimensions.
    pub dimension: usize,
    /// Bit depth of the codes.
    pub bits: ScalarBits,
}

impl ScalarQuantized {
    /// Compression ratio of the packed codes relative to f32 storage.
    pub fn compression_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 1.0;
        }
        (self.dimension * std::mem::size_of::<f32>()) as f32 / self.data.len() as f32
    }

    fn ranges(&self) -> Result<ScalarRanges> {
        if self.mins.len() != self.dimension {
            return Err(QuantError::Validation(format!(
                "scalar payload has {} mins for dimension {}",
                self.mins.len(),
                self.dimension
            )));
        }
        let expected = self.bits.packed_len(self.dimension);
        if self.data.len() != expected {
            return Err(QuantError::Validation(format!(
                "scalar payload has {} bytes, expected {expected}",
                self.data.len()
            )));
        }
        ScalarRanges::from_bounds(self.bits, self.mins.clone(), self.maxs.clone())
            .map_err(|e| QuantError::Validation(e.to_string()))
    }
}

/// Quantize a single vector against its own value range.
///
/// The range is the vector's global min/max, recorded for every dimension.
/// An empty vector yields an empty payload.
pub fn quantize(vector: &[f32], bits: ScalarBits) -> Result<ScalarQuantized> {
    if let Some(d) = vector.iter().position(|v| !v.is_finite()) {
        return Err(QuantError::Validation(format!(
            "value at dimension {d} is not finite"
        )));
    }
    let ranges = ScalarRanges::for_vector(vector, bits);
    let data = ranges.encode(vector);
    Ok(ScalarQuantized {
        data,
        mins: ranges.mins,
        maxs: ranges.maxs,
        dimension: vector.len(),
        bits,
    })
}

/// Reconstruct an approximate vector from a self-describing payload.
pub fn dequantize(quantized: &ScalarQuantized) -> Result<Vec<f32>> {
    let ranges = quantized.ranges()?;
    Ok(ranges.decode(&quantized.data))
}

/// Squared Euclidean distance between `query` and a quantized vector,
/// without materializing the reconstruction.
pub fn compute_distance(quantized: &ScalarQuantized, query: &[f32]) -> Result<f32> {
    if query.len() != quantized.dimension {
        return Err(QuantError::DimensionMismatch {
            expected: quantized.dimension,
            actual: query.len(),
        });
    }
    let ranges = quantized.ranges()?;
    Ok(ranges.asymmetric_l2_squared(query, &quantized.data))
}

// ---------------------------------------------------------------------------
// Store codec
// ---------------------------------------------------------------------------

/// Scalar codec over ranges shared by every vector in a store.
///
/// Uncalibrated until the first ranges are installed; the store does that
/// on its first flush.
#[derive(Debug, Clone)]
pub struct ScalarCodec {
    dimension: usize,
    bits: ScalarBits,
    ranges: Option<ScalarRanges>,
}

/// Prepared scalar query.
#[derive(Debug, Clone)]
pub struct ScalarQuery {
    values: Vec<f32>,
    metric: DistanceMetric,
    norm_sq: f32,
}

impl ScalarCodec {
    pub fn new(dimension: usize, bits: ScalarBits) -> Self {
        Self {
            dimension,
            bits,
            ranges: None,
        }
    }

    pub fn bits(&self) -> ScalarBits {
        self.bits
    }

    pub fn ranges(&self) -> Option<&ScalarRanges> {
        self.ranges.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.ranges.is_some()
    }

    /// Install new ranges. Existing codes are NOT re-encoded.
    pub fn set_ranges(&mut self, ranges: ScalarRanges) -> Result<()> {
        if ranges.dim() != self.dimension {
            return Err(QuantError::DimensionMismatch {
                expected: self.dimension,
                actual: ranges.dim(),
            });
        }
        if ranges.bits != self.bits {
            return Err(QuantError::Integrity(format!(
                "ranges are {}-bit, codec is {}-bit",
                ranges.bits.bits(),
                self.bits.bits()
            )));
        }
        self.ranges = Some(ranges);
        Ok(())
    }

    fn calibrated(&self) -> Result<&ScalarRanges> {
        self.ranges
            .as_ref()
            .ok_or_else(|| QuantError::Validation("scalar ranges are not calibrated".into()))
    }

    fn codes<'a>(&self, payload: &'a QuantizedPayload) -> Result<&'a [u8]> {
        match payload {
            QuantizedPayload::Scalar(codes) => {
                let expected = self.bits.packed_len(self.dimension);
                if codes.len() != expected {
                    return Err(QuantError::Validation(format!(
                        "scalar payload has {} bytes, expected {expected}",
                        codes.len()
                    )));
                }
                Ok(codes)
            }
            QuantizedPayload::Product(_) => Err(QuantError::Integrity(
                "product payload given to scalar codec".into(),
            )),
        }
    }
}

impl VectorCodec for ScalarCodec {
    type Query = ScalarQuery;

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, vector: &[f32]) -> Result<QuantizedPayload> {
        if vector.len() != self.dimension {
            return Err(QuantError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(QuantizedPayload::Scalar(self.calibrated()?.encode(vector)))
    }

    fn decode(&self, payload: &QuantizedPayload) -> Result<Vec<f32>> {
        let codes = self.codes(payload)?;
        Ok(self.calibrated()?.decode(codes))
    }

    fn prepare_query(&self, query: &[f32], metric: DistanceMetric) -> Result<ScalarQuery> {
        if query.len() != self.dimension {
            return Err(QuantError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        Ok(ScalarQuery {
            values: query.to_vec(),
            metric,
            norm_sq: query.iter().map(|v| v * v).sum(),
        })
    }

    fn distance(&self, query: &ScalarQuery, payload: &QuantizedPayload) -> Result<f32> {
        let codes = self.codes(payload)?;
        let ranges = self.calibrated()?;
        Ok(match query.metric {
            DistanceMetric::L2 => ranges
                .asymmetric_l2_squared(&query.values, codes)
                .max(0.0)
                .sqrt(),
            DistanceMetric::Ip => -ranges.asymmetric_dot(&query.values, codes),
            DistanceMetric::Cosine => {
                let (dot, recon_norm_sq) =
                    ranges.asymmetric_cosine_components(&query.values, codes);
                1.0 - cosine_from_components(dot, query.norm_sq, recon_norm_sq)
            }
        })
    }

    fn payload_bytes(&self) -> usize {
        self.bits.packed_len(self.dimension)
    }

    fn overhead_bytes(&self) -> usize {
        self.ranges.as_ref().map(ScalarRanges::size_bytes).unwrap_or(0)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vectors() -> Vec<Vec<f32>> {
        vec![
            vec![0.0, 1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0, 7.0],
            vec![1.0, 3.0, 5.0, 7.0],
            vec![2.0, 2.0, 2.0, 2.0],
        ]
    }

    fn refs(vecs: &[Vec<f32>]) -> Vec<&[f32]> {
        vecs.iter().map(|v| v.as_slice()).collect()
    }

    #[test]
    fn test_calibration() {
        let vecs = sample_vectors();
        let ranges = ScalarRanges::calibrate(&refs(&vecs), 4, ScalarBits::Eight);

        assert_eq!(ranges.dim(), 4);
        assert_eq!(ranges.mins, vec![0.0, 1.0, 2.0, 2.0]);
        assert_eq!(ranges.maxs, vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_encode_boundary_values() {
        let vecs = sample_vectors();
        let ranges = ScalarRanges::calibrate(&refs(&vecs), 4, ScalarBits::Eight);

        assert_eq!(ranges.encode(&[0.0, 1.0, 2.0, 2.0]), vec![0, 0, 0, 0]);
        assert_eq!(ranges.encode(&[4.0, 5.0, 6.0, 7.0]), vec![255, 255, 255, 255]);
    }

    #[test]
    fn test_encode_rounds_to_nearest() {
        let ranges = ScalarRanges::from_bounds(ScalarBits::Eight, vec![0.0], vec![255.0]).unwrap();
        assert_eq!(ranges.encode(&[10.4]), vec![10]);
        assert_eq!(ranges.encode(&[10.6]), vec![11]);
    }

    #[test]
    fn test_encode_clamps_out_of_range() {
        let ranges = ScalarRanges::from_bounds(ScalarBits::Four, vec![0.0, 0.0], vec![1.0, 1.0])
            .unwrap();
        let packed = ranges.encode(&[-5.0, 5.0]);
        assert_eq!(unpack_nibbles(&packed, 2), vec![0, 15]);
    }

    #[test]
    fn test_constant_dimension() {
        let vecs = vec![vec![1.0, 5.0], vec![1.0, 3.0], vec![1.0, 7.0]];
        let ranges = ScalarRanges::calibrate(&refs(&vecs), 2, ScalarBits::Eight);

        let codes = ranges.encode(&[1.0, 5.0]);
        assert_eq!(codes[0], 0);
        let decoded = ranges.decode(&codes);
        assert!((decoded[0] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_tiny_span_is_not_degenerate() {
        let v = [1e-8, 5e-8, 9e-8];
        let q = quantize(&v, ScalarBits::Eight).unwrap();
        assert_eq!(q.data[0], 0);
        assert_eq!(q.data[2], 255);
        let back = dequantize(&q).unwrap();
        let half_step = 8e-8 / 255.0 / 2.0;
        for (a, b) in v.iter().zip(back.iter()) {
            assert!((a - b).abs() <= half_step * 1.01, "{a} vs {b}");
        }
    }

    #[test]
    fn test_extreme_bounds_decode_finite() {
        let ranges =
            ScalarRanges::from_bounds(ScalarBits::Eight, vec![-f32::MAX], vec![f32::MAX]).unwrap();
        for v in [-f32::MAX, 0.0, f32::MAX] {
            let codes = ranges.encode(&[v]);
            let back = ranges.decode(&codes)[0];
            assert!(back.is_finite(), "{v} decoded to {back}");
        }
        assert_eq!(ranges.encode(&[f32::MAX]), vec![255]);
        let top = ranges.decode(&[255])[0];
        assert!((f64::from(top) - f64::from(f32::MAX)).abs() <= f64::from(f32::MAX) * 1e-6);
    }

    #[test]
    fn test_nibble_layout() {
        // Even index → high nibble, odd index → low nibble, odd length pads 0.
        let packed = pack_nibbles(&[0xA, 0x3, 0xF]);
        assert_eq!(packed, vec![0xA3, 0xF0]);
        assert_eq!(unpack_nibbles(&packed, 3), vec![0xA, 0x3, 0xF]);
        assert_eq!(nibble_at(&packed, 1), 0x3);
    }

    #[test]
    fn test_packed_len() {
        assert_eq!(ScalarBits::Eight.packed_len(5), 5);
        assert_eq!(ScalarBits::Four.packed_len(5), 3);
        assert_eq!(ScalarBits::Four.packed_len(4), 2);
        assert_eq!(ScalarBits::Four.packed_len(0), 0);
    }

    #[test]
    fn test_quantize_8bit_example() {
        let v = vec![0.1, 0.5, 0.9, -0.3, 0.0];
        let q = quantize(&v, ScalarBits::Eight).unwrap();
        assert_eq!(q.data.len(), 5);
        assert_eq!(q.mins.len(), 5);
        let back = dequantize(&q).unwrap();
        for (orig, dec) in v.iter().zip(back.iter()) {
            assert!((orig - dec).abs() < 0.01, "orig={orig} dec={dec}");
        }
    }

    #[test]
    fn test_quantize_4bit_roundtrip() {
        let v = vec![0.1, 0.5, 0.9, -0.3, 0.0];
        let q = quantize(&v, ScalarBits::Four).unwrap();
        assert_eq!(q.data.len(), 3);
        let back = dequantize(&q).unwrap();
        let step = 1.2 / 15.0;
        for (orig, dec) in v.iter().zip(back.iter()) {
            assert!((orig - dec).abs() <= step / 2.0 + 1e-6);
        }
        assert!(q.compression_ratio() > 6.0);
    }

    #[test]
    fn test_quantize_empty() {
        let q = quantize(&[], ScalarBits::Eight).unwrap();
        assert!(q.data.is_empty());
        assert!(dequantize(&q).unwrap().is_empty());
        assert_eq!(compute_distance(&q, &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_quantize_rejects_nan() {
        assert!(quantize(&[1.0, f32::NAN], ScalarBits::Eight).is_err());
    }

    #[test]
    fn test_compute_distance_matches_dequantized() {
        let v = vec![0.3, -0.7, 0.2, 0.9, -0.1, 0.4, 0.0];
        let query = vec![0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1];
        for bits in [ScalarBits::Eight, ScalarBits::Four] {
            let q = quantize(&v, bits).unwrap();
            let direct = compute_distance(&q, &query).unwrap();
            let dense = dequantize(&q).unwrap();
            let expected: f32 = dense
                .iter()
                .zip(query.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            assert!((direct - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_compute_distance_dimension_mismatch() {
        let q = quantize(&[1.0, 2.0, 3.0], ScalarBits::Eight).unwrap();
        let err = compute_distance(&q, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, QuantError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_dequantize_rejects_bad_shape() {
        let mut q = quantize(&[1.0, 2.0, 3.0], ScalarBits::Eight).unwrap();
        q.data.pop();
        assert!(matches!(dequantize(&q), Err(QuantError::Validation(_))));

        let mut q = quantize(&[1.0, 2.0, 3.0], ScalarBits::Eight).unwrap();
        q.maxs.pop();
        assert!(dequantize(&q).is_err());
    }

    #[test]
    fn test_widened_covers_new_values() {
        let vecs = sample_vectors();
        let ranges = ScalarRanges::calibrate(&refs(&vecs), 4, ScalarBits::Eight);
        let outlier = [-1.0, 10.0, 3.0, 3.0];
        assert!(!ranges.contains(&outlier));

        let wider = ranges.widened(&[&outlier]);
        assert!(wider.contains(&outlier));
        assert_eq!(wider.mins[0], -1.0);
        assert_eq!(wider.maxs[1], 10.0);
        for v in &vecs {
            assert!(wider.contains(v));
        }
    }

    #[test]
    fn test_asymmetric_distance_ordering() {
        let vecs = sample_vectors();
        let ranges = ScalarRanges::calibrate(&refs(&vecs), 4, ScalarBits::Eight);

        let query = vec![0.0, 1.0, 2.0, 3.0];
        let codes: Vec<Vec<u8>> = vecs.iter().map(|v| ranges.encode(v)).collect();

        let dist_self = ranges.asymmetric_l2_squared(&query, &codes[0]);
        let dist_far = ranges.asymmetric_l2_squared(&query, &codes[1]);
        assert!(dist_self < dist_far, "self distance should be smallest");
    }

    #[test]
    fn test_cosine_components() {
        let ranges =
            ScalarRanges::from_bounds(ScalarBits::Eight, vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        let packed = ranges.encode(&[1.0, 0.0]);
        let (dot, norm) = ranges.asymmetric_cosine_components(&[1.0, 0.0], &packed);
        assert!((dot - 1.0).abs() < 1e-6);
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((ranges.asymmetric_dot(&[2.0, 3.0], &packed) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_from_bounds_rejects_inverted() {
        assert!(ScalarRanges::from_bounds(ScalarBits::Eight, vec![1.0], vec![0.0]).is_err());
        assert!(ScalarRanges::from_bounds(ScalarBits::Eight, vec![0.0], vec![]).is_err());
        assert!(
            ScalarRanges::from_bounds(ScalarBits::Eight, vec![f32::NEG_INFINITY], vec![0.0])
                .is_err()
        );
    }

    #[test]
    fn test_scalar_bits_serde() {
        assert_eq!(serde_json::to_string(&ScalarBits::Four).unwrap(), "4");
        let back: ScalarBits = serde_json::from_str("8").unwrap();
        assert_eq!(back, ScalarBits::Eight);
        assert!(serde_json::from_str::<ScalarBits>("3").is_err());
    }

    #[test]
    fn test_codec_requires_calibration() {
        let codec = ScalarCodec::new(2, ScalarBits::Eight);
        assert!(!codec.is_calibrated());
        assert!(codec.encode(&[0.0, 1.0]).is_err());
    }

    #[test]
    fn test_codec_metrics() {
        let vecs = sample_vectors();
        let mut codec = ScalarCodec::new(4, ScalarBits::Eight);
        codec
            .set_ranges(ScalarRanges::calibrate(&refs(&vecs), 4, ScalarBits::Eight))
            .unwrap();

        let payload = codec.encode(&vecs[1]).unwrap();
        assert_eq!(codec.payload_bytes(), 4);
        assert_eq!(codec.overhead_bytes(), 32);

        let q = codec.prepare_query(&vecs[1], DistanceMetric::Cosine).unwrap();
        assert!(codec.distance(&q, &payload).unwrap() < 1e-3);

        let q = codec.prepare_query(&vecs[1], DistanceMetric::L2).unwrap();
        assert!(codec.distance(&q, &payload).unwrap() < 0.05);

        let q = codec.prepare_query(&[1.0, 0.0, 0.0, 0.0], DistanceMetric::Ip).unwrap();
        assert!((codec.distance(&q, &payload).unwrap() + 4.0).abs() < 0.05);
    }

    #[test]
    fn test_codec_rejects_foreign_payload() {
        let mut codec = ScalarCodec::new(2, ScalarBits::Four);
        codec
            .set_ranges(ScalarRanges::from_bounds(ScalarBits::Four, vec![0.0; 2], vec![1.0; 2]).unwrap())
            .unwrap();
        assert!(codec.decode(&QuantizedPayload::Scalar(vec![0, 0])).is_err());
        let decoded = codec.decode(&QuantizedPayload::Scalar(vec![0xF0])).unwrap();
        assert!((decoded[0] - 1.0).abs() < 1e-6);
        assert_eq!(decoded[1], 0.0);
        assert!(codec
            .set_ranges(ScalarRanges::from_bounds(ScalarBits::Eight, vec![0.0; 2], vec![1.0; 2]).unwrap())
            .is_err());
    }
}
