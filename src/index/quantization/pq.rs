//! Product Quantization (PQ): divides vectors into M subvectors and
//! quantizes each independently using a trained codebook.
//!
//! For a D-dimensional vector with M subspaces and K centroids:
//! - Each subvector has D/M dimensions
//! - Each subvector is encoded as 1 byte (index into a codebook of K <= 256)
//! - Total: M bytes per vector plus the f32 norm of the original vector
//!
//! ## Search
//!
//! Asymmetric Distance Computation (ADC):
//! 1. For each subspace m, precompute distance from query subvector
//!    to all K centroids → lookup table of M × K entries.
//! 2. For each encoded vector, sum M table lookups → approximate distance.
//!    This makes per-vector distance computation O(M) regardless of D.
//!
//! ## Training
//!
//! Every subspace runs its own k-means with a `ChaCha8Rng` seeded from the
//! configured seed and switched to stream `m`. The same seed and data give
//! the same codebook whether subspaces train sequentially or on the rayon
//! pool (`parallel` feature).
//!
//! ## Binary format
//!
//! Codebook blob:
//! ```text
//! [M: u32][K: u32][sub_dim: u32]
//! For m in 0..M:
//!   For k in 0..K:
//!     [f32 * sub_dim]
//! ```

use std::time::{Duration, Instant};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::kmeans::{nearest, train_kmeans, KMeansParams, KMeansResult};
use super::{QuantizedPayload, VectorCodec};
use crate::error::{QuantError, Result};
use crate::index::distance::{cosine_from_components, dot, l2_norm, squared_l2};
use crate::types::DistanceMetric;

/// Hard ceiling on Lloyd iterations, whatever the configuration asks for.
pub const MAX_KMEANS_ITERATIONS_CEILING: usize = 1000;

/// Codes are single bytes.
pub const MAX_CENTROIDS: usize = 256;
pub const MIN_CENTROIDS: usize = 2;
pub const MAX_SUBSPACES: usize = 256;

const BLOB_HEADER_LEN: usize = 12;

fn default_num_subspaces() -> usize {
    8
}

fn default_num_centroids() -> usize {
    256
}

fn default_max_iterations() -> usize {
    50
}

fn default_convergence_threshold() -> f64 {
    1e-4
}

fn default_seed() -> u64 {
    42
}

/// Product quantizer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductConfig {
    #[serde(default = "default_num_subspaces")]
    pub num_subspaces: usize,
    #[serde(default = "default_num_centroids")]
    pub num_centroids: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_convergence_threshold")]
    pub convergence_threshold: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            num_subspaces: default_num_subspaces(),
            num_centroids: default_num_centroids(),
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence_threshold(),
            seed: default_seed(),
        }
    }
}

impl ProductConfig {
    pub fn new(num_subspaces: usize, num_centroids: usize) -> Self {
        Self {
            num_subspaces,
            num_centroids,
            ..Self::default()
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check the parameters against a vector dimension.
    pub fn validate(&self, dimension: usize) -> Result<()> {
        if dimension == 0 {
            return Err(QuantError::Validation("dimension must be > 0".into()));
        }
        if self.num_subspaces == 0 || self.num_subspaces > MAX_SUBSPACES {
            return Err(QuantError::Validation(format!(
                "numSubspaces must be in [1, {MAX_SUBSPACES}], got {}",
                self.num_subspaces
            )));
        }
        if !(MIN_CENTROIDS..=MAX_CENTROIDS).contains(&self.num_centroids) {
            return Err(QuantError::Validation(format!(
                "numCentroids must be in [{MIN_CENTROIDS}, {MAX_CENTROIDS}], got {}",
                self.num_centroids
            )));
        }
        if dimension % self.num_subspaces != 0 {
            return Err(QuantError::Validation(format!(
                "dimension ({dimension}) must be divisible by numSubspaces ({})",
                self.num_subspaces
            )));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold < 0.0 {
            return Err(QuantError::Validation(format!(
                "convergenceThreshold must be finite and >= 0, got {}",
                self.convergence_threshold
            )));
        }
        Ok(())
    }
}

/// A PQ-encoded vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductEncoded {
    /// One centroid index per subspace.
    pub codes: Vec<u8>,
    /// L2 norm of the original vector.
    pub norm: f32,
}

/// Per-subspace training outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubspaceReport {
    pub iterations: usize,
    pub inertia: f64,
    pub converged: bool,
}

impl From<&KMeansResult> for SubspaceReport {
    fn from(result: &KMeansResult) -> Self {
        Self {
            iterations: result.iterations,
            inertia: result.inertia,
            converged: result.converged,
        }
    }
}

/// Summary of a `train` call.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub subspaces: Vec<SubspaceReport>,
    pub training_vectors: usize,
    pub elapsed: Duration,
}

impl TrainingReport {
    /// Sum of final inertia over all subspaces.
    pub fn total_inertia(&self) -> f64 {
        self.subspaces.iter().map(|s| s.inertia).sum()
    }

    pub fn all_converged(&self) -> bool {
        self.subspaces.iter().all(|s| s.converged)
    }

    pub fn max_iterations(&self) -> usize {
        self.subspaces.iter().map(|s| s.iterations).max().unwrap_or(0)
    }
}

/// `[num_subspaces][num_centroids]` lookup table for one query, stored flat.
#[derive(Debug, Clone)]
pub struct DistanceTables {
    pub num_subspaces: usize,
    pub num_centroids: usize,
    values: Vec<f32>,
}

impl DistanceTables {
    /// Entries for subspace `m`.
    #[inline]
    pub fn row(&self, m: usize) -> &[f32] {
        &self.values[m * self.num_centroids..(m + 1) * self.num_centroids]
    }

    #[inline]
    pub fn get(&self, m: usize, k: usize) -> f32 {
        self.values[m * self.num_centroids + k]
    }

    /// Sum one entry per subspace, selected by `codes`.
    #[inline]
    pub fn lookup_sum(&self, codes: &[u8]) -> Result<f32> {
        if codes.len() != self.num_subspaces {
            return Err(QuantError::Validation(format!(
                "expected {} codes, got {}",
                self.num_subspaces,
                codes.len()
            )));
        }
        let mut sum = 0.0f32;
        for (m, &code) in codes.iter().enumerate() {
            let k = code as usize;
            if k >= self.num_centroids {
                return Err(QuantError::Validation(format!(
                    "code {k} out of range for {} centroids",
                    self.num_centroids
                )));
            }
            sum += self.values[m * self.num_centroids + k];
        }
        Ok(sum)
    }
}

/// Trained centroids. `centroids[m]` holds K rows of `subspace_dim` floats.
#[derive(Debug, Clone)]
struct Codebook {
    centroids: Vec<Vec<f32>>,
    /// `||centroid(m, k)||^2`, flat `[m * K + k]`.
    norms_sq: Vec<f32>,
}

impl Codebook {
    fn new(centroids: Vec<Vec<f32>>, num_centroids: usize, subspace_dim: usize) -> Self {
        let norms_sq = centroids
            .iter()
            .flat_map(|sub| {
                sub.chunks_exact(subspace_dim)
                    .take(num_centroids)
                    .map(|c| c.iter().map(|v| v * v).sum::<f32>())
            })
            .collect();
        Self {
            centroids,
            norms_sq,
        }
    }
}

/// JSON form of a trained codebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CodebookSnapshot {
    pub dimension: usize,
    pub num_subspaces: usize,
    pub num_centroids: usize,
    pub subspace_dim: usize,
    /// One flat `num_centroids * subspace_dim` buffer per subspace.
    pub centroids: Vec<Vec<f32>>,
}

impl CodebookSnapshot {
    /// Structural checks before any of it is trusted.
    pub fn validate(&self) -> Result<()> {
        if self.num_subspaces == 0 || self.num_subspaces > MAX_SUBSPACES {
            return Err(QuantError::Integrity(format!(
                "codebook numSubspaces {} out of range",
                self.num_subspaces
            )));
        }
        if !(MIN_CENTROIDS..=MAX_CENTROIDS).contains(&self.num_centroids) {
            return Err(QuantError::Integrity(format!(
                "codebook numCentroids {} out of range",
                self.num_centroids
            )));
        }
        if self.subspace_dim == 0
            || self.num_subspaces.checked_mul(self.subspace_dim) != Some(self.dimension)
        {
            return Err(QuantError::Integrity(format!(
                "codebook dimension {} != numSubspaces {} * subspaceDim {}",
                self.dimension, self.num_subspaces, self.subspace_dim
            )));
        }
        if self.centroids.len() != self.num_subspaces {
            return Err(QuantError::Integrity(format!(
                "codebook has {} subspaces, expected {}",
                self.centroids.len(),
                self.num_subspaces
            )));
        }
        let expected = self.num_centroids * self.subspace_dim;
        for (m, sub) in self.centroids.iter().enumerate() {
            if sub.len() != expected {
                return Err(QuantError::Integrity(format!(
                    "codebook subspace {m} has {} values, expected {expected}",
                    sub.len()
                )));
            }
            if sub.iter().any(|v| !v.is_finite()) {
                return Err(QuantError::Integrity(format!(
                    "codebook subspace {m} contains a non-finite value"
                )));
            }
        }
        Ok(())
    }
}

/// Prepared query for store scans.
#[derive(Debug, Clone)]
pub struct ProductQuery {
    metric: DistanceMetric,
    /// Squared-L2 tables for `l2`, dot-product tables otherwise.
    tables: DistanceTables,
    norm_sq: f32,
}

/// Trainable product quantizer.
#[derive(Debug, Clone)]
pub struct ProductCodec {
    dimension: usize,
    subspace_dim: usize,
    config: ProductConfig,
    codebook: Option<Codebook>,
}

impl ProductCodec {
    /// Build an untrained codec. `max_iterations` is clamped to
    /// [`MAX_KMEANS_ITERATIONS_CEILING`].
    pub fn new(dimension: usize, config: ProductConfig) -> Result<Self> {
        config.validate(dimension)?;
        let mut config = config;
        if config.max_iterations > MAX_KMEANS_ITERATIONS_CEILING {
            warn!(
                requested = config.max_iterations,
                ceiling = MAX_KMEANS_ITERATIONS_CEILING,
                "clamping k-means iteration cap"
            );
            config.max_iterations = MAX_KMEANS_ITERATIONS_CEILING;
        }
        let subspace_dim = dimension / config.num_subspaces;
        Ok(Self {
            dimension,
            subspace_dim,
            config,
            codebook: None,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn num_subspaces(&self) -> usize {
        self.config.num_subspaces
    }

    pub fn num_centroids(&self) -> usize {
        self.config.num_centroids
    }

    pub fn subspace_dim(&self) -> usize {
        self.subspace_dim
    }

    pub fn config(&self) -> &ProductConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.codebook.is_some()
    }

    fn codebook(&self) -> Result<&Codebook> {
        self.codebook.as_ref().ok_or(QuantError::NotTrained)
    }

    #[inline]
    fn centroid<'a>(&self, codebook: &'a Codebook, m: usize, k: usize) -> &'a [f32] {
        &codebook.centroids[m][k * self.subspace_dim..(k + 1) * self.subspace_dim]
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(QuantError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if let Some(d) = vector.iter().position(|v| !v.is_finite()) {
            return Err(QuantError::Validation(format!(
                "value at dimension {d} is not finite"
            )));
        }
        Ok(())
    }

    fn check_codes(&self, codes: &[u8]) -> Result<()> {
        if codes.len() != self.config.num_subspaces {
            return Err(QuantError::Validation(format!(
                "expected {} codes, got {}",
                self.config.num_subspaces,
                codes.len()
            )));
        }
        if let Some(&bad) = codes
            .iter()
            .find(|&&c| c as usize >= self.config.num_centroids)
        {
            return Err(QuantError::Validation(format!(
                "code {bad} out of range for {} centroids",
                self.config.num_centroids
            )));
        }
        Ok(())
    }

    /// Train one codebook per subspace. Replaces any previous codebook; on
    /// error the codec keeps its previous state.
    pub fn train<V: AsRef<[f32]>>(&mut self, vectors: &[V]) -> Result<TrainingReport> {
        let k = self.config.num_centroids;
        if vectors.len() < k {
            return Err(QuantError::Validation(format!(
                "need at least {k} training vectors, got {}",
                vectors.len()
            )));
        }
        let refs: Vec<&[f32]> = vectors.iter().map(AsRef::as_ref).collect();
        for v in &refs {
            self.check_vector(v)?;
        }

        info!(
            n = refs.len(),
            dimension = self.dimension,
            num_subspaces = self.config.num_subspaces,
            num_centroids = k,
            seed = self.config.seed,
            "training product quantizer"
        );
        let start = Instant::now();

        let params = KMeansParams {
            k,
            max_iterations: self.config.max_iterations,
            convergence_threshold: self.config.convergence_threshold,
        };

        #[cfg(feature = "parallel")]
        let results: Vec<Result<KMeansResult>> = {
            use rayon::prelude::*;
            (0..self.config.num_subspaces)
                .into_par_iter()
                .map(|m| self.train_subspace(&refs, m, &params))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let results: Vec<Result<KMeansResult>> = (0..self.config.num_subspaces)
            .map(|m| self.train_subspace(&refs, m, &params))
            .collect();

        let results = results.into_iter().collect::<Result<Vec<_>>>()?;
        let subspaces: Vec<SubspaceReport> = results.iter().map(SubspaceReport::from).collect();
        let centroids: Vec<Vec<f32>> = results.into_iter().map(|r| r.centroids).collect();

        self.codebook = Some(Codebook::new(centroids, k, self.subspace_dim));

        let report = TrainingReport {
            subspaces,
            training_vectors: refs.len(),
            elapsed: start.elapsed(),
        };
        crate::metrics::TRAINING_DURATION.observe(report.elapsed.as_secs_f64());
        info!(
            elapsed_ms = report.elapsed.as_millis() as u64,
            total_inertia = report.total_inertia(),
            converged = report.all_converged(),
            "product quantizer trained"
        );
        Ok(report)
    }

    fn train_subspace(
        &self,
        vectors: &[&[f32]],
        m: usize,
        params: &KMeansParams,
    ) -> Result<KMeansResult> {
        let offset = m * self.subspace_dim;
        let sub_vectors: Vec<&[f32]> = vectors
            .iter()
            .map(|v| &v[offset..offset + self.subspace_dim])
            .collect();

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        rng.set_stream(m as u64);

        let result = train_kmeans(&sub_vectors, self.subspace_dim, params, &mut rng)?;
        debug!(
            subspace = m,
            iterations = result.iterations,
            inertia = result.inertia,
            "subspace trained"
        );
        Ok(result)
    }

    /// Encode a vector: nearest centroid per subspace, plus the full norm.
    pub fn encode(&self, vector: &[f32]) -> Result<ProductEncoded> {
        let codebook = self.codebook()?;
        self.check_vector(vector)?;

        let codes = (0..self.config.num_subspaces)
            .map(|m| {
                let offset = m * self.subspace_dim;
                let sub_vec = &vector[offset..offset + self.subspace_dim];
                let (best, _) = nearest(sub_vec, &codebook.centroids[m], self.subspace_dim);
                best as u8
            })
            .collect();

        Ok(ProductEncoded {
            codes,
            norm: l2_norm(vector),
        })
    }

    /// Encode a batch of vectors. Fails on the first invalid vector.
    pub fn encode_batch<V: AsRef<[f32]>>(&self, vectors: &[V]) -> Result<Vec<ProductEncoded>> {
        vectors.iter().map(|v| self.encode(v.as_ref())).collect()
    }

    /// Decode a PQ code back to an approximate f32 vector.
    pub fn decode(&self, encoded: &ProductEncoded) -> Result<Vec<f32>> {
        let codebook = self.codebook()?;
        self.check_codes(&encoded.codes)?;

        let mut vector = Vec::with_capacity(self.dimension);
        for (m, &code) in encoded.codes.iter().enumerate() {
            vector.extend_from_slice(self.centroid(codebook, m, code as usize));
        }
        Ok(vector)
    }

    /// Squared L2 between `query` and the reconstruction of `encoded`,
    /// computed subspace by subspace without tables.
    pub fn asymmetric_distance(&self, query: &[f32], encoded: &ProductEncoded) -> Result<f32> {
        let codebook = self.codebook()?;
        self.check_vector(query)?;
        self.check_codes(&encoded.codes)?;

        Ok(encoded
            .codes
            .iter()
            .enumerate()
            .map(|(m, &code)| {
                let offset = m * self.subspace_dim;
                squared_l2(
                    &query[offset..offset + self.subspace_dim],
                    self.centroid(codebook, m, code as usize),
                )
            })
            .sum())
    }

    /// Build an ADC lookup table of squared L2 distances for a query.
    ///
    /// `table[m][k]` = distance from query subvector m to centroid k.
    pub fn precompute_distance_tables(&self, query: &[f32]) -> Result<DistanceTables> {
        self.build_tables(query, squared_l2)
    }

    /// Same shape as [`Self::precompute_distance_tables`] but holding dot
    /// products, for `ip` and `cosine` scans.
    pub fn precompute_dot_tables(&self, query: &[f32]) -> Result<DistanceTables> {
        self.build_tables(query, dot)
    }

    fn build_tables(&self, query: &[f32], f: fn(&[f32], &[f32]) -> f32) -> Result<DistanceTables> {
        let codebook = self.codebook()?;
        self.check_vector(query)?;

        let k = self.config.num_centroids;
        let mut values = Vec::with_capacity(self.config.num_subspaces * k);
        for m in 0..self.config.num_subspaces {
            let offset = m * self.subspace_dim;
            let q_sub = &query[offset..offset + self.subspace_dim];
            for c in 0..k {
                values.push(f(q_sub, self.centroid(codebook, m, c)));
            }
        }

        Ok(DistanceTables {
            num_subspaces: self.config.num_subspaces,
            num_centroids: k,
            values,
        })
    }

    /// Approximate distance from precomputed tables. O(M) per vector.
    #[inline]
    pub fn distance_from_tables(
        &self,
        tables: &DistanceTables,
        encoded: &ProductEncoded,
    ) -> Result<f32> {
        tables.lookup_sum(&encoded.codes)
    }

    /// `||decode(encoded)||^2` from the cached centroid norms.
    pub fn reconstruction_norm_sq(&self, encoded: &ProductEncoded) -> Result<f32> {
        let codebook = self.codebook()?;
        self.check_codes(&encoded.codes)?;
        let k = self.config.num_centroids;
        Ok(encoded
            .codes
            .iter()
            .enumerate()
            .map(|(m, &code)| codebook.norms_sq[m * k + code as usize])
            .sum())
    }

    /// Bytes held by the trained centroids.
    pub fn codebook_bytes(&self) -> usize {
        self.codebook
            .as_ref()
            .map(|cb| {
                let centroids: usize = cb.centroids.iter().map(Vec::len).sum();
                (centroids + cb.norms_sq.len()) * std::mem::size_of::<f32>()
            })
            .unwrap_or(0)
    }

    /// Snapshot of the trained codebook.
    pub fn codebook_snapshot(&self) -> Result<CodebookSnapshot> {
        let codebook = self.codebook()?;
        Ok(CodebookSnapshot {
            dimension: self.dimension,
            num_subspaces: self.config.num_subspaces,
            num_centroids: self.config.num_centroids,
            subspace_dim: self.subspace_dim,
            centroids: codebook.centroids.clone(),
        })
    }

    /// Install a codebook from a snapshot whose shape must match this codec.
    pub fn load_codebook(&mut self, snapshot: CodebookSnapshot) -> Result<()> {
        snapshot.validate()?;
        if snapshot.dimension != self.dimension
            || snapshot.num_subspaces != self.config.num_subspaces
            || snapshot.num_centroids != self.config.num_centroids
        {
            return Err(QuantError::Integrity(format!(
                "codebook shape {}d/{}m/{}k does not match codec {}d/{}m/{}k",
                snapshot.dimension,
                snapshot.num_subspaces,
                snapshot.num_centroids,
                self.dimension,
                self.config.num_subspaces,
                self.config.num_centroids
            )));
        }
        self.codebook = Some(Codebook::new(
            snapshot.centroids,
            self.config.num_centroids,
            self.subspace_dim,
        ));
        Ok(())
    }

    /// Serialize the trained codebook to JSON.
    pub fn export_codebook(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.codebook_snapshot()?)?)
    }

    /// Parse, validate and install a JSON codebook.
    pub fn import_codebook(&mut self, json: &str) -> Result<()> {
        let snapshot: CodebookSnapshot = serde_json::from_str(json)?;
        self.load_codebook(snapshot)
    }

    /// Serialize the codebook to the binary blob format.
    pub fn codebook_to_bytes(&self) -> Result<Bytes> {
        let codebook = self.codebook()?;
        let k = self.config.num_centroids;
        let total = BLOB_HEADER_LEN + self.config.num_subspaces * k * self.subspace_dim * 4;
        let mut buf = BytesMut::with_capacity(total);

        buf.put_u32_le(self.config.num_subspaces as u32);
        buf.put_u32_le(k as u32);
        buf.put_u32_le(self.subspace_dim as u32);

        for sub in &codebook.centroids {
            for &val in sub {
                buf.put_f32_le(val);
            }
        }

        debug_assert_eq!(buf.len(), total);
        Ok(buf.freeze())
    }

    /// Install a codebook from the binary blob format.
    pub fn load_codebook_bytes(&mut self, data: &[u8]) -> Result<()> {
        if data.len() < BLOB_HEADER_LEN {
            return Err(QuantError::Integrity(
                "PQ codebook blob too small for header".into(),
            ));
        }

        let mut buf = data;
        let m = buf.get_u32_le() as usize;
        let k = buf.get_u32_le() as usize;
        let sub_dim = buf.get_u32_le() as usize;

        // Check the claimed sizes before allocating anything.
        let expected_floats = m
            .checked_mul(k)
            .and_then(|n| n.checked_mul(sub_dim))
            .ok_or_else(|| QuantError::Integrity("PQ codebook header overflows".into()))?;
        let expected_bytes = expected_floats
            .checked_mul(4)
            .ok_or_else(|| QuantError::Integrity("PQ codebook header overflows".into()))?;
        if buf.remaining() != expected_bytes {
            return Err(QuantError::Integrity(format!(
                "PQ codebook blob size mismatch: expected {expected_bytes} payload bytes, got {}",
                buf.remaining()
            )));
        }
        if m != self.config.num_subspaces
            || k != self.config.num_centroids
            || sub_dim != self.subspace_dim
        {
            return Err(QuantError::Integrity(format!(
                "PQ codebook blob shape {m}m/{k}k/{sub_dim}d does not match codec"
            )));
        }

        let centroids = (0..m)
            .map(|_| (0..k * sub_dim).map(|_| buf.get_f32_le()).collect())
            .collect();

        self.load_codebook(CodebookSnapshot {
            dimension: m * sub_dim,
            num_subspaces: m,
            num_centroids: k,
            subspace_dim: sub_dim,
            centroids,
        })
    }

    fn product_payload<'a>(&self, payload: &'a QuantizedPayload) -> Result<&'a ProductEncoded> {
        match payload {
            QuantizedPayload::Product(encoded) => Ok(encoded),
            QuantizedPayload::Scalar(_) => Err(QuantError::Integrity(
                "scalar payload given to product codec".into(),
            )),
        }
    }
}

impl VectorCodec for ProductCodec {
    type Query = ProductQuery;

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, vector: &[f32]) -> Result<QuantizedPayload> {
        ProductCodec::encode(self, vector).map(QuantizedPayload::Product)
    }

    fn decode(&self, payload: &QuantizedPayload) -> Result<Vec<f32>> {
        ProductCodec::decode(self, self.product_payload(payload)?)
    }

    fn prepare_query(&self, query: &[f32], metric: DistanceMetric) -> Result<ProductQuery> {
        let tables = match metric {
            DistanceMetric::L2 => self.precompute_distance_tables(query)?,
            DistanceMetric::Ip | DistanceMetric::Cosine => self.precompute_dot_tables(query)?,
        };
        Ok(ProductQuery {
            metric,
            tables,
            norm_sq: query.iter().map(|v| v * v).sum(),
        })
    }

    fn distance(&self, query: &ProductQuery, payload: &QuantizedPayload) -> Result<f32> {
        let encoded = self.product_payload(payload)?;
        let sum = query.tables.lookup_sum(&encoded.codes)?;
        Ok(match query.metric {
            DistanceMetric::L2 => sum.max(0.0).sqrt(),
            DistanceMetric::Ip => -sum,
            DistanceMetric::Cosine => {
                let recon_norm_sq = self.reconstruction_norm_sq(encoded)?;
                1.0 - cosine_from_components(sum, query.norm_sq, recon_norm_sq)
            }
        })
    }

    fn payload_bytes(&self) -> usize {
        self.config.num_subspaces + std::mem::size_of::<f32>()
    }

    fn overhead_bytes(&self) -> usize {
        self.codebook_bytes()
    }
}
