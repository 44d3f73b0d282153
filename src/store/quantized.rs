//! The quantized vector store.
//!
//! Entries live in a dense `Vec` of slots with an id → slot index map.
//! Removal swaps the last slot into the hole, so every operation except
//! search is O(1) in the number of stored vectors (plus codec work).
//!
//! Scalar stores share one set of per-dimension ranges. The ranges only
//! ever widen: a vector that falls outside them forces every stored code to
//! be re-encoded. Such vectors are staged raw and the work is deferred to
//! the next [`QuantizedVectorStore::flush`] (implicit in `search`).
//!
//! Re-encoding from a decoded payload adds a fresh rounding error each
//! time, so scalar stores keep raw copies until they hold more than
//! [`SCALAR_CALIBRATION_WINDOW`] entries. Widenings while the ranges are
//! still settling therefore re-encode exact values.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::persistence::{
    parse_snapshot, validate_snapshot, EntrySnapshot, RangesSnapshot, StoreSnapshot,
    SNAPSHOT_VERSION,
};
use crate::config::StoreConfig;
use crate::error::{ErrorKind, QuantError, Result};
use crate::index::distance::similarity_from_distance;
use crate::index::quantization::pq::{ProductCodec, TrainingReport};
use crate::index::quantization::sq::{ScalarCodec, ScalarRanges};
use crate::index::quantization::{QuantizationType, QuantizedPayload, VectorCodec};
use crate::metrics::{self, GaugeGuard};
use crate::types::{DistanceMetric, Metadata, SearchResult, VectorEntry, VectorId};

/// Scalar stores up to this size keep raw vectors for exact re-encoding.
pub const SCALAR_CALIBRATION_WINDOW: usize = 1024;

/// Size and footprint report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub count: usize,
    pub dimension: usize,
    pub quantization_type: QuantizationType,
    pub metric: DistanceMetric,
    /// Entries staged by an insert and not yet encoded.
    pub pending: usize,
    pub ready: bool,
    /// Encoded bytes per vector.
    pub bytes_per_vector: usize,
    /// `count * dimension * 4`.
    pub original_bytes: usize,
    /// `count * bytes_per_vector`.
    pub compressed_bytes: usize,
    /// Shared ranges or codebook.
    pub overhead_bytes: usize,
    /// `dimension * 4 / bytes_per_vector`; excludes the shared overhead.
    pub compression_ratio: f32,
    /// Rough resident size: codes, overhead, ids, retained raw vectors and
    /// bookkeeping.
    pub estimated_memory_bytes: usize,
}

#[derive(Debug, Clone)]
enum StoreCodec {
    Scalar(ScalarCodec),
    Product(ProductCodec),
}

impl StoreCodec {
    fn decode(&self, payload: &QuantizedPayload) -> Result<Vec<f32>> {
        match self {
            StoreCodec::Scalar(c) => c.decode(payload),
            StoreCodec::Product(c) => VectorCodec::decode(c, payload),
        }
    }

    fn payload_bytes(&self) -> usize {
        match self {
            StoreCodec::Scalar(c) => c.payload_bytes(),
            StoreCodec::Product(c) => c.payload_bytes(),
        }
    }

    fn overhead_bytes(&self) -> usize {
        match self {
            StoreCodec::Scalar(c) => c.overhead_bytes(),
            StoreCodec::Product(c) => c.overhead_bytes(),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    id: VectorId,
    /// `None` while staged by a batch insert.
    payload: Option<QuantizedPayload>,
    /// Original vector; kept when `retain_raw_vectors` is set, while
    /// staged, or while a scalar store is within its calibration window.
    raw: Option<Vec<f32>>,
    metadata: Option<Metadata>,
    /// Insertion order, used to break distance ties.
    seq: u64,
}

/// Result of planning a scalar re-index without applying it.
struct ScalarRebuild {
    codec: ScalarCodec,
    /// New payload per slot; `None` keeps the current one.
    payloads: Vec<Option<QuantizedPayload>>,
    full: bool,
}

/// A store of quantized vectors searched with asymmetric distances.
#[derive(Debug, Clone)]
pub struct QuantizedVectorStore {
    config: StoreConfig,
    codec: StoreCodec,
    slots: Vec<Slot>,
    index: HashMap<VectorId, usize>,
    next_seq: u64,
    dirty: bool,
}

impl QuantizedVectorStore {
    /// Build an empty store. The config is resolved here once.
    pub fn new(config: StoreConfig) -> Result<Self> {
        let config = config.resolve()?;
        let codec = match (config.quantization_type.scalar_bits(), &config.product_config) {
            (Some(bits), _) => StoreCodec::Scalar(ScalarCodec::new(config.dimension, bits)),
            (None, Some(pc)) => {
                StoreCodec::Product(ProductCodec::new(config.dimension, pc.clone())?)
            }
            (None, None) => {
                return Err(QuantError::Validation(
                    "product store requires a product config".into(),
                ))
            }
        };
        debug!(
            dimension = config.dimension,
            quantization = %config.quantization_type,
            metric = %config.metric,
            "created quantized store"
        );
        Ok(Self {
            config,
            codec,
            slots: Vec::new(),
            index: HashMap::new(),
            next_seq: 0,
            dirty: false,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn quantization_type(&self) -> QuantizationType {
        self.config.quantization_type
    }

    /// Scalar stores are always ready; product stores once trained.
    pub fn is_ready(&self) -> bool {
        match &self.codec {
            StoreCodec::Scalar(_) => true,
            StoreCodec::Product(c) => c.is_trained(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Whether staged inserts are waiting for a flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> Vec<&str> {
        let mut slots: Vec<&Slot> = self.slots.iter().collect();
        slots.sort_by_key(|s| s.seq);
        slots.into_iter().map(|s| s.id.as_str()).collect()
    }

    pub fn get_metadata(&self, id: &str) -> Option<&Metadata> {
        self.index
            .get(id)
            .and_then(|&i| self.slots[i].metadata.as_ref())
    }

    /// Drop every entry. Trained codebooks and calibrated ranges are kept.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.next_seq = 0;
        self.dirty = false;
    }

    /// Whether encoded slots keep their raw vector.
    fn keeps_raw(&self) -> bool {
        self.config.retain_raw_vectors
            || (matches!(self.codec, StoreCodec::Scalar(_))
                && self.slots.len() <= SCALAR_CALIBRATION_WINDOW)
    }

    fn qt_label(&self) -> &'static str {
        self.config.quantization_type.as_str()
    }

    fn validate_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimension {
            return Err(QuantError::DimensionMismatch {
                expected: self.config.dimension,
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

    fn validate_id(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(QuantError::Validation("vector id must not be empty".into()));
        }
        Ok(())
    }

    fn check_capacity(&self, new_entries: usize) -> Result<()> {
        if self.slots.len() + new_entries > self.config.max_vectors {
            metrics::CAPACITY_REJECTIONS_TOTAL.inc();
            warn!(
                count = self.slots.len(),
                incoming = new_entries,
                max_vectors = self.config.max_vectors,
                "insert rejected at capacity"
            );
            return Err(QuantError::Capacity {
                max: self.config.max_vectors,
            });
        }
        Ok(())
    }

    /// Train the codec.
    ///
    /// Product stores train their codebooks (returning the report) and
    /// re-encode any existing entries. Scalar stores calibrate their ranges
    /// from the sample, widened to cover what is already stored or staged.
    pub fn train<V: AsRef<[f32]>>(&mut self, vectors: &[V]) -> Result<Option<TrainingReport>> {
        for v in vectors {
            self.validate_vector(v.as_ref())?;
        }

        match &self.codec {
            StoreCodec::Product(codec) => {
                let mut fresh = codec.clone();
                let report = fresh.train(vectors)?;

                // Existing codes point into the old codebook.
                let mut payloads = Vec::with_capacity(self.slots.len());
                for slot in &self.slots {
                    let values = self.slot_values(slot)?;
                    payloads.push(VectorCodec::encode(&fresh, &values)?);
                }
                for (slot, payload) in self.slots.iter_mut().zip(payloads) {
                    slot.payload = Some(payload);
                }
                self.codec = StoreCodec::Product(fresh);
                Ok(Some(report))
            }
            StoreCodec::Scalar(codec) => {
                if vectors.is_empty() {
                    return Err(QuantError::Validation(
                        "cannot calibrate scalar ranges from an empty sample".into(),
                    ));
                }
                let refs: Vec<&[f32]> = vectors.iter().map(AsRef::as_ref).collect();
                let mut ranges = ScalarRanges::calibrate(&refs, self.config.dimension, codec.bits());
                if let Some(current) = codec.ranges() {
                    ranges = ranges.widened(&[current.mins.as_slice(), current.maxs.as_slice()]);
                }
                ranges = ranges.widened(&self.staged_vectors());
                let rebuild = self.plan_scalar_rebuild(Some(ranges))?;
                self.apply_scalar_rebuild(rebuild);
                self.dirty = false;
                info!(sample = refs.len(), "calibrated scalar ranges");
                Ok(None)
            }
        }
    }

    /// Insert or replace a vector.
    ///
    /// Re-inserting an existing id replaces its payload and metadata in
    /// place and keeps its original insertion order.
    pub fn insert(
        &mut self,
        id: impl Into<VectorId>,
        vector: &[f32],
        metadata: Option<Metadata>,
    ) -> Result<()> {
        let id = id.into();
        Self::validate_id(&id)?;
        self.validate_vector(vector)?;
        if !self.is_ready() {
            return Err(QuantError::NotTrained);
        }
        if !self.index.contains_key(&id) {
            self.check_capacity(1)?;
        }

        let payload = match &self.codec {
            StoreCodec::Scalar(codec) => match codec.ranges() {
                Some(ranges) if ranges.contains(vector) => Some(codec.encode(vector)?),
                _ => None,
            },
            StoreCodec::Product(codec) => Some(VectorCodec::encode(codec, vector)?),
        };
        let staged = payload.is_none();
        let raw = (self.keeps_raw() || staged).then(|| vector.to_vec());

        self.upsert(id, payload, raw, metadata);
        metrics::INSERTS_TOTAL
            .with_label_values(&[self.qt_label()])
            .inc();

        if staged {
            // Out of the current ranges: widen on the next flush.
            self.dirty = true;
        }
        Ok(())
    }

    /// Insert many vectors at once. All entries are validated before any is
    /// stored; on error nothing changes.
    ///
    /// Scalar stores stage the entries and re-index once on the next
    /// `flush` or `search`. Returns the number of entries written.
    pub fn insert_batch(&mut self, items: Vec<VectorEntry>) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        if !self.is_ready() {
            return Err(QuantError::NotTrained);
        }

        let mut new_ids = HashSet::new();
        for item in &items {
            Self::validate_id(&item.id)?;
            self.validate_vector(&item.values)?;
            if !self.index.contains_key(&item.id) {
                new_ids.insert(item.id.as_str());
            }
        }
        self.check_capacity(new_ids.len())?;

        let count = items.len();
        match &self.codec {
            StoreCodec::Product(codec) => {
                let payloads = items
                    .iter()
                    .map(|item| VectorCodec::encode(codec, &item.values))
                    .collect::<Result<Vec<_>>>()?;
                let retain = self.config.retain_raw_vectors;
                for (item, payload) in items.into_iter().zip(payloads) {
                    let raw = retain.then_some(item.values);
                    self.upsert(item.id, Some(payload), raw, item.metadata);
                }
            }
            StoreCodec::Scalar(_) => {
                for item in items {
                    self.upsert(item.id, None, Some(item.values), item.metadata);
                }
                self.dirty = true;
            }
        }

        metrics::INSERTS_TOTAL
            .with_label_values(&[self.qt_label()])
            .inc_by(count as u64);
        debug!(count = count, staged = self.dirty, "batch inserted");
        Ok(count)
    }

    fn upsert(
        &mut self,
        id: VectorId,
        payload: Option<QuantizedPayload>,
        raw: Option<Vec<f32>>,
        metadata: Option<Metadata>,
    ) {
        match self.index.get(&id) {
            Some(&i) => {
                let slot = &mut self.slots[i];
                slot.payload = payload;
                slot.raw = raw;
                slot.metadata = metadata;
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.index.insert(id.clone(), self.slots.len());
                self.slots.push(Slot {
                    id,
                    payload,
                    raw,
                    metadata,
                    seq,
                });
            }
        }
    }

    /// Remove a vector. Returns `false` if the id was not present.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(i) = self.index.remove(id) else {
            return false;
        };
        self.slots.swap_remove(i);
        if let Some(moved) = self.slots.get(i) {
            self.index.insert(moved.id.clone(), i);
        }
        metrics::REMOVES_TOTAL
            .with_label_values(&[self.qt_label()])
            .inc();
        true
    }

    /// Encode every staged entry, widening the scalar ranges first if
    /// needed. A no-op when nothing is staged.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if matches!(self.codec, StoreCodec::Scalar(_)) {
            let start = Instant::now();
            let rebuild = self.plan_scalar_rebuild(None)?;
            let full = rebuild.full;
            self.apply_scalar_rebuild(rebuild);
            metrics::FLUSHES_TOTAL
                .with_label_values(&[if full { "full" } else { "incremental" }])
                .inc();
            debug!(
                count = self.slots.len(),
                full = full,
                elapsed_us = start.elapsed().as_micros() as u64,
                "flushed scalar store"
            );
        }
        self.dirty = false;
        Ok(())
    }

    /// Values to re-encode a slot from: the raw vector if held, else the
    /// decoded payload.
    fn slot_values(&self, slot: &Slot) -> Result<Vec<f32>> {
        match (&slot.raw, &slot.payload) {
            (Some(raw), _) => Ok(raw.clone()),
            (None, Some(payload)) => self.codec.decode(payload),
            (None, None) => Err(QuantError::Integrity(format!(
                "entry {:?} has neither payload nor raw vector",
                slot.id
            ))),
        }
    }

    /// Raw vectors of slots that are not encoded yet.
    fn staged_vectors(&self) -> Vec<&[f32]> {
        self.slots
            .iter()
            .filter(|s| s.payload.is_none())
            .filter_map(|s| s.raw.as_deref())
            .collect()
    }

    /// Work out new ranges and payloads without touching the store.
    ///
    /// `target` replaces the ranges outright (training); otherwise they are
    /// the current ranges widened by every staged vector.
    fn plan_scalar_rebuild(&self, target: Option<ScalarRanges>) -> Result<ScalarRebuild> {
        let StoreCodec::Scalar(codec) = &self.codec else {
            return Err(QuantError::Integrity("not a scalar store".into()));
        };

        let new_ranges = match target {
            Some(ranges) => ranges,
            None => {
                let staged = self.staged_vectors();
                match codec.ranges() {
                    Some(current) => current.widened(&staged),
                    None => ScalarRanges::calibrate(&staged, self.config.dimension, codec.bits()),
                }
            }
        };
        let full = codec.ranges() != Some(&new_ranges);

        let mut fresh = codec.clone();
        fresh.set_ranges(new_ranges)?;

        let mut payloads = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            if full || slot.payload.is_none() {
                let values = self.slot_values(slot)?;
                payloads.push(Some(fresh.encode(&values)?));
            } else {
                payloads.push(None);
            }
        }

        Ok(ScalarRebuild {
            codec: fresh,
            payloads,
            full,
        })
    }

    fn apply_scalar_rebuild(&mut self, rebuild: ScalarRebuild) {
        let retain = self.keeps_raw();
        for (slot, payload) in self.slots.iter_mut().zip(rebuild.payloads) {
            if let Some(payload) = payload {
                slot.payload = Some(payload);
            }
            if !retain {
                slot.raw = None;
            }
        }
        self.codec = StoreCodec::Scalar(rebuild.codec);
    }

    /// k-nearest search. Flushes staged entries first.
    ///
    /// `threshold` is a similarity floor: results whose similarity is below
    /// it are dropped before taking the first `k`.
    pub fn search(
        &mut self,
        query: &[f32],
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        self.flush()?;
        self.search_flushed(query, k, threshold)
    }

    /// Search without mutating the store. Fails if inserts are still
    /// staged.
    ///
    /// Results are ordered by ascending distance, ties broken by insertion
    /// order.
    pub fn search_flushed(
        &self,
        query: &[f32],
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        if self.dirty {
            return Err(QuantError::Validation(
                "store has staged inserts; call flush() first".into(),
            ));
        }
        self.validate_vector(query)?;
        if let StoreCodec::Product(codec) = &self.codec {
            if !codec.is_trained() {
                return Err(QuantError::NotTrained);
            }
        }
        if k == 0 || self.slots.is_empty() {
            return Ok(Vec::new());
        }

        let _active = GaugeGuard::enter(&metrics::ACTIVE_SEARCHES);
        let start = Instant::now();

        let mut hits = match &self.codec {
            StoreCodec::Scalar(codec) => self.scan(codec, query)?,
            StoreCodec::Product(codec) => self.scan(codec, query)?,
        };

        let order = |a: &(f32, u64, usize), b: &(f32, u64, usize)| {
            a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
        };
        if threshold.is_none() && hits.len() > k {
            hits.select_nth_unstable_by(k - 1, order);
            hits.truncate(k);
        }
        hits.sort_unstable_by(order);

        let metric = self.config.metric;
        let results: Vec<SearchResult> = hits
            .into_iter()
            .map(|(distance, _, i)| (distance, similarity_from_distance(distance, metric), i))
            .filter(|&(_, similarity, _)| threshold.map_or(true, |t| similarity >= t))
            .take(k)
            .map(|(distance, similarity, i)| {
                let slot = &self.slots[i];
                SearchResult {
                    id: slot.id.clone(),
                    distance,
                    similarity,
                    metadata: slot.metadata.clone(),
                }
            })
            .collect();

        let metric_label = metric.to_string();
        metrics::SEARCHES_TOTAL
            .with_label_values(&[self.qt_label(), &metric_label])
            .inc();
        metrics::SEARCH_DURATION
            .with_label_values(&[self.qt_label()])
            .observe(start.elapsed().as_secs_f64());

        Ok(results)
    }

    /// Distance from `query` to every slot: `(distance, seq, slot index)`.
    fn scan<C: VectorCodec>(&self, codec: &C, query: &[f32]) -> Result<Vec<(f32, u64, usize)>> {
        let prepared = codec.prepare_query(query, self.config.metric)?;
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let payload = slot.payload.as_ref().ok_or_else(|| {
                    QuantError::Integrity(format!("entry {:?} is not encoded", slot.id))
                })?;
                Ok((codec.distance(&prepared, payload)?, slot.seq, i))
            })
            .collect()
    }

    /// The stored vector: the raw copy if `retain_raw_vectors` is set or the
    /// entry is still staged, else its reconstruction.
    pub fn get_vector(&self, id: &str) -> Result<Option<Vec<f32>>> {
        let Some(&i) = self.index.get(id) else {
            return Ok(None);
        };
        let slot = &self.slots[i];
        match (&slot.payload, self.config.retain_raw_vectors) {
            (Some(payload), false) => self.codec.decode(payload).map(Some),
            _ => self.slot_values(slot).map(Some),
        }
    }

    pub fn stats(&self) -> StoreStats {
        let count = self.slots.len();
        let dimension = self.config.dimension;
        let f32_size = std::mem::size_of::<f32>();
        let bytes_per_vector = self.codec.payload_bytes();
        let original_bytes = count * dimension * f32_size;
        let compressed_bytes = count * bytes_per_vector;
        let overhead_bytes = self.codec.overhead_bytes();

        let id_bytes: usize = self.slots.iter().map(|s| s.id.len()).sum();
        let raw_bytes: usize = self
            .slots
            .iter()
            .filter_map(|s| s.raw.as_ref())
            .map(|r| r.len() * f32_size)
            .sum();
        // Ids are held twice: once in the slot, once as the index key.
        let bookkeeping = count
            * (std::mem::size_of::<Slot>()
                + std::mem::size_of::<VectorId>()
                + std::mem::size_of::<usize>());

        StoreStats {
            count,
            dimension,
            quantization_type: self.config.quantization_type,
            metric: self.config.metric,
            pending: self.slots.iter().filter(|s| s.payload.is_none()).count(),
            ready: self.is_ready(),
            bytes_per_vector,
            original_bytes,
            compressed_bytes,
            overhead_bytes,
            compression_ratio: (dimension * f32_size) as f32 / bytes_per_vector.max(1) as f32,
            estimated_memory_bytes: compressed_bytes
                + overhead_bytes
                + 2 * id_bytes
                + raw_bytes
                + bookkeeping,
        }
    }

    /// Build a snapshot of the store. Staged entries are encoded into the
    /// snapshot as a flush would encode them; the store itself is unchanged.
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        let (ranges, staged_payloads) = match &self.codec {
            StoreCodec::Scalar(_) if self.dirty => {
                let rebuild = self.plan_scalar_rebuild(None)?;
                let ranges = rebuild.codec.ranges().map(RangesSnapshot::from);
                (ranges, Some(rebuild.payloads))
            }
            StoreCodec::Scalar(codec) => (codec.ranges().map(RangesSnapshot::from), None),
            StoreCodec::Product(_) => (None, None),
        };
        let codebooks = match &self.codec {
            StoreCodec::Product(codec) if codec.is_trained() => Some(codec.codebook_snapshot()?),
            _ => None,
        };

        let mut order: Vec<usize> = (0..self.slots.len()).collect();
        order.sort_by_key(|&i| self.slots[i].seq);

        let mut vectors = Vec::with_capacity(self.slots.len());
        for i in order {
            let slot = &self.slots[i];
            let fresh = staged_payloads
                .as_ref()
                .and_then(|p| p[i].as_ref())
                .or(slot.payload.as_ref());
            let quantized = fresh.cloned().ok_or_else(|| {
                QuantError::Integrity(format!("entry {:?} is not encoded", slot.id))
            })?;
            vectors.push(EntrySnapshot {
                id: slot.id.clone(),
                quantized,
                metadata: slot.metadata.clone(),
            });
        }

        Ok(StoreSnapshot {
            version: SNAPSHOT_VERSION,
            config: self.config.clone(),
            vectors,
            ranges,
            codebooks,
        })
    }

    /// Serialize the store to JSON.
    pub fn export(&self) -> Result<String> {
        let json = serde_json::to_string(&self.snapshot()?)?;
        info!(count = self.slots.len(), bytes = json.len(), "exported store");
        Ok(json)
    }

    /// Rebuild a store from JSON produced by [`Self::export`].
    ///
    /// The snapshot is fully validated before anything is built; raw
    /// vectors are never part of a snapshot.
    pub fn import(json: &str) -> Result<Self> {
        let result = parse_snapshot(json).and_then(Self::from_snapshot);
        if let Err(e) = &result {
            let reason = match (e, e.kind()) {
                (QuantError::Json(_), _) => "parse",
                (_, ErrorKind::Integrity) => "integrity",
                (_, ErrorKind::Validation) => "validation",
                _ => "other",
            };
            metrics::IMPORT_FAILURES_TOTAL
                .with_label_values(&[reason])
                .inc();
            warn!(error = %e, "store import rejected");
        }
        result
    }

    /// Build a store from a parsed snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        let config = validate_snapshot(&snapshot)?;
        let mut store = Self::new(config)?;

        match &mut store.codec {
            StoreCodec::Scalar(codec) => {
                if let Some(ranges) = snapshot.ranges {
                    codec.set_ranges(ScalarRanges::from_bounds(
                        codec.bits(),
                        ranges.mins,
                        ranges.maxs,
                    )?)?;
                }
            }
            StoreCodec::Product(codec) => {
                if let Some(codebooks) = snapshot.codebooks {
                    codec.load_codebook(codebooks)?;
                }
            }
        }

        for entry in snapshot.vectors {
            store.upsert(entry.id, Some(entry.quantized), None, entry.metadata);
        }
        info!(count = store.len(), "imported store");
        Ok(store)
    }

    /// Export to a file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.export()?)?;
        Ok(())
    }

    /// Import from a file written by [`Self::save_to`].
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::import(&json)
    }
}
