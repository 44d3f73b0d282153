use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

lazy_static::lazy_static! {
    pub static ref INSERTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quantmem_inserts_total", "Vectors inserted", &["quantization"]
    ).unwrap();
    pub static ref REMOVES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quantmem_removes_total", "Vectors removed", &["quantization"]
    ).unwrap();
    pub static ref SEARCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quantmem_searches_total", "Searches served", &["quantization", "metric"]
    ).unwrap();
    pub static ref SEARCH_DURATION: HistogramVec = register_histogram_vec!(
        "quantmem_search_duration_seconds", "Search duration", &["quantization"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    ).unwrap();
    pub static ref ACTIVE_SEARCHES: IntGauge = register_int_gauge!(
        "quantmem_active_searches", "Number of in-flight searches"
    ).unwrap();
    pub static ref FLUSHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quantmem_flushes_total", "Scalar re-index passes", &["kind"]
    ).unwrap();
    pub static ref TRAINING_DURATION: Histogram = register_histogram!(
        "quantmem_training_duration_seconds", "Product quantizer training duration",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    ).unwrap();
    pub static ref CAPACITY_REJECTIONS_TOTAL: IntCounter = register_int_counter!(
        "quantmem_capacity_rejections_total", "Inserts rejected at capacity"
    ).unwrap();
    pub static ref IMPORT_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quantmem_import_failures_total", "Rejected snapshot imports", &["reason"]
    ).unwrap();
}

/// RAII guard that decrements an IntGauge on drop.
pub struct GaugeGuard<'a>(pub &'a IntGauge);

impl<'a> GaugeGuard<'a> {
    /// Increment `gauge` now and decrement it when the guard drops.
    pub fn enter(gauge: &'a IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

pub fn init() {
    lazy_static::initialize(&INSERTS_TOTAL);
    lazy_static::initialize(&REMOVES_TOTAL);
    lazy_static::initialize(&SEARCHES_TOTAL);
    lazy_static::initialize(&SEARCH_DURATION);
    lazy_static::initialize(&ACTIVE_SEARCHES);
    lazy_static::initialize(&FLUSHES_TOTAL);
    lazy_static::initialize(&TRAINING_DURATION);
    lazy_static::initialize(&CAPACITY_REJECTIONS_TOTAL);
    lazy_static::initialize(&IMPORT_FAILURES_TOTAL);
}
