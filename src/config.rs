use crate::error::{QuantError, Result};
use crate::index::quantization::pq::{ProductConfig, MAX_KMEANS_ITERATIONS_CEILING};
use crate::index::quantization::QuantizationType;
use crate::types::DistanceMetric;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Largest vector dimension a store accepts.
pub const MAX_DIMENSION: usize = 65_536;

/// Default capacity of a store.
pub const DEFAULT_MAX_VECTORS: usize = 1_000_000;

/// Process-level configuration, loaded from TOML plus environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreDefaults,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defaults applied to every store built from this config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDefaults {
    #[serde(default)]
    pub quantization_type: QuantizationType,
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default = "default_max_vectors")]
    pub max_vectors: usize,
    #[serde(default)]
    pub retain_raw_vectors: bool,
}

/// Product quantizer training parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_num_subspaces")]
    pub num_subspaces: usize,
    #[serde(default = "default_num_centroids")]
    pub num_centroids: usize,
    #[serde(default = "default_kmeans_max_iterations")]
    pub kmeans_max_iterations: usize,
    #[serde(default = "default_kmeans_convergence_threshold")]
    pub kmeans_convergence_threshold: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_max_vectors() -> usize {
    DEFAULT_MAX_VECTORS
}
fn default_num_subspaces() -> usize {
    ProductConfig::default().num_subspaces
}
fn default_num_centroids() -> usize {
    ProductConfig::default().num_centroids
}
fn default_kmeans_max_iterations() -> usize {
    ProductConfig::default().max_iterations
}
fn default_kmeans_convergence_threshold() -> f64 {
    ProductConfig::default().convergence_threshold
}
fn default_seed() -> u64 {
    ProductConfig::default().seed
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for StoreDefaults {
    fn default() -> Self {
        Self {
            quantization_type: QuantizationType::default(),
            metric: DistanceMetric::default(),
            max_vectors: default_max_vectors(),
            retain_raw_vectors: false,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_subspaces: default_num_subspaces(),
            num_centroids: default_num_centroids(),
            kmeans_max_iterations: default_kmeans_max_iterations(),
            kmeans_convergence_threshold: default_kmeans_convergence_threshold(),
            seed: default_seed(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl TrainingConfig {
    pub fn product_config(&self) -> ProductConfig {
        ProductConfig {
            num_subspaces: self.num_subspaces,
            num_centroids: self.num_centroids,
            max_iterations: self.kmeans_max_iterations,
            convergence_threshold: self.kmeans_convergence_threshold,
            seed: self.seed,
        }
    }
}

impl Config {
    /// Load config from a TOML file, falling back to defaults.
    /// After loading, env var overrides are applied so that:
    /// env var > TOML file > defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    QuantError::Config(format!("failed to read config file {p}: {e}"))
                })?;
                toml::from_str(&content)
                    .map_err(|e| QuantError::Config(format!("failed to parse config: {e}")))?
            }
            None => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Resolved store configuration for vectors of `dimension`.
    pub fn store_config(&self, dimension: usize) -> Result<StoreConfig> {
        let product_config = (self.store.quantization_type == QuantizationType::Product)
            .then(|| self.training.product_config());
        StoreConfig {
            dimension,
            quantization_type: self.store.quantization_type,
            metric: self.store.metric,
            max_vectors: self.store.max_vectors,
            retain_raw_vectors: self.store.retain_raw_vectors,
            product_config,
        }
        .resolve()
    }

    /// Apply environment variable overrides on top of file/default values.
    fn apply_env_overrides(&mut self) {
        // Store
        if let Some(v) = env_parse("QUANTMEM_QUANTIZATION") {
            self.store.quantization_type = v;
        }
        if let Some(v) = env_parse("QUANTMEM_METRIC") {
            self.store.metric = v;
        }
        if let Some(v) = env_parse("QUANTMEM_MAX_VECTORS") {
            self.store.max_vectors = v;
        }
        if let Ok(v) = std::env::var("QUANTMEM_RETAIN_RAW_VECTORS") {
            self.store.retain_raw_vectors = v == "true";
        }

        // Training
        if let Some(v) = env_parse("QUANTMEM_NUM_SUBSPACES") {
            self.training.num_subspaces = v;
        }
        if let Some(v) = env_parse("QUANTMEM_NUM_CENTROIDS") {
            self.training.num_centroids = v;
        }
        if let Some(v) = env_parse("QUANTMEM_KMEANS_MAX_ITERATIONS") {
            self.training.kmeans_max_iterations = v;
        }
        if let Some(v) = env_parse("QUANTMEM_KMEANS_CONVERGENCE_THRESHOLD") {
            self.training.kmeans_convergence_threshold = v;
        }
        if let Some(v) = env_parse("QUANTMEM_SEED") {
            self.training.seed = v;
        }

        // Logging
        if let Ok(v) = std::env::var("QUANTMEM_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("QUANTMEM_LOG_FORMAT") {
            self.logging.format = v;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Configuration of a single store, persisted inside its snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreConfig {
    pub dimension: usize,
    #[serde(default)]
    pub quantization_type: QuantizationType,
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default = "default_max_vectors")]
    pub max_vectors: usize,
    #[serde(default)]
    pub retain_raw_vectors: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_config: Option<ProductConfig>,
}

impl StoreConfig {
    pub fn new(dimension: usize, quantization_type: QuantizationType) -> Self {
        Self {
            dimension,
            quantization_type,
            metric: DistanceMetric::default(),
            max_vectors: DEFAULT_MAX_VECTORS,
            retain_raw_vectors: false,
            product_config: None,
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_max_vectors(mut self, max_vectors: usize) -> Self {
        self.max_vectors = max_vectors;
        self
    }

    pub fn with_retain_raw_vectors(mut self, retain: bool) -> Self {
        self.retain_raw_vectors = retain;
        self
    }

    pub fn with_product_config(mut self, product_config: ProductConfig) -> Self {
        self.product_config = Some(product_config);
        self
    }

    /// Validate and fill in every default, so the rest of the store never
    /// consults an optional field.
    ///
    /// Product mode gets the default `ProductConfig` when none is given;
    /// scalar modes drop any product settings.
    pub fn resolve(mut self) -> Result<Self> {
        if self.dimension == 0 || self.dimension > MAX_DIMENSION {
            return Err(QuantError::Validation(format!(
                "dimension must be in [1, {MAX_DIMENSION}], got {}",
                self.dimension
            )));
        }
        if self.max_vectors == 0 {
            return Err(QuantError::Validation("maxVectors must be > 0".into()));
        }

        match self.quantization_type {
            QuantizationType::Product => {
                let pc = self.product_config.get_or_insert_with(ProductConfig::default);
                pc.validate(self.dimension)?;
                pc.max_iterations = pc.max_iterations.min(MAX_KMEANS_ITERATIONS_CEILING);
            }
            QuantizationType::Scalar8 | QuantizationType::Scalar4 => {
                if self.product_config.take().is_some() {
                    warn!(
                        quantization = %self.quantization_type,
                        "ignoring productConfig for scalar store"
                    );
                }
            }
        }
        Ok(self)
    }
}
