//! Process bootstrap: config discovery and logging.
//!
//! An embedding application calls these once before building stores; the
//! library itself never installs a subscriber.

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::Result;

/// Resolve the configuration file path.
///
/// Priority:
/// 1. `QUANTMEM_CONFIG` environment variable
/// 2. `./quantmem.toml` if it exists
/// 3. None (use defaults)
pub fn resolve_config_path() -> Option<String> {
    std::env::var("QUANTMEM_CONFIG").ok().or_else(|| {
        let default = "quantmem.toml";
        std::path::Path::new(default)
            .exists()
            .then(|| default.to_string())
    })
}

/// Initialize tracing subscriber from logging config.
///
/// Supports JSON and plain text formats. Uses `RUST_LOG` env var if set,
/// otherwise falls back to `config.logging.level`. Returns `false` when a
/// global subscriber was already installed.
pub fn init_logging(config: &Config) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
            .is_ok(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok(),
    }
}

/// Load config from the resolved path, install logging and register
/// metrics.
pub fn bootstrap() -> Result<Config> {
    let path = resolve_config_path();
    let config = Config::load(path.as_deref())?;
    init_logging(&config);
    crate::metrics::init();

    tracing::info!(
        config_path = path.as_deref().unwrap_or("<defaults>"),
        quantization = %config.store.quantization_type,
        metric = %config.store.metric,
        max_vectors = config.store.max_vectors,
        "quantmem configured"
    );
    Ok(config)
}
