//! Quantmem: compressed in-memory vector storage.
//!
//! Vectors are stored either scalar-quantized (8 or 4 bits per dimension
//! against shared per-dimension ranges) or product-quantized (one centroid
//! index per subspace against trained codebooks) and searched with
//! asymmetric distances: the query stays full precision.

pub mod config;
pub mod error;
pub mod index;
pub mod metrics;
pub mod startup;
pub mod store;
pub mod types;

pub use config::{Config, StoreConfig};
pub use error::{QuantError, Result};
pub use index::quantization::{
    ProductCodec, ProductConfig, QuantizationType, QuantizedPayload, ScalarBits, ScalarCodec,
    VectorCodec,
};
pub use store::{QuantizedVectorStore, StoreStats};
pub use types::{DistanceMetric, Metadata, SearchResult, VectorEntry, VectorId};
