//! In-memory quantized vector store and its JSON snapshot format.

pub mod persistence;
pub mod quantized;

pub use persistence::{StoreSnapshot, SNAPSHOT_VERSION};
pub use quantized::{QuantizedVectorStore, StoreStats, SCALAR_CALIBRATION_WINDOW};
