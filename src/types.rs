use serde::{Deserialize, Serialize};

/// A unique identifier for a vector within a store.
pub type VectorId = String;

/// Opaque caller metadata attached to a stored vector: any JSON object.
/// The store never inspects it.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Distance metric for vector comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity (1 - cosine distance).
    #[default]
    Cosine,
    /// Euclidean (L2) distance.
    L2,
    /// Inner product similarity.
    Ip,
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::L2 => write!(f, "l2"),
            DistanceMetric::Ip => write!(f, "ip"),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            "ip" | "dot_product" => Ok(DistanceMetric::Ip),
            other => Err(format!("unknown distance metric: {other}")),
        }
    }
}

/// A vector to insert, with optional metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    /// Unique identifier for this vector.
    pub id: VectorId,
    /// The raw floating-point vector values.
    pub values: Vec<f32>,
    /// Optional caller metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl VectorEntry {
    pub fn new(id: impl Into<VectorId>, values: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            values,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A search hit.
///
/// `distance` is always "lower is closer" so results sort ascending;
/// `similarity` is the metric-specific score the similarity floor applies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Identifier of the matched vector.
    pub id: VectorId,
    /// Approximate distance from the query.
    pub distance: f32,
    /// Approximate similarity to the query.
    pub similarity: f32,
    /// Metadata stored with the vector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}
