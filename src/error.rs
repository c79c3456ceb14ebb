//! Error types for the noema core.
//!
//! Structural errors (dimension mismatches, dangling references, values
//! outside the closed enumerations) always surface to the caller; the core
//! never silently suppresses them, since they would corrupt graph-analysis
//! correctness. Collaborator failures ([`Error::EmbeddingUnavailable`],
//! [`Error::ExtractionUnavailable`]) are the only kinds expected to be
//! transient; callers may retry those.

use thiserror::Error;

/// All errors produced by the noema library.
#[derive(Debug, Error)]
pub enum Error {
    /// A vector's length disagrees with the index's established dimensionality.
    #[error("vector has {got} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A link references an object id absent from the graph (or one that has
    /// been merged away). Edges never create nodes implicitly.
    #[error("link {src} -> {dst} references an unknown or merged object")]
    DanglingReference { src: String, dst: String },

    /// The embedding collaborator failed. Transient; retry with backoff.
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The extraction collaborator failed. Transient; retry with backoff.
    #[error("extraction provider unavailable: {0}")]
    ExtractionUnavailable(String),

    /// An object type outside the closed enumeration.
    #[error("unknown object type: '{0}'")]
    InvalidObjectType(String),

    /// A link type outside the closed enumeration.
    #[error("unknown link type: '{0}'")]
    InvalidLinkType(String),

    /// A confidence score outside `[0.0, 1.0]`.
    #[error("confidence {value} on '{id}' is outside [0.0, 1.0]")]
    InvalidConfidence { id: String, value: f32 },

    /// A self-referential link of any type other than `SameAs`.
    #[error("self-loop on '{id}' is only permitted for SameAs links")]
    SelfLoop { id: String },

    /// A chunk or object with an empty id.
    #[error("id must not be empty")]
    EmptyId,

    /// A blocking collaborator call exceeded its configured deadline.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    /// Configuration value failed validation.
    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
