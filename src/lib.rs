//! # noema
//!
//! A note intelligence core: noema turns unstructured notes into
//! retrievable knowledge and surfaces higher-order reasoning over it:
//! which claims contradict each other, which concepts are structurally
//! central, and which questions remain unanswered.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌───────────────────┐
//! │ chunk + vec  │──▶│ HybridSearchEngine │──▶ ranked SearchResults
//! └──────────────┘    │  vector ⊕ lexical  │
//!                     └───────────────────┘
//! ┌──────────────┐    ┌───────────────────┐    ┌──────────────────┐
//! │  extraction  │──▶│  KnowledgeGraph    │──▶│ IntelligenceLayer │──▶ Insights
//! │ objects/links│    │ typed multigraph   │    │ contradictions,   │
//! └──────────────┘    └───────────────────┘    │ centrality, stale │
//!                                              └──────────────────┘
//! ```
//!
//! Embedding and extraction are injected capabilities ([`embedding::Embedder`],
//! [`extraction::Extractor`]), so the core runs against deterministic fakes
//! in tests and offline providers in the demo.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration: fusion knobs, providers, insight thresholds |
//! | [`models`] | Core data types and closed enumerations |
//! | [`error`] | Typed errors |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`extraction`] | Structured extraction abstraction and validation |
//! | [`index`] | Vector and lexical retrieval leaves |
//! | [`engine`] | Hybrid search with score fusion |
//! | [`graph`] | Directed multigraph of objects and typed links |
//! | [`intelligence`] | Structural analyses producing insights |
//! | [`ingest`] | Pipeline orchestration |

pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod graph;
pub mod index;
pub mod ingest;
pub mod intelligence;
pub mod models;

pub use error::{Error, Result};
