//! Core data models used throughout noema.
//!
//! These types represent the chunks, extracted knowledge objects, typed
//! links, search results, and insights that flow through the retrieval and
//! graph-analysis pipeline. Objects and links use closed enumerations;
//! values outside them are rejected at ingestion, never coerced.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// A unit of indexed text: a contiguous segment of source material with its
/// embedding. Immutable once indexed; removed only by a full re-index.
///
/// Matches the JSONL interchange format produced by upstream chunkers
/// (`id`, `text`, optional `token_count`, optional `embedding`). An empty
/// `embedding` means the vector has not been generated yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(alias = "chunk_id")]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub token_count: Option<u32>,
}

/// The closed enumeration of extracted knowledge unit types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Idea,
    Claim,
    Assumption,
    Question,
    Task,
    Evidence,
    Definition,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idea => "Idea",
            Self::Claim => "Claim",
            Self::Assumption => "Assumption",
            Self::Question => "Question",
            Self::Task => "Task",
            Self::Evidence => "Evidence",
            Self::Definition => "Definition",
        }
    }
}

impl FromStr for ObjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "Idea" => Ok(Self::Idea),
            "Claim" => Ok(Self::Claim),
            "Assumption" => Ok(Self::Assumption),
            "Question" => Ok(Self::Question),
            "Task" => Ok(Self::Task),
            "Evidence" => Ok(Self::Evidence),
            "Definition" => Ok(Self::Definition),
            other => Err(Error::InvalidObjectType(other.to_string())),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an object.
///
/// `MergedInto` encodes a union-find-like redirect: reads resolve through it
/// to the surviving object, so a merge is an O(1) status write and edges are
/// never eagerly rewritten. Serialized as `"active"` or `"merged_into_<id>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ObjectStatus {
    Active,
    MergedInto(String),
}

impl Default for ObjectStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl From<ObjectStatus> for String {
    fn from(status: ObjectStatus) -> String {
        match status {
            ObjectStatus::Active => "active".to_string(),
            ObjectStatus::MergedInto(id) => format!("merged_into_{id}"),
        }
    }
}

impl TryFrom<String> for ObjectStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        if s == "active" {
            Ok(Self::Active)
        } else if let Some(id) = s.strip_prefix("merged_into_") {
            if id.is_empty() {
                Err("merged_into_ status is missing the target id".to_string())
            } else {
                Ok(Self::MergedInto(id.to_string()))
            }
        } else {
            Err(format!("unknown object status: '{s}'"))
        }
    }
}

/// An extracted knowledge unit, owned by the knowledge graph as a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Object {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub canonical_text: String,
    pub confidence: f32,
    #[serde(default)]
    pub status: ObjectStatus,
}

impl Object {
    pub fn new(
        id: impl Into<String>,
        object_type: ObjectType,
        text: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            id: id.into(),
            object_type,
            canonical_text: text.into(),
            confidence,
            status: ObjectStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ObjectStatus::Active
    }
}

/// The closed enumeration of typed relationships between objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    Supports,
    Contradicts,
    Refines,
    DependsOn,
    SameAs,
    Causes,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Supports => "Supports",
            Self::Contradicts => "Contradicts",
            Self::Refines => "Refines",
            Self::DependsOn => "DependsOn",
            Self::SameAs => "SameAs",
            Self::Causes => "Causes",
        }
    }
}

impl FromStr for LinkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "Supports" => Ok(Self::Supports),
            "Contradicts" => Ok(Self::Contradicts),
            "Refines" => Ok(Self::Refines),
            "DependsOn" => Ok(Self::DependsOn),
            "SameAs" => Ok(Self::SameAs),
            "Causes" => Ok(Self::Causes),
            other => Err(Error::InvalidLinkType(other.to_string())),
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, typed relationship between two objects.
///
/// Multiple links of different types between the same pair are allowed.
/// Accepts `source_id`/`target_id` aliases for upstream extractor output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    #[serde(alias = "source_id")]
    pub src_id: String,
    #[serde(alias = "target_id")]
    pub dst_id: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    pub confidence: f32,
    #[serde(default)]
    pub evidence_span_id: Option<String>,
}

/// Which retrieval channels matched a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchedIn {
    pub vector: bool,
    pub keyword: bool,
}

impl MatchedIn {
    /// Convergent evidence: the chunk surfaced in both channels.
    pub fn both(&self) -> bool {
        self.vector && self.keyword
    }
}

/// A ranked search result, computed at query time and never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub fused_score: f32,
    pub vector_score: f32,
    pub keyword_score: f32,
    pub matched_in: MatchedIn,
}

/// Severity of an insight. Ordering is High < Medium < Low so that an
/// ascending sort lists the most actionable insights first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(s)
    }
}

/// Kind of insight produced by the intelligence layer. Declaration order is
/// the canonical report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Contradiction,
    StaleThread,
    ConsolidationOpportunity,
}

impl fmt::Display for InsightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Contradiction => "contradiction",
            Self::StaleThread => "stale_thread",
            Self::ConsolidationOpportunity => "consolidation_opportunity",
        };
        f.write_str(s)
    }
}

/// Consumer-managed lifecycle of an insight. The core only ever emits `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightStatus {
    New,
    Resolved,
    Dismissed,
}

/// Type-specific payload carried by an insight.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InsightPayload {
    Contradiction {
        src_id: String,
        dst_id: String,
        src_text: String,
        dst_text: String,
        link_confidence: f32,
    },
    StaleThread {
        question_id: String,
        text: String,
    },
    ConsolidationOpportunity {
        object_id: String,
        text: String,
        centrality: f32,
    },
}

impl InsightPayload {
    /// The id of the insight's primary subject, used for deterministic
    /// ordering.
    pub fn subject_id(&self) -> &str {
        match self {
            Self::Contradiction { src_id, .. } => src_id,
            Self::StaleThread { question_id, .. } => question_id,
            Self::ConsolidationOpportunity { object_id, .. } => object_id,
        }
    }
}

/// A higher-order finding over the knowledge graph.
#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub severity: Severity,
    pub payload: InsightPayload,
    pub status: InsightStatus,
    pub created_at: DateTime<Utc>,
}

impl Insight {
    pub fn new(insight_type: InsightType, severity: Severity, payload: InsightPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            insight_type,
            severity,
            payload,
            status: InsightStatus::New,
            created_at: Utc::now(),
        }
    }
}
