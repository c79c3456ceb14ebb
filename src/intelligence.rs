//! Structural analyses over a knowledge-graph snapshot.
//!
//! The layer is strictly read-only: it borrows the graph and never mutates
//! it. Every analysis produces identical, order-stable output for an
//! identical snapshot; the underlying extraction is probabilistic, so
//! reproducible insight ordering is what makes regression testing possible.
//! Merged objects are never analysis endpoints; callers resolve merges
//! before reading.

use tracing::debug;

use crate::config::InsightConfig;
use crate::graph::KnowledgeGraph;
use crate::models::{Insight, InsightPayload, InsightType, ObjectType, Severity};

pub struct IntelligenceLayer<'a> {
    graph: &'a KnowledgeGraph,
    config: InsightConfig,
}

impl<'a> IntelligenceLayer<'a> {
    pub fn new(graph: &'a KnowledgeGraph, config: InsightConfig) -> Self {
        Self { graph, config }
    }

    /// Wrap every `Contradicts` pair as an insight.
    ///
    /// Severity reflects how actionable the contradiction is: high when
    /// both endpoints are well-evidenced (confidence at or above the
    /// configured threshold), medium when exactly one is, low otherwise.
    pub fn detect_contradictions(&self) -> Vec<Insight> {
        let threshold = self.config.high_confidence;

        self.graph
            .find_contradictions()
            .into_iter()
            .filter_map(|pair| {
                let src = self.graph.node(&pair.src_id)?;
                let dst = self.graph.node(&pair.dst_id)?;

                let confident = [src, dst]
                    .iter()
                    .filter(|o| o.confidence >= threshold)
                    .count();
                let severity = match confident {
                    2 => Severity::High,
                    1 => Severity::Medium,
                    _ => Severity::Low,
                };

                Some(Insight::new(
                    InsightType::Contradiction,
                    severity,
                    InsightPayload::Contradiction {
                        src_id: src.id.clone(),
                        dst_id: dst.id.clone(),
                        src_text: src.canonical_text.clone(),
                        dst_text: dst.canonical_text.clone(),
                        link_confidence: pair.link_confidence,
                    },
                ))
            })
            .collect()
    }

    /// Degree centrality per active node: `(in + out) / (2 · (|V| − 1))`,
    /// counting only edges between active nodes. A singleton graph scores 0
    /// rather than dividing by zero. Sorted by id.
    pub fn compute_centrality(&self) -> Vec<(String, f32)> {
        let active = self.graph.active_objects();
        let n = active.len();

        active
            .iter()
            .map(|object| {
                let centrality = if n > 1 {
                    self.graph.active_degree(&object.id) as f32 / (2 * (n - 1)) as f32
                } else {
                    0.0
                };
                (object.id.clone(), centrality)
            })
            .collect()
    }

    /// Nodes at or above the configured centrality percentile, excluding
    /// isolated nodes. These are the graph's "core concepts".
    pub fn core_concepts(&self) -> Vec<(String, f32)> {
        let centrality = self.compute_centrality();
        if centrality.is_empty() {
            return Vec::new();
        }

        let mut values: Vec<f32> = centrality.iter().map(|(_, c)| *c).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let idx = ((values.len() - 1) as f32 * self.config.centrality_percentile).ceil() as usize;
        let cutoff = values[idx.min(values.len() - 1)];

        centrality
            .into_iter()
            .filter(|(_, c)| *c >= cutoff && *c > 0.0)
            .collect()
    }

    /// A core concept with no `SameAs` edge in either direction is a
    /// heuristic signal (not a guarantee) that the same concept may
    /// exist elsewhere under different wording.
    pub fn consolidation_opportunities(&self) -> Vec<Insight> {
        self.core_concepts()
            .into_iter()
            .filter(|(id, _)| !self.graph.has_same_as(id))
            .filter_map(|(id, centrality)| {
                let object = self.graph.node(&id)?;
                Some(Insight::new(
                    InsightType::ConsolidationOpportunity,
                    Severity::Low,
                    InsightPayload::ConsolidationOpportunity {
                        object_id: object.id.clone(),
                        text: object.canonical_text.clone(),
                        centrality,
                    },
                ))
            })
            .collect()
    }

    /// A Question with zero outgoing edges of any type was never addressed
    /// by a claim, evidence, or refinement.
    pub fn detect_stale_threads(&self) -> Vec<Insight> {
        self.graph
            .active_objects()
            .into_iter()
            .filter(|o| o.object_type == ObjectType::Question)
            .filter(|o| self.graph.out_degree(&o.id) == 0)
            .map(|o| {
                Insight::new(
                    InsightType::StaleThread,
                    self.config.stale_severity,
                    InsightPayload::StaleThread {
                        question_id: o.id.clone(),
                        text: o.canonical_text.clone(),
                    },
                )
            })
            .collect()
    }

    /// Run all three analyses and return a deterministic ordering: insight
    /// type, then severity (high first), then primary subject id.
    pub fn generate_insights(&self) -> Vec<Insight> {
        let mut insights = self.detect_contradictions();
        insights.extend(self.detect_stale_threads());
        insights.extend(self.consolidation_opportunities());

        insights.sort_by(|a, b| {
            a.insight_type
                .cmp(&b.insight_type)
                .then(a.severity.cmp(&b.severity))
                .then_with(|| a.payload.subject_id().cmp(b.payload.subject_id()))
        });

        debug!(count = insights.len(), "generated insights");
        insights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Link, LinkType, Object};

    fn object(id: &str, object_type: ObjectType, confidence: f32) -> Object {
        Object::new(id, object_type, format!("text of {id}"), confidence)
    }

    fn link(src: &str, dst: &str, link_type: LinkType) -> Link {
        Link {
            src_id: src.to_string(),
            dst_id: dst.to_string(),
            link_type,
            confidence: 0.9,
            evidence_span_id: None,
        }
    }

    fn layer(graph: &KnowledgeGraph) -> IntelligenceLayer<'_> {
        IntelligenceLayer::new(graph, InsightConfig::default())
    }

    #[test]
    fn test_contradiction_severity_policy() {
        let mut graph = KnowledgeGraph::new();
        graph
            .add_objects(vec![
                object("c1", ObjectType::Claim, 0.9),
                object("c2", ObjectType::Claim, 0.8),
                object("c3", ObjectType::Claim, 0.5),
                object("c4", ObjectType::Claim, 0.3),
            ])
            .unwrap();
        graph
            .add_links(vec![
                link("c1", "c2", LinkType::Contradicts),
                link("c1", "c3", LinkType::Contradicts),
                link("c3", "c4", LinkType::Contradicts),
            ])
            .unwrap();

        let insights = layer(&graph).detect_contradictions();
        assert_eq!(insights.len(), 3);

        let severity_of = |src: &str, dst: &str| {
            insights
                .iter()
                .find(|i| match &i.payload {
                    InsightPayload::Contradiction { src_id, dst_id, .. } => {
                        src_id == src && dst_id == dst
                    }
                    _ => false,
                })
                .map(|i| i.severity)
                .unwrap()
        };

        // 0.9 vs 0.8: both at or above 0.7.
        assert_eq!(severity_of("c1", "c2"), Severity::High);
        // 0.9 vs 0.5: exactly one.
        assert_eq!(severity_of("c1", "c3"), Severity::Medium);
        // 0.5 vs 0.3: neither.
        assert_eq!(severity_of("c3", "c4"), Severity::Low);
    }

    #[test]
    fn test_contradiction_symmetry_of_reporting() {
        // Swapping endpoint confidences changes severity, never whether the
        // pair is reported.
        let build = |ca: f32, cb: f32| {
            let mut graph = KnowledgeGraph::new();
            graph
                .add_objects(vec![
                    object("a", ObjectType::Claim, ca),
                    object("b", ObjectType::Claim, cb),
                ])
                .unwrap();
            graph
                .add_links(vec![link("a", "b", LinkType::Contradicts)])
                .unwrap();
            graph
        };

        let g1 = build(0.9, 0.2);
        let g2 = build(0.2, 0.9);
        let i1 = layer(&g1).detect_contradictions();
        let i2 = layer(&g2).detect_contradictions();
        assert_eq!(i1.len(), 1);
        assert_eq!(i2.len(), 1);
        assert_eq!(i1[0].severity, i2[0].severity);
    }

    #[test]
    fn test_stale_thread_detection() {
        let mut graph = KnowledgeGraph::new();
        graph
            .add_objects(vec![
                object("q1", ObjectType::Question, 0.8),
                object("c1", ObjectType::Claim, 0.9),
            ])
            .unwrap();

        let insights = layer(&graph).detect_stale_threads();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].severity, Severity::Medium);
        match &insights[0].payload {
            InsightPayload::StaleThread { question_id, .. } => assert_eq!(question_id, "q1"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_question_with_any_outgoing_edge_is_not_stale() {
        let mut graph = KnowledgeGraph::new();
        graph
            .add_objects(vec![
                object("q1", ObjectType::Question, 0.8),
                object("c1", ObjectType::Claim, 0.9),
            ])
            .unwrap();
        graph
            .add_links(vec![link("q1", "c1", LinkType::DependsOn)])
            .unwrap();

        assert!(layer(&graph).detect_stale_threads().is_empty());

        // Incoming edges alone do not rescue a question.
        let mut graph2 = KnowledgeGraph::new();
        graph2
            .add_objects(vec![
                object("q1", ObjectType::Question, 0.8),
                object("c1", ObjectType::Claim, 0.9),
            ])
            .unwrap();
        graph2
            .add_links(vec![link("c1", "q1", LinkType::Contradicts)])
            .unwrap();
        assert_eq!(layer(&graph2).detect_stale_threads().len(), 1);
    }

    #[test]
    fn test_centrality_formula_and_singleton() {
        let mut graph = KnowledgeGraph::new();
        graph
            .add_objects(vec![object("only", ObjectType::Idea, 0.9)])
            .unwrap();
        let centrality = layer(&graph).compute_centrality();
        assert_eq!(centrality, vec![("only".to_string(), 0.0)]);

        let mut graph = KnowledgeGraph::new();
        graph
            .add_objects(vec![
                object("a", ObjectType::Idea, 0.9),
                object("b", ObjectType::Idea, 0.9),
                object("c", ObjectType::Idea, 0.9),
            ])
            .unwrap();
        graph
            .add_links(vec![
                link("a", "b", LinkType::Supports),
                link("c", "a", LinkType::Refines),
            ])
            .unwrap();

        let centrality = layer(&graph).compute_centrality();
        let score = |id: &str| {
            centrality
                .iter()
                .find(|(i, _)| i == id)
                .map(|(_, c)| *c)
                .unwrap()
        };
        // a: degree 2 over 2·(3−1) = 4.
        assert!((score("a") - 0.5).abs() < 1e-6);
        assert!((score("b") - 0.25).abs() < 1e-6);
        assert!((score("c") - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_centrality_invariant_under_relabeling() {
        let build = |ids: [&str; 3]| {
            let mut graph = KnowledgeGraph::new();
            graph
                .add_objects(ids.map(|id| object(id, ObjectType::Idea, 0.9)).to_vec())
                .unwrap();
            graph
                .add_links(vec![
                    link(ids[0], ids[1], LinkType::Supports),
                    link(ids[2], ids[0], LinkType::Causes),
                ])
                .unwrap();
            graph
        };

        let g1 = build(["a", "b", "c"]);
        let g2 = build(["x", "y", "z"]);

        let sorted = |g: &KnowledgeGraph| {
            let mut values: Vec<f32> = IntelligenceLayer::new(g, InsightConfig::default())
                .compute_centrality()
                .into_iter()
                .map(|(_, c)| c)
                .collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap());
            values
        };
        assert_eq!(sorted(&g1), sorted(&g2));
    }

    #[test]
    fn test_consolidation_flags_core_concept_without_same_as() {
        // Hub "a" touches every other node; its duplicate "dup" has a
        // SameAs link, "a" does not.
        let mut graph = KnowledgeGraph::new();
        graph
            .add_objects(vec![
                object("a", ObjectType::Idea, 0.9),
                object("b", ObjectType::Claim, 0.9),
                object("c", ObjectType::Claim, 0.9),
                object("d", ObjectType::Claim, 0.9),
            ])
            .unwrap();
        graph
            .add_links(vec![
                link("a", "b", LinkType::Supports),
                link("a", "c", LinkType::Supports),
                link("a", "d", LinkType::Supports),
            ])
            .unwrap();

        let insights = layer(&graph).consolidation_opportunities();
        assert_eq!(insights.len(), 1);
        match &insights[0].payload {
            InsightPayload::ConsolidationOpportunity { object_id, .. } => {
                assert_eq!(object_id, "a")
            }
            other => panic!("unexpected payload: {other:?}"),
        }

        // A SameAs edge on the hub clears the signal.
        graph
            .add_objects(vec![object("a2", ObjectType::Idea, 0.9)])
            .unwrap();
        graph
            .add_links(vec![link("a", "a2", LinkType::SameAs)])
            .unwrap();
        let insights = layer(&graph).consolidation_opportunities();
        assert!(insights.iter().all(|i| match &i.payload {
            InsightPayload::ConsolidationOpportunity { object_id, .. } => object_id != "a",
            _ => true,
        }));
    }

    #[test]
    fn test_generate_insights_deterministic_order() {
        let mut graph = KnowledgeGraph::new();
        graph
            .add_objects(vec![
                object("c1", ObjectType::Claim, 0.9),
                object("c2", ObjectType::Claim, 0.8),
                object("q1", ObjectType::Question, 0.6),
                object("q2", ObjectType::Question, 0.6),
            ])
            .unwrap();
        graph
            .add_links(vec![link("c1", "c2", LinkType::Contradicts)])
            .unwrap();

        let first = layer(&graph).generate_insights();
        let second = layer(&graph).generate_insights();

        let shape = |insights: &[Insight]| {
            insights
                .iter()
                .map(|i| (i.insight_type, i.severity, i.payload.subject_id().to_string()))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&first), shape(&second));

        // Contradictions come first, then stale threads sorted by id.
        assert_eq!(first[0].insight_type, InsightType::Contradiction);
        assert_eq!(first[1].payload.subject_id(), "q1");
        assert_eq!(first[2].payload.subject_id(), "q2");
    }

    #[test]
    fn test_merged_objects_are_never_analysis_endpoints() {
        let mut graph = KnowledgeGraph::new();
        graph
            .add_objects(vec![
                object("q1", ObjectType::Question, 0.8),
                object("keep", ObjectType::Question, 0.8),
            ])
            .unwrap();
        graph.merge("q1", "keep").unwrap();

        let insights = layer(&graph).detect_stale_threads();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].payload.subject_id(), "keep");
    }
}
