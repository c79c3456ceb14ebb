//! Directed multigraph of extracted objects and typed links.
//!
//! Nodes live in an arena keyed by object id; edges are (src, type, dst)
//! tuples held in per-node adjacency lists, which sidesteps cyclic
//! ownership entirely; Contradicts/SameAs relations are not acyclic, so
//! the structure must tolerate cycles. The graph never auto-merges:
//! `SameAs` edges are left for an external consolidation process, and a
//! merge is recorded as an O(1) status write that every read resolves
//! through.
//!
//! Mutation requires `&mut self`, so the borrow checker enforces the
//! one-writer discipline; wrap the graph in a `RwLock` when sharing it
//! across tasks.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Link, LinkType, Object, ObjectStatus};

/// A directed edge between two objects.
#[derive(Debug, Clone)]
pub struct Edge {
    pub src: String,
    pub dst: String,
    pub link_type: LinkType,
    pub confidence: f32,
    pub evidence_span_id: Option<String>,
}

/// Traversal direction for [`KnowledgeGraph::neighbors`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
}

/// A pair of objects joined by a `Contradicts` edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Contradiction {
    pub src_id: String,
    pub dst_id: String,
    /// Highest confidence among parallel Contradicts edges on this pair.
    pub link_confidence: f32,
}

#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    nodes: HashMap<String, Object>,
    outgoing: HashMap<String, Vec<Edge>>,
    incoming: HashMap<String, Vec<Edge>>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The object stored under `id`, without merge resolution.
    pub fn node(&self, id: &str) -> Option<&Object> {
        self.nodes.get(id)
    }

    /// The object `id` resolves to after following merge redirects.
    pub fn object(&self, id: &str) -> Option<&Object> {
        let root = self.resolve(id)?;
        self.nodes.get(root)
    }

    /// Follow `merged_into_*` redirects to the surviving root id.
    ///
    /// Merge chains can in principle be cyclic if fed bad data, so
    /// traversal tracks visited ids and stops at the first repeat.
    pub fn resolve<'a>(&'a self, id: &str) -> Option<&'a str> {
        let mut current = id;
        let mut seen: HashSet<&str> = HashSet::new();
        loop {
            let (key, object) = self.nodes.get_key_value(current)?;
            match &object.status {
                ObjectStatus::Active => return Some(key),
                ObjectStatus::MergedInto(target) => {
                    if !seen.insert(key) {
                        return Some(key);
                    }
                    current = target.as_str();
                }
            }
        }
    }

    /// Insert objects as nodes. Re-inserting an existing id overwrites its
    /// attributes (last write wins) but never touches its edges.
    pub fn add_objects(&mut self, objects: Vec<Object>) -> Result<()> {
        for object in &objects {
            if object.id.is_empty() {
                return Err(Error::EmptyId);
            }
            if !(0.0..=1.0).contains(&object.confidence) {
                return Err(Error::InvalidConfidence {
                    id: object.id.clone(),
                    value: object.confidence,
                });
            }
        }
        for object in objects {
            self.nodes.insert(object.id.clone(), object);
        }
        Ok(())
    }

    /// Insert directed edges. Fails with [`Error::DanglingReference`] when
    /// an endpoint is absent or merged away; edges never create nodes
    /// implicitly. Self-loops are permitted only for `SameAs`.
    pub fn add_links(&mut self, links: Vec<Link>) -> Result<usize> {
        for link in &links {
            self.check_link(link)?;
        }

        let added = links.len();
        for link in links {
            let edge = Edge {
                src: link.src_id.clone(),
                dst: link.dst_id.clone(),
                link_type: link.link_type,
                confidence: link.confidence,
                evidence_span_id: link.evidence_span_id,
            };
            self.outgoing
                .entry(link.src_id)
                .or_default()
                .push(edge.clone());
            self.incoming.entry(link.dst_id).or_default().push(edge);
        }
        Ok(added)
    }

    /// Validate a single link against the current node set.
    pub fn check_link(&self, link: &Link) -> Result<()> {
        if !(0.0..=1.0).contains(&link.confidence) {
            return Err(Error::InvalidConfidence {
                id: format!("{} -> {}", link.src_id, link.dst_id),
                value: link.confidence,
            });
        }
        let src_active = self.nodes.get(&link.src_id).is_some_and(Object::is_active);
        let dst_active = self.nodes.get(&link.dst_id).is_some_and(Object::is_active);
        if !src_active || !dst_active {
            return Err(Error::DanglingReference {
                src: link.src_id.clone(),
                dst: link.dst_id.clone(),
            });
        }
        if link.src_id == link.dst_id && link.link_type != LinkType::SameAs {
            return Err(Error::SelfLoop {
                id: link.src_id.clone(),
            });
        }
        Ok(())
    }

    /// Record that `id` has been merged into `into`. O(1): edges are left
    /// in place and reads resolve through the redirect.
    pub fn merge(&mut self, id: &str, into: &str) -> Result<()> {
        if !self.nodes.contains_key(into) {
            return Err(Error::DanglingReference {
                src: id.to_string(),
                dst: into.to_string(),
            });
        }
        let node = self.nodes.get_mut(id).ok_or_else(|| Error::DanglingReference {
            src: id.to_string(),
            dst: into.to_string(),
        })?;
        node.status = ObjectStatus::MergedInto(into.to_string());
        debug!(from = id, into, "object merged");
        Ok(())
    }

    /// All distinct (src, dst) pairs joined by a `Contradicts` edge where
    /// both endpoints are active. Sorted by (src, dst) for determinism.
    pub fn find_contradictions(&self) -> Vec<Contradiction> {
        let mut pairs: BTreeMap<(String, String), f32> = BTreeMap::new();

        for edges in self.outgoing.values() {
            for edge in edges {
                if edge.link_type != LinkType::Contradicts {
                    continue;
                }
                let src_active = self.nodes.get(&edge.src).is_some_and(Object::is_active);
                let dst_active = self.nodes.get(&edge.dst).is_some_and(Object::is_active);
                if !src_active || !dst_active {
                    continue;
                }
                let entry = pairs
                    .entry((edge.src.clone(), edge.dst.clone()))
                    .or_insert(edge.confidence);
                if edge.confidence > *entry {
                    *entry = edge.confidence;
                }
            }
        }

        pairs
            .into_iter()
            .map(|((src_id, dst_id), link_confidence)| Contradiction {
                src_id,
                dst_id,
                link_confidence,
            })
            .collect()
    }

    /// Adjacent objects of `id`, optionally filtered by edge type.
    ///
    /// Neighbor ids are merge-resolved, deduplicated, and returned sorted
    /// by id. A `Supports` edge A→B appears only under `Outgoing` for A;
    /// there are no implicit undirected semantics.
    pub fn neighbors(
        &self,
        id: &str,
        direction: Direction,
        type_filter: Option<LinkType>,
    ) -> Vec<&Object> {
        let mut ids: BTreeSet<&str> = BTreeSet::new();

        let mut collect = |edges: Option<&Vec<Edge>>, pick_dst: bool| {
            if let Some(edges) = edges {
                for edge in edges {
                    if type_filter.is_some_and(|t| t != edge.link_type) {
                        continue;
                    }
                    let other = if pick_dst { &edge.dst } else { &edge.src };
                    if let Some(root) = self.resolve(other) {
                        if root != id {
                            ids.insert(root);
                        }
                    }
                }
            }
        };

        match direction {
            Direction::Outgoing => collect(self.outgoing.get(id), true),
            Direction::Incoming => collect(self.incoming.get(id), false),
            Direction::Both => {
                collect(self.outgoing.get(id), true);
                collect(self.incoming.get(id), false);
            }
        }

        ids.into_iter().filter_map(|i| self.nodes.get(i)).collect()
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.outgoing.get(id).map_or(0, Vec::len)
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.incoming.get(id).map_or(0, Vec::len)
    }

    /// True when `id` has a `SameAs` edge in either direction.
    pub fn has_same_as(&self, id: &str) -> bool {
        let out = self
            .outgoing
            .get(id)
            .is_some_and(|edges| edges.iter().any(|e| e.link_type == LinkType::SameAs));
        let inc = self
            .incoming
            .get(id)
            .is_some_and(|edges| edges.iter().any(|e| e.link_type == LinkType::SameAs));
        out || inc
    }

    /// Active (non-merged) objects, sorted by id for stable iteration.
    pub fn active_objects(&self) -> Vec<&Object> {
        let mut objects: Vec<&Object> = self.nodes.values().filter(|o| o.is_active()).collect();
        objects.sort_by(|a, b| a.id.cmp(&b.id));
        objects
    }

    /// Degree of `id` counting only edges whose other endpoint is active.
    /// This keeps centrality invariant under merges and relabeling.
    pub fn active_degree(&self, id: &str) -> usize {
        let count = |edges: Option<&Vec<Edge>>, pick_dst: bool| {
            edges.map_or(0, |edges| {
                edges
                    .iter()
                    .filter(|e| {
                        let other = if pick_dst { &e.dst } else { &e.src };
                        self.nodes.get(other).is_some_and(Object::is_active)
                    })
                    .count()
            })
        };
        count(self.outgoing.get(id), true) + count(self.incoming.get(id), false)
    }
}
