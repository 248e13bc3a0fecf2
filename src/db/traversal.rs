//! Breadth-first graph walks driven by a declarative policy.
//!
//! A [`TraversalPolicy`] names which `(EdgeKind, Direction)` pairs to follow
//! and which visited positions to yield. Expansion happens one node per call
//! to `next`, so a walk only touches as much of the graph as its consumer
//! pulls. Every node is visited at most once and the start node is never
//! yielded.

use std::collections::{HashSet, VecDeque};

use super::graph::{Direction, Edge, EdgeKind, GraphTx, NodeId};
use crate::error::Result;

/// Where a walk currently stands.
#[derive(Debug, Clone)]
pub struct Position {
    pub node: NodeId,
    /// Number of hops from the start node.
    pub depth: usize,
    /// The edge used to reach `node`. `None` only for the start node.
    pub last_edge: Option<Edge>,
}

impl Position {
    pub fn reached_via(&self, kind: EdgeKind) -> bool {
        self.last_edge.as_ref().is_some_and(|edge| edge.kind == kind)
    }
}

pub trait TraversalPolicy {
    /// Relationship types and directions to follow out of every visited node.
    fn expand(&self) -> &[(EdgeKind, Direction)];

    /// Whether the walk yields the node at `position`.
    fn include(&self, position: &Position) -> bool;
}

/// A one-shot, lazily expanded walk over the graph.
pub struct Traversal<'t, 'c, P> {
    tx: &'t GraphTx<'c>,
    policy: P,
    queue: VecDeque<Position>,
    visited: HashSet<NodeId>,
}

impl<'t, 'c, P: TraversalPolicy> Traversal<'t, 'c, P> {
    fn new(tx: &'t GraphTx<'c>, start: NodeId, policy: P) -> Self {
        let mut visited = HashSet::new();
        visited.insert(start);
        let mut queue = VecDeque::new();
        queue.push_back(Position {
            node: start,
            depth: 0,
            last_edge: None,
        });
        Self {
            tx,
            policy,
            queue,
            visited,
        }
    }

    fn expand(&mut self, position: &Position) -> Result<()> {
        for &(kind, direction) in self.policy.expand() {
            for edge in self.tx.edges(position.node, kind, direction)? {
                let next = edge.other(position.node);
                if self.visited.insert(next) {
                    self.queue.push_back(Position {
                        node: next,
                        depth: position.depth + 1,
                        last_edge: Some(edge),
                    });
                }
            }
        }
        Ok(())
    }
}

impl<P: TraversalPolicy> Iterator for Traversal<'_, '_, P> {
    type Item = Result<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(position) = self.queue.pop_front() {
            if let Err(e) = self.expand(&position) {
                self.queue.clear();
                return Some(Err(e));
            }
            if position.depth > 0 && self.policy.include(&position) {
                return Some(Ok(position.node));
            }
        }
        None
    }
}

impl<'c> GraphTx<'c> {
    /// Walk the graph from `start` according to `policy`.
    pub fn traverse<'t, P: TraversalPolicy>(
        &'t self,
        start: NodeId,
        policy: P,
    ) -> Traversal<'t, 'c, P> {
        Traversal::new(self, start, policy)
    }
}
