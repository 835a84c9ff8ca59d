//! Link graph and damped PageRank over indexed documents
//!
//! Only links that resolve to an indexed document become edges; self-links
//! and duplicate links are ignored. Scores are computed once per snapshot,
//! never per query.

use crate::index::{DocId, InvertedIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Directed graph of links between indexed documents
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    nodes: Vec<DocId>,
    outgoing: Vec<Vec<usize>>,
}

impl LinkGraph {
    pub fn from_index(index: &InvertedIndex) -> Self {
        let nodes: Vec<DocId> = index.documents().map(|d| d.id).collect();
        let position: HashMap<DocId, usize> =
            nodes.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let outgoing = index
            .documents()
            .enumerate()
            .map(|(source, record)| {
                let targets: BTreeSet<usize> = record
                    .outbound_links
                    .iter()
                    .filter_map(|link| position.get(&DocId::from_url(link)).copied())
                    .filter(|target| *target != source)
                    .collect();
                targets.into_iter().collect()
            })
            .collect();

        Self { nodes, outgoing }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.iter().map(Vec::len).sum()
    }

    /// Number of indexed documents linking to `id`
    pub fn inbound_count(&self, id: DocId) -> usize {
        let Some(target) = self.nodes.iter().position(|n| *n == id) else {
            return 0;
        };
        self.outgoing.iter().filter(|t| t.contains(&target)).count()
    }

    /// Damped PageRank, normalized so the best document scores 1.0
    ///
    /// Rank held by documents without outgoing edges is spread evenly over
    /// all documents each iteration. Iteration stops early once the L1
    /// change drops below `tolerance`.
    pub fn pagerank(&self, damping: f64, iterations: usize, tolerance: f64) -> BTreeMap<DocId, f64> {
        let n = self.nodes.len();
        if n == 0 {
            return BTreeMap::new();
        }

        let uniform = 1.0 / n as f64;
        let mut rank = vec![uniform; n];
        let mut rounds = 0;

        for _ in 0..iterations {
            rounds += 1;
            let dangling: f64 = self
                .outgoing
                .iter()
                .zip(&rank)
                .filter(|(targets, _)| targets.is_empty())
                .map(|(_, r)| r)
                .sum();

            let base = (1.0 - damping) * uniform + damping * dangling * uniform;
            let mut next = vec![base; n];
            for (source, targets) in self.outgoing.iter().enumerate() {
                if targets.is_empty() {
                    continue;
                }
                let share = damping * rank[source] / targets.len() as f64;
                for &target in targets {
                    next[target] += share;
                }
            }

            let delta: f64 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
            rank = next;
            if delta < tolerance {
                break;
            }
        }

        debug!(
            "PageRank over {} documents and {} links converged after {} iterations",
            n,
            self.edge_count(),
            rounds
        );

        let max = rank.iter().copied().fold(0.0_f64, f64::max);
        self.nodes
            .iter()
            .zip(rank)
            .map(|(id, r)| (*id, if max > 0.0 { r / max } else { 0.0 }))
            .collect()
    }
}
