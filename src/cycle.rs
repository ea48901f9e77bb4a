//! Simple directed cycle enumeration.
//!
//! Finds cycles of length 3 to 5 in the transaction graph: money leaving an
//! account and returning to it through a short chain of intermediaries. Each
//! cycle is discovered exactly once, rooted at its smallest account id, using
//! a bounded depth-first search over an explicit stack.

use tracing::debug;

use crate::graph::TransactionGraph;
use crate::{clip01, DetectorOutput, Finding, PatternKind};
use serde::{Deserialize, Serialize};

/// Circulated amount at which the amount factor saturates.
const AMOUNT_SATURATION: f64 = 50_000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Maximum cycle length. Cycles shorter than 3 are never reported.
    pub length_bound: usize,
    /// Global cap on enumerated cycles.
    pub max_cycles: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            length_bound: 5,
            max_cycles: 500,
        }
    }
}

pub struct CycleDetector {
    config: CycleConfig,
}

impl CycleDetector {
    pub fn new() -> Self {
        Self {
            config: CycleConfig::default(),
        }
    }

    pub fn with_config(config: CycleConfig) -> Self {
        Self { config }
    }

    /// Enumerate simple cycles and score each one.
    ///
    /// Roots are visited in ascending id order and each search only traverses
    /// nodes ordered at or above its root, so every cycle comes out exactly
    /// once, rotated to start at its smallest member. The length bound is
    /// enforced inside the search.
    pub fn detect(&self, graph: &TransactionGraph) -> DetectorOutput {
        let ids: Vec<&String> = graph.nodes().keys().collect();
        let index: std::collections::HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        // ids are sorted, so index order is lexicographic order.
        let adj: Vec<Vec<usize>> = ids
            .iter()
            .map(|id| {
                graph.nodes()[id.as_str()]
                    .out_neighbors()
                    .iter()
                    .map(|n| index[n.as_str()])
                    .collect()
            })
            .collect();

        let mut findings = Vec::new();
        let mut truncated = false;
        let mut on_path = vec![false; ids.len()];

        'roots: for root in 0..ids.len() {
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            let mut path: Vec<usize> = vec![root];
            on_path[root] = true;

            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                if next < adj[node].len() {
                    frame.1 += 1;
                    let succ = adj[node][next];
                    if succ < root {
                        continue;
                    }
                    if succ == root {
                        if path.len() >= 3 {
                            if let Some(finding) = self.score_cycle(graph, &ids, &path) {
                                findings.push(finding);
                                if findings.len() >= self.config.max_cycles {
                                    truncated = true;
                                    break 'roots;
                                }
                            }
                        }
                    } else if !on_path[succ] && path.len() < self.config.length_bound {
                        stack.push((succ, 0));
                        path.push(succ);
                        on_path[succ] = true;
                    }
                } else {
                    stack.pop();
                    path.pop();
                    on_path[node] = false;
                }
            }
        }

        debug!(
            cycles = findings.len(),
            truncated, "cycle enumeration complete"
        );
        DetectorOutput {
            findings,
            truncated,
        }
    }

    /// Score one cycle. Returns `None` when a cycle edge carries no volume.
    fn score_cycle(
        &self,
        graph: &TransactionGraph,
        ids: &[&String],
        path: &[usize],
    ) -> Option<Finding> {
        let k = path.len();
        let mut total = 0.0;
        let mut chosen_ts = Vec::with_capacity(k);
        let mut reference = None;

        for i in 0..k {
            let source = ids[path[i]];
            let target = ids[path[(i + 1) % k]];
            let edge = graph.edge(source, target)?;
            if edge.total_amount <= 0.0 {
                return None;
            }
            total += edge.total_amount;

            let reference = *reference.get_or_insert(edge.timestamps[0]);
            let closest = edge
                .timestamps
                .iter()
                .min_by_key(|ts| (**ts - reference).num_milliseconds().abs())?;
            chosen_ts.push(*closest);
        }

        let span = *chosen_ts.iter().max()? - *chosen_ts.iter().min()?;
        let span_hours = span.num_seconds() as f64 / 3600.0;

        let length_factor = (6 - k) as f64 / 3.0;
        let amount_factor = (total / AMOUNT_SATURATION).min(1.0);
        let compactness = 1.0 / (1.0 + span_hours / 24.0);
        let raw_score = clip01(0.4 * length_factor + 0.3 * amount_factor + 0.3 * compactness);

        Some(Finding {
            kind: PatternKind::Cycle,
            accounts: path.iter().map(|&i| ids[i].clone()).collect(),
            amount: total,
            span,
            raw_score,
        })
    }
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new()
    }
}
