//! Shell-chain detection: layering through low-activity pass-through accounts.
//!
//! A shell chain is a simple directed path of at least three hops whose
//! interior accounts have almost no other connections. Funds hop through such
//! accounts to put distance between origin and destination. Chains are
//! enumerated by a bounded breadth-first search from each origin.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::graph::TransactionGraph;
use crate::{clip01, DetectorOutput, Finding, PatternKind};

/// Path amount at which the amount factor saturates.
const AMOUNT_SATURATION: f64 = 100_000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellChainConfig {
    /// Maximum hops explored from an origin.
    pub max_depth: usize,
    /// Minimum hops for a path to count as a chain.
    pub min_hops: usize,
    /// Maximum combined distinct-counterparty degree of interior nodes.
    pub intermediate_degree_max: usize,
    /// Global cap on enumerated chains.
    pub max_chains: usize,
}

impl Default for ShellChainConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_hops: 3,
            intermediate_degree_max: 3,
            max_chains: 200,
        }
    }
}

pub struct ShellChainDetector {
    config: ShellChainConfig,
}

impl ShellChainDetector {
    pub fn new() -> Self {
        Self {
            config: ShellChainConfig::default(),
        }
    }

    pub fn with_config(config: ShellChainConfig) -> Self {
        Self { config }
    }

    /// Enumerate layered chains in BFS order, origins ascending.
    ///
    /// A path is only extended past its current terminal when that terminal
    /// would qualify as an interior node; origin and final terminal are free
    /// to be well-connected accounts.
    pub fn detect(&self, graph: &TransactionGraph) -> DetectorOutput {
        let ids: Vec<&String> = graph.nodes().keys().collect();
        let index: std::collections::HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
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
        let degree: Vec<usize> = ids
            .iter()
            .map(|id| graph.nodes()[id.as_str()].degree())
            .collect();

        let mut findings = Vec::new();
        let mut truncated = false;

        'origins: for origin in 0..ids.len() {
            let mut queue: VecDeque<Vec<usize>> = VecDeque::new();
            queue.push_back(vec![origin]);

            while let Some(path) = queue.pop_front() {
                let terminal = *path.last().expect("paths are never empty");
                let hops = path.len() - 1;
                if hops >= self.config.max_depth {
                    continue;
                }
                // Extending makes the current terminal an interior node.
                if hops >= 1 && degree[terminal] > self.config.intermediate_degree_max {
                    continue;
                }

                for &succ in &adj[terminal] {
                    if path.contains(&succ) {
                        continue;
                    }
                    let mut extended = path.clone();
                    extended.push(succ);
                    if extended.len() - 1 >= self.config.min_hops {
                        if let Some(finding) = self.score_chain(graph, &ids, &extended) {
                            findings.push(finding);
                            if findings.len() >= self.config.max_chains {
                                truncated = true;
                                break 'origins;
                            }
                        }
                    }
                    queue.push_back(extended);
                }
            }
        }

        debug!(
            chains = findings.len(),
            truncated, "shell-chain enumeration complete"
        );
        DetectorOutput {
            findings,
            truncated,
        }
    }

    fn score_chain(
        &self,
        graph: &TransactionGraph,
        ids: &[&String],
        path: &[usize],
    ) -> Option<Finding> {
        let hops = path.len() - 1;
        let mut total = 0.0;
        let mut earliest = None;
        let mut latest = None;

        for pair in path.windows(2) {
            let edge = graph.edge(ids[pair[0]], ids[pair[1]])?;
            total += edge.total_amount;
            let first = *edge.timestamps.first()?;
            let last = *edge.timestamps.last()?;
            earliest = Some(earliest.map_or(first, |e: chrono::DateTime<chrono::Utc>| e.min(first)));
            latest = Some(latest.map_or(last, |l: chrono::DateTime<chrono::Utc>| l.max(last)));
        }

        let span = latest? - earliest?;
        let span_hours = span.num_seconds() as f64 / 3600.0;

        let compactness = 1.0 / (1.0 + span_hours / 24.0);
        let amount_factor = (total / AMOUNT_SATURATION).min(1.0);
        let depth_factor = (hops as f64 / self.config.max_depth as f64).min(1.0);
        let raw_score = clip01(0.4 * compactness + 0.3 * amount_factor + 0.3 * depth_factor);

        Some(Finding {
            kind: PatternKind::ShellChain,
            accounts: path.iter().map(|&i| ids[i].clone()).collect(),
            amount: total,
            span,
            raw_score,
        })
    }
}

impl Default for ShellChainDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transaction;
    use chrono::{TimeZone, Utc};

    fn tx(id: &str, from: &str, to: &str, amount: f64, hour: i64) -> Transaction {
        Transaction {
            transaction_id: id.to_string(),
            sender_id: from.to_string(),
            receiver_id: to.to_string(),
            amount,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
                + chrono::Duration::hours(hour),
        }
    }

    fn layered_batch() -> Vec<Transaction> {
        vec![
            tx("T1", "A", "B", 50_000.0, 0),
            tx("T2", "B", "C", 49_000.0, 2),
            tx("T3", "C", "D", 48_000.0, 4),
            tx("T4", "D", "E", 47_000.0, 6),
        ]
    }

    fn detect(batch: &[Transaction]) -> DetectorOutput {
        let graph = TransactionGraph::build(batch).unwrap();
        ShellChainDetector::new().detect(&graph)
    }

    #[test]
    fn test_layered_chain_found() {
        let out = detect(&layered_batch());

        let full: Vec<&Finding> = out
            .findings
            .iter()
            .filter(|f| f.accounts == ["A", "B", "C", "D", "E"])
            .collect();
        assert_eq!(full.len(), 1);

        let f = full[0];
        assert_eq!(f.amount, 194_000.0);
        assert_eq!(f.span, chrono::Duration::hours(6));
        // 0.4 / 1.25 + 0.3 * 1.0 + 0.3 * (4 / 6)
        assert!((f.raw_score - 0.82).abs() < 1e-9);
    }

    #[test]
    fn test_subchains_of_one_run_are_also_paths() {
        let out = detect(&layered_batch());
        // A..D, A..E, B..E all qualify; ring merging collapses them later.
        assert_eq!(out.findings.len(), 3);
        assert_eq!(out.findings[0].accounts, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_busy_intermediate_blocks_chain() {
        // C is also counterparty to four unrelated accounts, degree > 3.
        let mut batch = layered_batch();
        for i in 0..4 {
            batch.push(tx(&format!("X{}", i), &format!("N{}", i), "C", 100.0, 12));
        }

        let out = detect(&batch);
        assert!(out.findings.iter().all(|f| {
            let interior = &f.accounts[1..f.accounts.len() - 1];
            !interior.contains(&"C".to_string())
        }));
    }

    #[test]
    fn test_short_path_not_a_chain() {
        let out = detect(&[
            tx("T1", "A", "B", 10_000.0, 0),
            tx("T2", "B", "C", 10_000.0, 1),
        ]);
        assert!(out.findings.is_empty());
    }

    #[test]
    fn test_depth_bound_limits_paths() {
        let chain = ["A", "B", "C", "D", "E", "F", "G", "H", "I"];
        let batch: Vec<Transaction> = (0..8)
            .map(|i| {
                tx(
                    &format!("T{}", i),
                    chain[i],
                    chain[i + 1],
                    1000.0,
                    i as i64,
                )
            })
            .collect();

        let out = detect(&batch);
        assert!(out
            .findings
            .iter()
            .all(|f| f.accounts.len() <= ShellChainConfig::default().max_depth + 1));
    }

    #[test]
    fn test_cap_truncates_enumeration() {
        let detector = ShellChainDetector::with_config(ShellChainConfig {
            max_chains: 2,
            ..Default::default()
        });
        let graph = TransactionGraph::build(&layered_batch()).unwrap();
        let out = detector.detect(&graph);

        assert_eq!(out.findings.len(), 2);
        assert!(out.truncated);
    }
}
