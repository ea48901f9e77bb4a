//! Transaction graph construction for money-muling analysis.
//!
//! Builds an immutable directed multigraph from a batch of transfers: one
//! aggregated edge per ordered (sender, receiver) pair, per-account transfer
//! legs sorted by timestamp, and distinct-counterparty degrees. All downstream
//! detectors read this graph concurrently without mutating it.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use crate::{AnalysisError, Transaction};

/// Tolerance for flow-conservation checks on f64 sums.
const FLOW_EPSILON: f64 = 1e-6;

/// One side of a transfer as seen from a single account.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferLeg {
    pub counterparty: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// Account node with aggregate flow statistics.
#[derive(Debug, Clone)]
pub struct AccountNode {
    pub account_id: String,
    pub total_sent: f64,
    pub total_received: f64,
    /// Outgoing legs, sorted by timestamp (ties by counterparty id).
    pub sent_tx: Vec<TransferLeg>,
    /// Incoming legs, sorted by timestamp (ties by counterparty id).
    pub recv_tx: Vec<TransferLeg>,
    out_neighbors: BTreeSet<String>,
    in_neighbors: BTreeSet<String>,
}

impl AccountNode {
    fn new(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            total_sent: 0.0,
            total_received: 0.0,
            sent_tx: Vec::new(),
            recv_tx: Vec::new(),
            out_neighbors: BTreeSet::new(),
            in_neighbors: BTreeSet::new(),
        }
    }

    /// Number of distinct accounts this account has sent to.
    pub fn out_degree(&self) -> usize {
        self.out_neighbors.len()
    }

    /// Number of distinct accounts this account has received from.
    pub fn in_degree(&self) -> usize {
        self.in_neighbors.len()
    }

    /// Combined distinct-counterparty degree.
    pub fn degree(&self) -> usize {
        self.in_degree() + self.out_degree()
    }

    pub fn out_neighbors(&self) -> &BTreeSet<String> {
        &self.out_neighbors
    }

    pub fn in_neighbors(&self) -> &BTreeSet<String> {
        &self.in_neighbors
    }

    /// Timestamps of every transfer this account took part in, merged from
    /// both directions and sorted ascending.
    pub fn participation_timestamps(&self) -> Vec<DateTime<Utc>> {
        let mut ts: Vec<DateTime<Utc>> = self
            .sent_tx
            .iter()
            .chain(self.recv_tx.iter())
            .map(|leg| leg.timestamp)
            .collect();
        ts.sort_unstable();
        ts
    }
}

/// Aggregated directed edge: every transfer for one ordered (source, target)
/// pair, with the individual timestamps retained for the detectors.
#[derive(Debug, Clone)]
pub struct AccountEdge {
    pub source: String,
    pub target: String,
    pub total_amount: f64,
    pub count: usize,
    /// Sorted ascending.
    pub timestamps: Vec<DateTime<Utc>>,
}

/// Immutable transaction graph shared by all detectors.
#[derive(Debug, Clone)]
pub struct TransactionGraph {
    nodes: BTreeMap<String, AccountNode>,
    edges: BTreeMap<(String, String), AccountEdge>,
    accepted: usize,
    discarded: usize,
}

impl TransactionGraph {
    /// Build the graph from a batch of transactions.
    ///
    /// Structurally malformed records (empty ids, non-finite amount) reject
    /// the whole batch: they indicate an upstream parsing bug rather than
    /// data. Records with a non-positive amount and self-loops are discarded.
    pub fn build(transactions: &[Transaction]) -> Result<Self, AnalysisError> {
        let mut graph = Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            accepted: 0,
            discarded: 0,
        };

        for tx in transactions {
            if tx.transaction_id.is_empty() || tx.sender_id.is_empty() || tx.receiver_id.is_empty()
            {
                return Err(AnalysisError::InvalidInput(format!(
                    "transaction {:?} has a missing identifier field",
                    tx.transaction_id
                )));
            }
            if !tx.amount.is_finite() {
                return Err(AnalysisError::InvalidInput(format!(
                    "transaction {} has a non-finite amount",
                    tx.transaction_id
                )));
            }
            if tx.amount <= 0.0 || tx.sender_id == tx.receiver_id {
                graph.discarded += 1;
                continue;
            }
            graph.insert(tx);
            graph.accepted += 1;
        }

        if graph.accepted == 0 {
            return Err(AnalysisError::EmptyInput(
                "no valid transactions in batch".to_string(),
            ));
        }

        graph.finalize();
        Ok(graph)
    }

    fn insert(&mut self, tx: &Transaction) {
        let sender = self
            .nodes
            .entry(tx.sender_id.clone())
            .or_insert_with(|| AccountNode::new(&tx.sender_id));
        sender.total_sent += tx.amount;
        sender.out_neighbors.insert(tx.receiver_id.clone());
        sender.sent_tx.push(TransferLeg {
            counterparty: tx.receiver_id.clone(),
            amount: tx.amount,
            timestamp: tx.timestamp,
        });

        let receiver = self
            .nodes
            .entry(tx.receiver_id.clone())
            .or_insert_with(|| AccountNode::new(&tx.receiver_id));
        receiver.total_received += tx.amount;
        receiver.in_neighbors.insert(tx.sender_id.clone());
        receiver.recv_tx.push(TransferLeg {
            counterparty: tx.sender_id.clone(),
            amount: tx.amount,
            timestamp: tx.timestamp,
        });

        let edge = self
            .edges
            .entry((tx.sender_id.clone(), tx.receiver_id.clone()))
            .or_insert_with(|| AccountEdge {
                source: tx.sender_id.clone(),
                target: tx.receiver_id.clone(),
                total_amount: 0.0,
                count: 0,
                timestamps: Vec::new(),
            });
        edge.total_amount += tx.amount;
        edge.count += 1;
        edge.timestamps.push(tx.timestamp);
    }

    fn finalize(&mut self) {
        for node in self.nodes.values_mut() {
            node.sent_tx
                .sort_by(|a, b| (a.timestamp, &a.counterparty).cmp(&(b.timestamp, &b.counterparty)));
            node.recv_tx
                .sort_by(|a, b| (a.timestamp, &a.counterparty).cmp(&(b.timestamp, &b.counterparty)));
        }
        for edge in self.edges.values_mut() {
            edge.timestamps.sort_unstable();
        }
    }

    pub fn nodes(&self) -> &BTreeMap<String, AccountNode> {
        &self.nodes
    }

    pub fn node(&self, account_id: &str) -> Option<&AccountNode> {
        self.nodes.get(account_id)
    }

    pub fn edges(&self) -> &BTreeMap<(String, String), AccountEdge> {
        &self.edges
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&AccountEdge> {
        self.edges
            .get(&(source.to_string(), target.to_string()))
    }

    pub fn account_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted
    }

    pub fn discarded_count(&self) -> usize {
        self.discarded
    }

    /// SHA-256 digest over the canonical edge list. Ties a report to the
    /// batch it was produced from and seeds deterministic sampling.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for edge in self.edges.values() {
            hasher.update(edge.source.as_bytes());
            hasher.update([0u8]);
            hasher.update(edge.target.as_bytes());
            hasher.update([0u8]);
            hasher.update(edge.total_amount.to_bits().to_be_bytes());
            hasher.update((edge.count as u64).to_be_bytes());
            for ts in &edge.timestamps {
                hasher.update(ts.timestamp_micros().to_be_bytes());
            }
        }
        hex::encode(hasher.finalize())
    }

    /// Fail-fast consistency check: edges reference existing nodes and flow
    /// totals agree between nodes and edges. A violation is a bug.
    pub fn verify(&self) -> Result<(), AnalysisError> {
        let mut sent_sum = 0.0;
        let mut recv_sum = 0.0;
        let mut edge_sum = 0.0;

        for ((source, target), edge) in &self.edges {
            if !self.nodes.contains_key(source) || !self.nodes.contains_key(target) {
                return Err(AnalysisError::Internal(format!(
                    "edge {} -> {} references a missing account",
                    source, target
                )));
            }
            if edge.count != edge.timestamps.len() {
                return Err(AnalysisError::Internal(format!(
                    "edge {} -> {} count disagrees with its timestamp list",
                    source, target
                )));
            }
            edge_sum += edge.total_amount;
        }

        for node in self.nodes.values() {
            let sent: f64 = node.sent_tx.iter().map(|leg| leg.amount).sum();
            let recv: f64 = node.recv_tx.iter().map(|leg| leg.amount).sum();
            if (sent - node.total_sent).abs() > FLOW_EPSILON
                || (recv - node.total_received).abs() > FLOW_EPSILON
            {
                return Err(AnalysisError::Internal(format!(
                    "account {} totals disagree with its transfer legs",
                    node.account_id
                )));
            }
            sent_sum += node.total_sent;
            recv_sum += node.total_received;
        }

        let scale = sent_sum.abs().max(1.0);
        if (sent_sum - recv_sum).abs() > FLOW_EPSILON * scale
            || (sent_sum - edge_sum).abs() > FLOW_EPSILON * scale
        {
            return Err(AnalysisError::Internal(
                "flow conservation violated between nodes and edges".to_string(),
            ));
        }

        Ok(())
    }
}
