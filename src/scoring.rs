//! Composite scoring, fraud-ring assembly, and report generation.
//!
//! Fuses the detector findings into per-account suspicion scores, applies the
//! false-positive veto, groups cycle and shell-chain findings into fraud
//! rings, and produces the final report together with a trimmed graph for
//! visualisation.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::false_positive::FpTag;
use crate::graph::TransactionGraph;
use crate::{Finding, PatternFamily, PatternKind};

/// Findings below this raw score do not contribute pattern tags.
const PATTERN_SCORE_FLOOR: f64 = 0.1;

/// Detector weights for the composite score. Points, not fractions: a family
/// score of 1.0 contributes its full weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub cycle: f64,
    pub smurfing: f64,
    pub shell: f64,
    pub velocity: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            cycle: 40.0,
            smurfing: 30.0,
            shell: 20.0,
            velocity: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    /// Accounts scoring below this are left out of the report.
    pub report_min_score: u8,
    /// Jaccard overlap above which two rings are merged.
    pub ring_merge_jaccard: f64,
    /// Node budget for the visualisation graph.
    pub viz_max_nodes: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            report_min_score: 10,
            ring_merge_jaccard: 0.5,
            viz_max_nodes: 300,
        }
    }
}

/// Per-account family maxima. Taking the maximum rather than the sum keeps
/// overlapping findings of one family from repeat-counting.
#[derive(Debug, Clone, Copy, Default)]
struct FamilyMax {
    cycle: f64,
    smurfing: f64,
    shell: f64,
}

impl FamilyMax {
    fn absorb(&mut self, family: PatternFamily, raw_score: f64) {
        let slot = match family {
            PatternFamily::Cycle => &mut self.cycle,
            PatternFamily::Smurfing => &mut self.smurfing,
            PatternFamily::Shell => &mut self.shell,
        };
        *slot = slot.max(raw_score.min(1.0));
    }
}

/// Ring under construction, before ids are assigned.
#[derive(Debug, Clone)]
struct RingDraft {
    members: BTreeSet<String>,
    pattern: PatternKind,
    risk_score: u8,
    emitted: usize,
}

pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new() -> Self {
        Self {
            config: ScoringConfig::default(),
        }
    }

    pub fn with_config(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Fuse findings and tags into the final report.
    ///
    /// `processing_time_seconds` is left at zero; the orchestrator stamps it.
    pub fn score(
        &self,
        graph: &TransactionGraph,
        mut findings: Vec<Finding>,
        fp_tags: &BTreeMap<String, BTreeSet<FpTag>>,
        warnings: Vec<String>,
        input_digest: String,
    ) -> AnalysisReport {
        // Total order over findings so parallel detector output cannot leak
        // nondeterminism into scores, ring numbering, or serialised output.
        findings.sort_by(|a, b| {
            a.kind
                .as_str()
                .cmp(b.kind.as_str())
                .then_with(|| {
                    b.raw_score
                        .partial_cmp(&a.raw_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.accounts.cmp(&b.accounts))
        });

        let mut family_scores: BTreeMap<&str, FamilyMax> = BTreeMap::new();
        let mut patterns: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for finding in &findings {
            for account in &finding.accounts {
                family_scores
                    .entry(account)
                    .or_default()
                    .absorb(finding.kind.family(), finding.raw_score);
                if finding.raw_score > PATTERN_SCORE_FLOOR {
                    patterns
                        .entry(account)
                        .or_default()
                        .insert(finding.kind.as_str().to_string());
                }
            }
        }

        let weights = &self.config.weights;
        let mut scores: BTreeMap<String, u8> = BTreeMap::new();
        for (account_id, node) in graph.nodes() {
            let family = family_scores.get(account_id.as_str()).copied().unwrap_or_default();
            let raw = family.cycle * weights.cycle
                + family.smurfing * weights.smurfing
                + family.shell * weights.shell
                + velocity_factor(node.participation_timestamps()) * weights.velocity;
            let score = raw.min(100.0).round() as u8;
            if score > 0 {
                scores.insert(account_id.clone(), score);
            }
        }

        // Veto and report threshold.
        let suspicious: BTreeMap<String, u8> = scores
            .into_iter()
            .filter(|(account, score)| {
                *score >= self.config.report_min_score && !fp_tags.contains_key(account)
            })
            .collect();

        let (fraud_rings, ring_of_account) = self.assemble_rings(&findings, &suspicious);

        let mut suspicious_accounts: Vec<SuspiciousAccount> = suspicious
            .iter()
            .map(|(account_id, score)| SuspiciousAccount {
                account_id: account_id.clone(),
                suspicion_score: *score,
                detected_patterns: patterns
                    .get(account_id.as_str())
                    .cloned()
                    .unwrap_or_default(),
                ring_id: ring_of_account.get(account_id).cloned(),
            })
            .collect();
        suspicious_accounts.sort_by(|a, b| {
            b.suspicion_score
                .cmp(&a.suspicion_score)
                .then_with(|| a.account_id.cmp(&b.account_id))
        });

        let graph_data = self.build_viz_graph(graph, &suspicious_accounts, &suspicious, &input_digest);

        debug!(
            suspicious = suspicious_accounts.len(),
            rings = fraud_rings.len(),
            "scoring complete"
        );

        AnalysisReport {
            summary: AnalysisSummary {
                total_accounts_analyzed: graph.account_count(),
                suspicious_accounts_flagged: suspicious_accounts.len(),
                fraud_rings_detected: fraud_rings.len(),
                processing_time_seconds: 0.0,
                transactions_accepted: graph.accepted_count(),
                transactions_discarded: graph.discarded_count(),
                warnings,
                input_digest,
            },
            suspicious_accounts,
            fraud_rings,
            graph_data,
        }
    }

    /// Group cycle and shell-chain findings into rings.
    ///
    /// Candidate rings overlapping above the Jaccard threshold merge into
    /// one, keeping the higher risk score and its pattern. Members are then
    /// restricted to reportable accounts, every account is assigned to the
    /// strongest ring that claims it, and rings left with fewer than two
    /// assigned members are dissolved, so ring membership and per-account
    /// `ring_id` always agree.
    fn assemble_rings(
        &self,
        findings: &[Finding],
        suspicious: &BTreeMap<String, u8>,
    ) -> (Vec<FraudRing>, BTreeMap<String, String>) {
        let mut drafts: Vec<RingDraft> = Vec::new();
        for finding in findings {
            if !matches!(finding.kind, PatternKind::Cycle | PatternKind::ShellChain) {
                continue;
            }
            let members: BTreeSet<String> = finding.accounts.iter().cloned().collect();
            let risk_score = (finding.raw_score * 100.0).round() as u8;

            match drafts
                .iter_mut()
                .find(|d| jaccard(&d.members, &members) > self.config.ring_merge_jaccard)
            {
                Some(draft) => {
                    draft.members.extend(members);
                    if risk_score > draft.risk_score {
                        draft.risk_score = risk_score;
                        draft.pattern = finding.kind;
                    }
                }
                None => {
                    let emitted = drafts.len();
                    drafts.push(RingDraft {
                        members,
                        pattern: finding.kind,
                        risk_score,
                        emitted,
                    });
                }
            }
        }

        for draft in &mut drafts {
            draft.members.retain(|m| suspicious.contains_key(m));
        }
        drafts.retain(|d| d.members.len() >= 2);

        // Assign each account to its strongest ring; dissolve rings that end
        // up with fewer than two claimed members and let their accounts fall
        // back to the next ring that contains them.
        let mut alive = vec![true; drafts.len()];
        let assignment = loop {
            let mut assignment: BTreeMap<String, usize> = BTreeMap::new();
            for (idx, draft) in drafts.iter().enumerate() {
                if !alive[idx] {
                    continue;
                }
                for member in &draft.members {
                    let better = match assignment.get(member) {
                        None => true,
                        Some(&current) => {
                            (draft.risk_score, std::cmp::Reverse(draft.emitted))
                                > (drafts[current].risk_score, std::cmp::Reverse(drafts[current].emitted))
                        }
                    };
                    if better {
                        assignment.insert(member.clone(), idx);
                    }
                }
            }

            let mut counts = vec![0usize; drafts.len()];
            for &idx in assignment.values() {
                counts[idx] += 1;
            }
            let mut dissolved = false;
            for (idx, count) in counts.iter().enumerate() {
                if alive[idx] && *count < 2 {
                    alive[idx] = false;
                    dissolved = true;
                }
            }
            if !dissolved {
                break assignment;
            }
        };

        let mut rings = Vec::new();
        let mut ring_of_account = BTreeMap::new();
        let mut surviving: Vec<usize> = (0..drafts.len()).filter(|&i| alive[i]).collect();
        surviving.sort_by_key(|&i| drafts[i].emitted);

        for (ordinal, &idx) in surviving.iter().enumerate() {
            let ring_id = format!("RING-{:04}", ordinal + 1);
            let member_accounts: Vec<String> = assignment
                .iter()
                .filter(|(_, &assigned)| assigned == idx)
                .map(|(account, _)| account.clone())
                .collect();
            for account in &member_accounts {
                ring_of_account.insert(account.clone(), ring_id.clone());
            }
            rings.push(FraudRing {
                ring_id,
                member_accounts,
                pattern_type: drafts[idx].pattern.as_str().to_string(),
                risk_score: drafts[idx].risk_score,
            });
        }

        (rings, ring_of_account)
    }

    /// Reduced graph for the front-end: suspicious accounts first, then their
    /// direct neighbours, then deterministic random padding up to the budget.
    fn build_viz_graph(
        &self,
        graph: &TransactionGraph,
        ranked: &[SuspiciousAccount],
        suspicious: &BTreeMap<String, u8>,
        input_digest: &str,
    ) -> VizGraph {
        let budget = self.config.viz_max_nodes;
        let mut order: Vec<&str> = Vec::new();
        let mut selected: BTreeSet<&str> = BTreeSet::new();

        for account in ranked {
            if order.len() >= budget {
                break;
            }
            let id = account.account_id.as_str();
            if selected.insert(id) {
                order.push(id);
            }
        }

        'neighbors: for account in ranked {
            let node = match graph.node(&account.account_id) {
                Some(node) => node,
                None => continue,
            };
            for neighbor in node.out_neighbors().iter().chain(node.in_neighbors()) {
                if order.len() >= budget {
                    break 'neighbors;
                }
                if selected.insert(neighbor.as_str()) {
                    order.push(neighbor.as_str());
                }
            }
        }

        if order.len() < budget {
            let pool: Vec<&str> = graph
                .nodes()
                .keys()
                .map(String::as_str)
                .filter(|id| !selected.contains(id))
                .collect();
            let mut rng = ChaCha8Rng::seed_from_u64(digest_seed(input_digest));
            for &id in pool.choose_multiple(&mut rng, budget - order.len()) {
                selected.insert(id);
                order.push(id);
            }
        }

        let nodes = order
            .iter()
            .map(|id| {
                let node = &graph.nodes()[*id];
                VizNode {
                    id: node.account_id.clone(),
                    total_sent: node.total_sent,
                    total_received: node.total_received,
                    suspicion_score: suspicious.get(*id).copied().unwrap_or(0),
                    is_suspicious: suspicious.contains_key(*id),
                }
            })
            .collect();

        let edges = graph
            .edges()
            .values()
            .filter(|e| selected.contains(e.source.as_str()) && selected.contains(e.target.as_str()))
            .map(|e| VizEdge {
                source: e.source.clone(),
                target: e.target.clone(),
                total_amount: e.total_amount,
                count: e.count,
            })
            .collect();

        VizGraph { nodes, edges }
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Velocity abnormality from an account's merged participation timestamps.
fn velocity_factor(timestamps: Vec<chrono::DateTime<chrono::Utc>>) -> f64 {
    if timestamps.len() < 2 {
        return 0.0;
    }
    let first = timestamps[0];
    let last = timestamps[timestamps.len() - 1];
    let mean_gap_secs =
        (last - first).num_seconds() as f64 / (timestamps.len() - 1) as f64;

    if mean_gap_secs < 60.0 {
        1.0
    } else if mean_gap_secs < 3_600.0 {
        0.7
    } else if mean_gap_secs < 86_400.0 {
        0.3
    } else {
        0.0
    }
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// First eight digest bytes as the sampling seed.
fn digest_seed(digest: &str) -> u64 {
    hex::decode(digest)
        .ok()
        .and_then(|bytes| bytes.get(..8).map(|b| {
            u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        }))
        .unwrap_or(0)
}

// Result types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousAccount {
    pub account_id: String,
    pub suspicion_score: u8,
    pub detected_patterns: BTreeSet<String>,
    pub ring_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudRing {
    pub ring_id: String,
    pub member_accounts: Vec<String>,
    pub pattern_type: String,
    pub risk_score: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_accounts_analyzed: usize,
    pub suspicious_accounts_flagged: usize,
    pub fraud_rings_detected: usize,
    pub processing_time_seconds: f64,
    pub transactions_accepted: usize,
    pub transactions_discarded: usize,
    pub warnings: Vec<String>,
    pub input_digest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizNode {
    pub id: String,
    pub total_sent: f64,
    pub total_received: f64,
    pub suspicion_score: u8,
    pub is_suspicious: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizEdge {
    pub source: String,
    pub target: String,
    pub total_amount: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizGraph {
    pub nodes: Vec<VizNode>,
    pub edges: Vec<VizEdge>,
}

/// Final analysis document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub suspicious_accounts: Vec<SuspiciousAccount>,
    pub fraud_rings: Vec<FraudRing>,
    pub summary: AnalysisSummary,
    pub graph_data: VizGraph,
}

impl AnalysisReport {
    /// Export as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TransactionGraph;
    use crate::Transaction;
    use chrono::{Duration, TimeZone, Utc};

    fn tx(id: &str, from: &str, to: &str, amount: f64, seconds: i64) -> Transaction {
        Transaction {
            transaction_id: id.to_string(),
            sender_id: from.to_string(),
            receiver_id: to.to_string(),
            amount,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
                + Duration::seconds(seconds),
        }
    }

    fn finding(kind: PatternKind, accounts: &[&str], raw_score: f64) -> Finding {
        Finding {
            kind,
            accounts: accounts.iter().map(|a| a.to_string()).collect(),
            amount: 10_000.0,
            span: Duration::hours(1),
            raw_score,
        }
    }

    fn simple_graph() -> TransactionGraph {
        TransactionGraph::build(&[
            tx("T1", "A", "B", 1000.0, 0),
            tx("T2", "B", "C", 1000.0, 3600),
            tx("T3", "C", "D", 1000.0, 7200),
        ])
        .unwrap()
    }

    fn score(
        graph: &TransactionGraph,
        findings: Vec<Finding>,
        fp_tags: BTreeMap<String, BTreeSet<FpTag>>,
    ) -> AnalysisReport {
        Scorer::new().score(graph, findings, &fp_tags, Vec::new(), "ab".repeat(32))
    }

    #[test]
    fn test_family_max_not_sum() {
        let graph = simple_graph();
        let findings = vec![
            finding(PatternKind::Cycle, &["A", "B"], 0.5),
            finding(PatternKind::Cycle, &["A", "B"], 0.8),
        ];

        let report = score(&graph, findings, BTreeMap::new());
        let a = report
            .suspicious_accounts
            .iter()
            .find(|s| s.account_id == "A")
            .unwrap();
        // max(0.5, 0.8) * 40 + velocity(one tx) * 10 = 32.
        assert_eq!(a.suspicion_score, 32);
    }

    #[test]
    fn test_composite_weights_and_cap() {
        let graph = simple_graph();
        let findings = vec![
            finding(PatternKind::Cycle, &["B"], 1.0),
            finding(PatternKind::SmurfingFanIn, &["B"], 1.0),
            finding(PatternKind::ShellChain, &["B"], 1.0),
        ];

        let report = score(&graph, findings, BTreeMap::new());
        let b = report
            .suspicious_accounts
            .iter()
            .find(|s| s.account_id == "B")
            .unwrap();
        // 40 + 30 + 20 + velocity 0.3 * 10 = 93.
        assert_eq!(b.suspicion_score, 93);
        assert_eq!(
            b.detected_patterns,
            ["cycle", "smurfing_fanin", "shell_chain"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        );
    }

    #[test]
    fn test_fp_veto_removes_account() {
        let graph = simple_graph();
        let findings = vec![finding(PatternKind::SmurfingFanIn, &["B", "C"], 0.9)];
        let mut fp_tags = BTreeMap::new();
        fp_tags.insert(
            "B".to_string(),
            [FpTag::SalaryRecipient].into_iter().collect(),
        );

        let report = score(&graph, findings, fp_tags);
        assert!(report
            .suspicious_accounts
            .iter()
            .all(|s| s.account_id != "B"));
        assert!(report
            .suspicious_accounts
            .iter()
            .any(|s| s.account_id == "C"));
        // Vetoed accounts still appear in the visualisation graph.
        assert!(report.graph_data.nodes.iter().any(|n| n.id == "B" && !n.is_suspicious));
    }

    #[test]
    fn test_report_threshold_drops_low_scores() {
        let graph = simple_graph();
        // 0.2 * 40 = 8, below the default threshold of 10 even with velocity.
        let findings = vec![finding(PatternKind::Cycle, &["A"], 0.2)];
        let report = score(&graph, findings, BTreeMap::new());
        assert!(report.suspicious_accounts.is_empty());
        assert!(report.fraud_rings.is_empty());
    }

    #[test]
    fn test_low_raw_score_contributes_no_pattern_tag() {
        let graph = simple_graph();
        let findings = vec![
            finding(PatternKind::Cycle, &["A"], 0.6),
            finding(PatternKind::SmurfingFanIn, &["A"], 0.05),
        ];

        let report = score(&graph, findings, BTreeMap::new());
        let a = report
            .suspicious_accounts
            .iter()
            .find(|s| s.account_id == "A")
            .unwrap();
        assert!(a.detected_patterns.contains("cycle"));
        assert!(!a.detected_patterns.contains("smurfing_fanin"));
    }

    #[test]
    fn test_overlapping_rings_merge() {
        let graph = simple_graph();
        let findings = vec![
            finding(PatternKind::Cycle, &["A", "B", "C"], 0.9),
            finding(PatternKind::ShellChain, &["A", "B", "C", "D"], 0.8),
        ];

        let report = score(&graph, findings, BTreeMap::new());
        assert_eq!(report.fraud_rings.len(), 1);
        let ring = &report.fraud_rings[0];
        assert_eq!(ring.ring_id, "RING-0001");
        assert_eq!(ring.pattern_type, "cycle");
        assert_eq!(ring.risk_score, 90);
        assert_eq!(ring.member_accounts, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_disjoint_rings_keep_separate_ids() {
        let graph = TransactionGraph::build(&[
            tx("T1", "A", "B", 1000.0, 0),
            tx("T2", "C", "D", 1000.0, 60),
            tx("T3", "E", "F", 1000.0, 120),
        ])
        .unwrap();
        let findings = vec![
            finding(PatternKind::Cycle, &["A", "B"], 0.9),
            finding(PatternKind::Cycle, &["C", "D"], 0.7),
        ];

        let report = score(&graph, findings, BTreeMap::new());
        assert_eq!(report.fraud_rings.len(), 2);
        assert_eq!(report.fraud_rings[0].ring_id, "RING-0001");
        assert_eq!(report.fraud_rings[1].ring_id, "RING-0002");
        assert!(report.fraud_rings[0].risk_score >= report.fraud_rings[1].risk_score);
    }

    #[test]
    fn test_ring_membership_matches_account_ring_ids() {
        let graph = simple_graph();
        let findings = vec![
            finding(PatternKind::Cycle, &["A", "B"], 0.9),
            finding(PatternKind::Cycle, &["B", "C"], 0.4),
        ];

        let report = score(&graph, findings, BTreeMap::new());
        for ring in &report.fraud_rings {
            assert!(ring.member_accounts.len() >= 2);
            for member in &ring.member_accounts {
                let account = report
                    .suspicious_accounts
                    .iter()
                    .find(|s| &s.account_id == member)
                    .expect("ring member must be reported");
                assert_eq!(account.ring_id.as_ref(), Some(&ring.ring_id));
            }
        }
    }

    #[test]
    fn test_ring_pruned_when_members_vetoed() {
        let graph = simple_graph();
        let findings = vec![finding(PatternKind::Cycle, &["A", "B", "C"], 0.9)];
        let mut fp_tags = BTreeMap::new();
        fp_tags.insert("A".to_string(), [FpTag::Merchant].into_iter().collect());
        fp_tags.insert("B".to_string(), [FpTag::Merchant].into_iter().collect());

        let report = score(&graph, findings, fp_tags);
        // Only C is reportable; a one-account ring is dissolved.
        assert!(report.fraud_rings.is_empty());
        let c = report
            .suspicious_accounts
            .iter()
            .find(|s| s.account_id == "C")
            .unwrap();
        assert_eq!(c.ring_id, None);
    }

    #[test]
    fn test_velocity_tiers() {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mk = |gaps: &[i64]| {
            let mut ts = vec![base];
            for &g in gaps {
                ts.push(*ts.last().unwrap() + Duration::seconds(g));
            }
            ts
        };

        assert_eq!(velocity_factor(vec![base]), 0.0);
        assert_eq!(velocity_factor(mk(&[10, 10])), 1.0);
        assert_eq!(velocity_factor(mk(&[600, 600])), 0.7);
        assert_eq!(velocity_factor(mk(&[40_000, 40_000])), 0.3);
        assert_eq!(velocity_factor(mk(&[200_000])), 0.0);
    }

    #[test]
    fn test_viz_graph_budget_and_membership() {
        let batch: Vec<Transaction> = (0..40)
            .map(|i| {
                tx(
                    &format!("T{}", i),
                    &format!("S{:02}", i),
                    "HUB",
                    1000.0,
                    i * 60,
                )
            })
            .collect();
        let graph = TransactionGraph::build(&batch).unwrap();
        let findings = vec![finding(PatternKind::SmurfingFanIn, &["HUB"], 0.9)];

        let scorer = Scorer::with_config(ScoringConfig {
            viz_max_nodes: 10,
            ..Default::default()
        });
        let report = scorer.score(&graph, findings, &BTreeMap::new(), Vec::new(), "cd".repeat(32));

        assert_eq!(report.graph_data.nodes.len(), 10);
        assert!(report.graph_data.nodes.iter().any(|n| n.id == "HUB" && n.is_suspicious));
        let ids: BTreeSet<&str> = report.graph_data.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &report.graph_data.edges {
            assert!(ids.contains(edge.source.as_str()));
            assert!(ids.contains(edge.target.as_str()));
        }
    }

    #[test]
    fn test_viz_padding_is_deterministic() {
        let batch: Vec<Transaction> = (0..50)
            .map(|i| {
                tx(
                    &format!("T{}", i),
                    &format!("S{:02}", i),
                    &format!("R{:02}", i % 7),
                    1000.0,
                    i * 7200,
                )
            })
            .collect();
        let graph = TransactionGraph::build(&batch).unwrap();
        let digest = graph.digest();

        let scorer = Scorer::with_config(ScoringConfig {
            viz_max_nodes: 20,
            ..Default::default()
        });
        let r1 = scorer.score(&graph, Vec::new(), &BTreeMap::new(), Vec::new(), digest.clone());
        let r2 = scorer.score(&graph, Vec::new(), &BTreeMap::new(), Vec::new(), digest);

        let ids1: Vec<&str> = r1.graph_data.nodes.iter().map(|n| n.id.as_str()).collect();
        let ids2: Vec<&str> = r2.graph_data.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids1, ids2);
        assert_eq!(ids1.len(), 20);
    }

    #[test]
    fn test_report_ranked_by_score() {
        let graph = simple_graph();
        let findings = vec![
            finding(PatternKind::Cycle, &["A", "B"], 0.9),
            finding(PatternKind::ShellChain, &["C", "D"], 0.9),
        ];

        let report = score(&graph, findings, BTreeMap::new());
        let scores: Vec<u8> = report
            .suspicious_accounts
            .iter()
            .map(|s| s.suspicion_score)
            .collect();
        let mut sorted = scores.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(scores, sorted);
    }

    #[test]
    fn test_json_export_shape() {
        let graph = simple_graph();
        let findings = vec![finding(PatternKind::Cycle, &["A", "B"], 0.9)];
        let report = score(&graph, findings, BTreeMap::new());

        let json = report.to_json().unwrap();
        assert!(json.contains("suspicious_accounts"));
        assert!(json.contains("fraud_rings"));
        assert!(json.contains("graph_data"));
        assert!(json.contains("total_accounts_analyzed"));
    }
}
