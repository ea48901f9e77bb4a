//! # Rust Mule Detector
//!
//! A memory-safe money-muling network detector for financial transaction data.
//!
//! ## Features
//!
//! - **Graph Analysis**: Directed multigraph over accounts with aggregated
//!   edges and per-account transfer histories
//! - **Pattern Detection**: Cycle, smurfing (fan-in/fan-out), and shell-chain
//!   detectors running in parallel over an immutable graph
//! - **False-Positive Suppression**: Salary, merchant, and payroll-hub
//!   classification vetoes benign accounts before reporting
//! - **Composite Scoring**: Weighted fusion of detector signals into 0-100
//!   suspicion scores with fraud-ring assignment
//! - **Deterministic Output**: Identical input yields identical reports,
//!   including the trimmed visualisation graph
//!
//! ## Usage
//!
//! ```no_run
//! use rust_mule_detector::{MuleDetector, Transaction};
//!
//! let transactions: Vec<Transaction> = Vec::new(); // from the ingest layer
//! let detector = MuleDetector::new();
//! let report = detector.analyze(&transactions)?;
//! println!("{}", report.to_json()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cycle;
pub mod false_positive;
pub mod graph;
pub mod scoring;
pub mod shell_chain;
pub mod smurfing;

pub use cycle::{CycleConfig, CycleDetector};
pub use false_positive::{FalsePositiveClassifier, FalsePositiveThresholds, FpTag};
pub use graph::{AccountEdge, AccountNode, TransactionGraph, TransferLeg};
pub use scoring::{
    AnalysisReport, AnalysisSummary, FraudRing, ScoreWeights, Scorer, ScoringConfig,
    SuspiciousAccount, VizEdge, VizGraph, VizNode,
};
pub use shell_chain::{ShellChainConfig, ShellChainDetector};
pub use smurfing::{SmurfingConfig, SmurfingDetector};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Analysis errors surfaced to the caller.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Stable error category for transport layers.
    pub fn category(&self) -> &'static str {
        match self {
            AnalysisError::InvalidInput(_) => "invalid_input",
            AnalysisError::EmptyInput(_) => "empty_input",
            AnalysisError::Internal(_) => "internal_error",
        }
    }
}

/// Normalised transaction record consumed by the graph builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// Suspicious pattern kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PatternKind {
    Cycle,
    SmurfingFanIn,
    SmurfingFanOut,
    ShellChain,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Cycle => "cycle",
            PatternKind::SmurfingFanIn => "smurfing_fanin",
            PatternKind::SmurfingFanOut => "smurfing_fanout",
            PatternKind::ShellChain => "shell_chain",
        }
    }

    pub fn family(&self) -> PatternFamily {
        match self {
            PatternKind::Cycle => PatternFamily::Cycle,
            PatternKind::SmurfingFanIn | PatternKind::SmurfingFanOut => PatternFamily::Smurfing,
            PatternKind::ShellChain => PatternFamily::Shell,
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pattern family used for score aggregation; both smurfing variants share
/// one weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternFamily {
    Cycle,
    Smurfing,
    Shell,
}

/// One detected occurrence of a suspicious pattern.
#[derive(Debug, Clone)]
pub struct Finding {
    pub kind: PatternKind,
    /// Accounts implicated, in pattern order.
    pub accounts: Vec<String>,
    pub amount: f64,
    pub span: Duration,
    /// Normalised severity in [0, 1].
    pub raw_score: f64,
}

/// Findings from one detector plus a saturation flag.
#[derive(Debug, Clone)]
pub struct DetectorOutput {
    pub findings: Vec<Finding>,
    /// True when the detector hit its enumeration cap.
    pub truncated: bool,
}

pub(crate) fn clip01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Aggregated configuration for one analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub cycle: CycleConfig,
    pub smurfing: SmurfingConfig,
    pub shell: ShellChainConfig,
    pub false_positive: FalsePositiveThresholds,
    pub scoring: ScoringConfig,
}

/// Batch money-muling analyzer.
///
/// One invocation builds the graph, classifies benign accounts, runs the
/// three pattern detectors in parallel, and fuses everything into a report.
/// Nothing is retained between invocations.
pub struct MuleDetector {
    config: DetectionConfig,
}

impl MuleDetector {
    /// Create a detector with default configuration.
    pub fn new() -> Self {
        Self {
            config: DetectionConfig::default(),
        }
    }

    /// Create a detector with custom configuration.
    pub fn with_config(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Run the full pipeline over a batch of transactions.
    pub fn analyze(&self, transactions: &[Transaction]) -> Result<AnalysisReport, AnalysisError> {
        let started = Instant::now();

        let graph = TransactionGraph::build(transactions)?;
        graph.verify()?;
        debug!(
            accounts = graph.account_count(),
            edges = graph.edges().len(),
            accepted = graph.accepted_count(),
            discarded = graph.discarded_count(),
            "transaction graph built"
        );

        let classifier =
            FalsePositiveClassifier::with_thresholds(self.config.false_positive.clone());
        let fp_tags = classifier.classify(&graph);

        let cycle_detector = CycleDetector::with_config(self.config.cycle.clone());
        let smurfing_detector = SmurfingDetector::with_config(self.config.smurfing.clone());
        let shell_detector = ShellChainDetector::with_config(self.config.shell.clone());

        let (cycles, (smurfs, shells)) = rayon::join(
            || cycle_detector.detect(&graph),
            || {
                rayon::join(
                    || smurfing_detector.detect(&graph),
                    || shell_detector.detect(&graph),
                )
            },
        );

        let mut warnings = Vec::new();
        if cycles.truncated {
            warnings.push(format!(
                "cycle enumeration capped at {} cycles; further cycles were not scored",
                self.config.cycle.max_cycles
            ));
        }
        if shells.truncated {
            warnings.push(format!(
                "shell-chain enumeration capped at {} chains; further chains were not scored",
                self.config.shell.max_chains
            ));
        }

        let mut findings = cycles.findings;
        findings.extend(smurfs.findings);
        findings.extend(shells.findings);

        let scorer = Scorer::with_config(self.config.scoring.clone());
        let mut report = scorer.score(&graph, findings, &fp_tags, warnings, graph.digest());
        report.summary.processing_time_seconds = started.elapsed().as_secs_f64();

        info!(
            accounts = report.summary.total_accounts_analyzed,
            suspicious = report.summary.suspicious_accounts_flagged,
            rings = report.summary.fraud_rings_detected,
            "analysis complete"
        );
        Ok(report)
    }
}

impl Default for MuleDetector {
    fn default() -> Self {
        Self::new()
    }
}
