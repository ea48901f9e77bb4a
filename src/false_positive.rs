//! Benign-behaviour classification.
//!
//! Tags accounts whose transfer history matches a known legitimate pattern
//! (salary recipient, merchant, payroll hub). Tags act as veto flags during
//! scoring: a tagged account never reaches the suspicious-accounts report.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::graph::{AccountNode, TransactionGraph, TransferLeg};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Benign-pattern tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FpTag {
    SalaryRecipient,
    Merchant,
    PayrollHub,
}

impl FpTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FpTag::SalaryRecipient => "salary_recipient",
            FpTag::Merchant => "merchant",
            FpTag::PayrollHub => "payroll_hub",
        }
    }
}

/// Classification thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FalsePositiveThresholds {
    /// Minimum payments from a single counterparty for the salary test.
    pub salary_min_payments: usize,
    /// Maximum CV of amounts from that counterparty.
    pub salary_max_amount_cv: f64,
    /// Accepted payday interval, in days.
    pub salary_gap_min_days: f64,
    pub salary_gap_max_days: f64,
    /// Share of gaps that must fall inside the interval.
    pub salary_min_gap_share: f64,
    /// Minimum distinct payers for the merchant test.
    pub merchant_min_in_degree: usize,
    /// Maximum Shannon entropy (bits) of received amounts, binned to the
    /// nearest whole currency unit. A real merchant's price list is narrow.
    pub merchant_max_entropy_bits: f64,
    /// Minimum distinct payees for the payroll-hub test.
    pub payroll_min_out_degree: usize,
    /// Maximum CV of sent amounts.
    pub payroll_max_amount_cv: f64,
}

impl Default for FalsePositiveThresholds {
    fn default() -> Self {
        Self {
            salary_min_payments: 3,
            salary_max_amount_cv: 0.05,
            salary_gap_min_days: 25.0,
            salary_gap_max_days: 35.0,
            salary_min_gap_share: 0.7,
            merchant_min_in_degree: 50,
            merchant_max_entropy_bits: 2.5,
            payroll_min_out_degree: 20,
            payroll_max_amount_cv: 0.15,
        }
    }
}

/// Read-only classifier over the transaction graph.
pub struct FalsePositiveClassifier {
    thresholds: FalsePositiveThresholds,
}

impl FalsePositiveClassifier {
    pub fn new() -> Self {
        Self {
            thresholds: FalsePositiveThresholds::default(),
        }
    }

    pub fn with_thresholds(thresholds: FalsePositiveThresholds) -> Self {
        Self { thresholds }
    }

    /// Compute tags for every account in the graph.
    pub fn classify(&self, graph: &TransactionGraph) -> BTreeMap<String, BTreeSet<FpTag>> {
        let mut tags: BTreeMap<String, BTreeSet<FpTag>> = BTreeMap::new();

        for (account_id, node) in graph.nodes() {
            let mut account_tags = BTreeSet::new();
            if self.is_salary_recipient(node) {
                account_tags.insert(FpTag::SalaryRecipient);
            }
            if self.is_merchant(node) {
                account_tags.insert(FpTag::Merchant);
            }
            if self.is_payroll_hub(node) {
                account_tags.insert(FpTag::PayrollHub);
            }
            if !account_tags.is_empty() {
                tags.insert(account_id.clone(), account_tags);
            }
        }

        debug!(tagged = tags.len(), "false-positive classification complete");
        tags
    }

    /// An account is a salary recipient when any single counterparty pays it
    /// on a regular cadence: enough payments, near-constant amounts, and most
    /// gaps landing on a payday interval. Evaluated per counterparty so an
    /// unrelated burst of inbound transfers cannot mask a genuine salary.
    fn is_salary_recipient(&self, node: &AccountNode) -> bool {
        let t = &self.thresholds;
        let mut by_sender: HashMap<&str, Vec<&TransferLeg>> = HashMap::new();
        for leg in &node.recv_tx {
            by_sender.entry(leg.counterparty.as_str()).or_default().push(leg);
        }

        by_sender.values().any(|legs| {
            if legs.len() < t.salary_min_payments {
                return false;
            }
            let amounts: Vec<f64> = legs.iter().map(|leg| leg.amount).collect();
            match coefficient_of_variation(&amounts) {
                Some(cv) if cv <= t.salary_max_amount_cv => {}
                _ => return false,
            }
            let gaps: Vec<f64> = legs
                .windows(2)
                .map(|w| {
                    (w[1].timestamp - w[0].timestamp).num_seconds() as f64 / SECONDS_PER_DAY
                })
                .collect();
            if gaps.is_empty() {
                return false;
            }
            let regular = gaps
                .iter()
                .filter(|g| (t.salary_gap_min_days..=t.salary_gap_max_days).contains(*g))
                .count();
            regular as f64 / gaps.len() as f64 >= t.salary_min_gap_share
        })
    }

    fn is_merchant(&self, node: &AccountNode) -> bool {
        let t = &self.thresholds;
        node.in_degree() >= t.merchant_min_in_degree
            && shannon_entropy_bits(node.recv_tx.iter().map(|leg| leg.amount))
                < t.merchant_max_entropy_bits
    }

    fn is_payroll_hub(&self, node: &AccountNode) -> bool {
        let t = &self.thresholds;
        if node.out_degree() < t.payroll_min_out_degree {
            return false;
        }
        let amounts: Vec<f64> = node.sent_tx.iter().map(|leg| leg.amount).collect();
        matches!(coefficient_of_variation(&amounts), Some(cv) if cv < t.payroll_max_amount_cv)
    }
}

impl Default for FalsePositiveClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Population standard deviation over mean. `None` when the mean is not
/// strictly positive or the sample is empty.
pub(crate) fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean <= 0.0 {
        return None;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt() / mean)
}

/// Shannon entropy of amounts binned to the nearest whole currency unit.
fn shannon_entropy_bits(amounts: impl Iterator<Item = f64>) -> f64 {
    let mut bins: HashMap<i64, usize> = HashMap::new();
    let mut total = 0usize;
    for amount in amounts {
        *bins.entry(amount.round() as i64).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    bins.values()
        .map(|&count| {
            let p = count as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}
