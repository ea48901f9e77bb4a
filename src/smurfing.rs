//! Smurfing detection: fan-in and fan-out bursts.
//!
//! Flags accounts that receive from (or send to) an unusual number of
//! distinct counterparties inside a sliding time window. A two-pointer sweep
//! over each account's timestamp-sorted legs keeps the scan linear.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::false_positive::coefficient_of_variation;
use crate::graph::{TransactionGraph, TransferLeg};
use crate::{clip01, DetectorOutput, Finding, PatternKind};

/// Distinct counterparties above the threshold at which the count factor
/// saturates.
const COUNT_SATURATION_SPREAD: f64 = 20.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmurfingConfig {
    /// Sliding window width in hours.
    pub window_hours: i64,
    /// Distinct counterparties required inside one window.
    pub min_counterparties: usize,
}

impl Default for SmurfingConfig {
    fn default() -> Self {
        Self {
            window_hours: 72,
            min_counterparties: 10,
        }
    }
}

pub struct SmurfingDetector {
    config: SmurfingConfig,
}

impl SmurfingDetector {
    pub fn new() -> Self {
        Self {
            config: SmurfingConfig::default(),
        }
    }

    pub fn with_config(config: SmurfingConfig) -> Self {
        Self { config }
    }

    /// Evaluate both variants for every account. At most one finding per
    /// account per variant: the window with the most distinct counterparties,
    /// earliest such window on ties.
    pub fn detect(&self, graph: &TransactionGraph) -> DetectorOutput {
        let mut findings = Vec::new();

        for (account_id, node) in graph.nodes() {
            if let Some(f) = self.scan(account_id, &node.recv_tx, PatternKind::SmurfingFanIn) {
                findings.push(f);
            }
            if let Some(f) = self.scan(account_id, &node.sent_tx, PatternKind::SmurfingFanOut) {
                findings.push(f);
            }
        }

        debug!(findings = findings.len(), "smurfing scan complete");
        DetectorOutput {
            findings,
            truncated: false,
        }
    }

    fn scan(&self, account_id: &str, legs: &[TransferLeg], kind: PatternKind) -> Option<Finding> {
        if legs.len() < self.config.min_counterparties {
            return None;
        }

        let window = Duration::hours(self.config.window_hours);
        let mut in_window: HashMap<&str, usize> = HashMap::new();
        let mut distinct = 0usize;
        let mut left = 0usize;
        // (distinct, left, right); replaced only on a strictly higher count,
        // so the earliest best window wins.
        let mut best: Option<(usize, usize, usize)> = None;

        for right in 0..legs.len() {
            let entry = in_window.entry(legs[right].counterparty.as_str()).or_insert(0);
            *entry += 1;
            if *entry == 1 {
                distinct += 1;
            }

            while legs[right].timestamp - legs[left].timestamp > window {
                let count = in_window
                    .get_mut(legs[left].counterparty.as_str())
                    .expect("window bookkeeping out of sync");
                *count -= 1;
                if *count == 0 {
                    in_window.remove(legs[left].counterparty.as_str());
                    distinct -= 1;
                }
                left += 1;
            }

            if distinct >= self.config.min_counterparties
                && best.map_or(true, |(d, _, _)| distinct > d)
            {
                best = Some((distinct, left, right));
            }
        }

        let (distinct, left, right) = best?;
        let in_best = &legs[left..=right];
        let amounts: Vec<f64> = in_best.iter().map(|leg| leg.amount).collect();
        let amount: f64 = amounts.iter().sum();
        let cv = coefficient_of_variation(&amounts).unwrap_or(0.0);

        let count_factor = ((distinct - self.config.min_counterparties) as f64
            / COUNT_SATURATION_SPREAD
            + 0.5)
            .min(1.0);
        let raw_score = clip01(0.5 * count_factor + 0.5 * (1.0 - cv.min(1.0)));

        Some(Finding {
            kind,
            accounts: vec![account_id.to_string()],
            amount,
            span: in_best[in_best.len() - 1].timestamp - in_best[0].timestamp,
            raw_score,
        })
    }
}

impl Default for SmurfingDetector {
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

    fn detect(batch: &[Transaction]) -> Vec<Finding> {
        let graph = TransactionGraph::build(batch).unwrap();
        SmurfingDetector::new().detect(&graph).findings
    }

    fn fanin_batch(senders: usize, spread_hours: i64) -> Vec<Transaction> {
        (0..senders)
            .map(|i| {
                tx(
                    &format!("T{}", i),
                    &format!("S{:02}", i),
                    "R",
                    950.0 + (i % 3) as f64 * 50.0,
                    i as i64 * spread_hours / senders.max(1) as i64,
                )
            })
            .collect()
    }

    #[test]
    fn test_fanin_burst_flagged() {
        let findings = detect(&fanin_batch(12, 48));
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.kind, PatternKind::SmurfingFanIn);
        assert_eq!(f.accounts, vec!["R"]);
        // 12 distinct senders: count factor 0.6, near-uniform amounts.
        assert!(f.raw_score > 0.7);
    }

    #[test]
    fn test_below_threshold_not_flagged() {
        assert!(detect(&fanin_batch(9, 48)).is_empty());
    }

    #[test]
    fn test_spread_beyond_window_not_flagged() {
        // 12 senders spaced 60 h apart: never 10 inside any 72 h window.
        let batch: Vec<Transaction> = (0..12)
            .map(|i| {
                tx(
                    &format!("T{}", i),
                    &format!("S{:02}", i),
                    "R",
                    1000.0,
                    i as i64 * 60,
                )
            })
            .collect();
        assert!(detect(&batch).is_empty());
    }

    #[test]
    fn test_fanout_burst_flagged() {
        let batch: Vec<Transaction> = (0..11)
            .map(|i| {
                tx(
                    &format!("T{}", i),
                    "S",
                    &format!("R{:02}", i),
                    1000.0,
                    i as i64,
                )
            })
            .collect();

        let findings = detect(&batch);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, PatternKind::SmurfingFanOut);
        assert_eq!(findings[0].accounts, vec!["S"]);
    }

    #[test]
    fn test_repeat_senders_count_once() {
        // 9 distinct senders, one of them three times: 9 < 10.
        let mut batch = fanin_batch(9, 24);
        batch.push(tx("X1", "S00", "R", 1000.0, 1));
        batch.push(tx("X2", "S00", "R", 1000.0, 2));
        assert!(detect(&batch).is_empty());
    }

    #[test]
    fn test_best_window_maximises_distinct_count() {
        // A 10-sender window early, a denser 14-sender window later.
        let mut batch = Vec::new();
        for i in 0..10 {
            batch.push(tx(
                &format!("A{}", i),
                &format!("EARLY{:02}", i),
                "R",
                1000.0,
                i as i64,
            ));
        }
        for i in 0..14 {
            batch.push(tx(
                &format!("B{}", i),
                &format!("LATE{:02}", i),
                "R",
                1000.0,
                500 + i as i64,
            ));
        }

        let findings = detect(&batch);
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        // Count factor for 14 senders: (14 - 10) / 20 + 0.5 = 0.7.
        assert!((f.raw_score - (0.5 * 0.7 + 0.5)).abs() < 1e-9);
        assert_eq!(f.amount, 14_000.0);
    }

    #[test]
    fn test_amount_dispersion_lowers_score() {
        let uniform = detect(&fanin_batch(12, 48));
        let mut scattered: Vec<Transaction> = (0..12)
            .map(|i| {
                tx(
                    &format!("T{}", i),
                    &format!("S{:02}", i),
                    "R",
                    100.0 + i as f64 * 700.0,
                    i as i64,
                )
            })
            .collect();
        scattered.rotate_left(3);

        let f_scatter = detect(&scattered);
        assert!(uniform[0].raw_score > f_scatter[0].raw_score);
    }
}
