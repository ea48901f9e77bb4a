//! Batch analysis example
//!
//! This example runs the full detection pipeline over a small synthetic batch
//! containing a laundering cycle, a fan-in smurfing burst, and a legitimate
//! merchant, then prints the resulting report.

use chrono::{Duration, TimeZone, Utc};
use rust_mule_detector::{MuleDetector, Transaction};

fn tx(id: &str, from: &str, to: &str, amount: f64, hours: i64) -> Transaction {
    Transaction {
        transaction_id: id.to_string(),
        sender_id: from.to_string(),
        receiver_id: to.to_string(),
        amount,
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hours),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== Money-Muling Network Detector ===\n");

    let mut batch = Vec::new();

    // A three-account laundering cycle turning money around in two hours.
    batch.push(tx("CYC-1", "ACCT-ALPHA", "ACCT-BRAVO", 12_000.0, 0));
    batch.push(tx("CYC-2", "ACCT-BRAVO", "ACCT-CHARLIE", 11_500.0, 1));
    batch.push(tx("CYC-3", "ACCT-CHARLIE", "ACCT-ALPHA", 11_000.0, 2));

    // Twelve structured deposits converging on one collector account.
    for i in 0..12 {
        batch.push(tx(
            &format!("SMURF-{}", i),
            &format!("DEPOSITOR-{:02}", i),
            "ACCT-COLLECTOR",
            950.0 + i as f64 * 8.0,
            24 + i * 3,
        ));
    }

    // A corner shop: sixty customers, three prices. Should be left alone.
    let prices = [9.99, 14.99, 19.99];
    for i in 0..60 {
        batch.push(tx(
            &format!("SHOP-{}", i),
            &format!("CUSTOMER-{:02}", i),
            "ACCT-SHOP",
            prices[i % 3],
            (i as i64) % 48,
        ));
    }

    let detector = MuleDetector::new();
    let report = detector.analyze(&batch)?;

    println!("1. Summary");
    println!(
        "   Accounts analyzed: {}",
        report.summary.total_accounts_analyzed
    );
    println!(
        "   Suspicious accounts: {}",
        report.summary.suspicious_accounts_flagged
    );
    println!(
        "   Fraud rings: {}",
        report.summary.fraud_rings_detected
    );
    println!(
        "   Processing time: {:.3}s\n",
        report.summary.processing_time_seconds
    );

    println!("2. Suspicious Accounts");
    for account in &report.suspicious_accounts {
        println!(
            "   {} score={} patterns={:?} ring={:?}",
            account.account_id,
            account.suspicion_score,
            account.detected_patterns,
            account.ring_id
        );
    }
    println!();

    println!("3. Fraud Rings");
    for ring in &report.fraud_rings {
        println!(
            "   {} [{}] risk={} members={:?}",
            ring.ring_id, ring.pattern_type, ring.risk_score, ring.member_accounts
        );
    }
    println!();

    println!("4. Full JSON Report");
    println!("{}", report.to_json()?);

    Ok(())
}
