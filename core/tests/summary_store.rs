//! Integration tests for the agent summary store.
//!
//! Tests verify:
//! 1. A valid submission is readable back with the store's timestamp
//! 2. Rejected submissions leave the previous record untouched
//! 3. Last write wins, including under concurrent writers
//! 4. Open-ended metrics survive the round trip

use chrono::{DateTime, TimeZone, Utc};
use churnwatch_core::{
    clock::ManualClock,
    error::SubmissionError,
    summary_store::AgentSummaryStore,
    types::AgentAnalysis,
};
use serde_json::json;
use std::sync::Arc;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
}

fn store_with_clock() -> (AgentSummaryStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    (AgentSummaryStore::new(clock.clone()), clock)
}

fn body(partner_id: &str, tendency: f64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "partner_id": partner_id,
        "churn_tendency": tendency,
        "summary": format!("{partner_id} is drifting"),
        "reason_codes": ["LOGIN_DROP", "DEPOSIT_DECLINE"],
        "recommended_action": "Offer retention bonus",
    }))
    .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Round trip
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn empty_store_reads_nothing() {
    let (store, _) = store_with_clock();
    assert!(store.read().is_none());
}

#[test]
fn submission_is_stamped_with_store_clock() {
    let (store, _) = store_with_clock();

    let stored = store.submit(&body("P11972", 0.91)).unwrap();
    let read = store.read().expect("record stored");

    assert_eq!(stored, read);
    assert_eq!(read.partner_id(), "P11972");
    assert_eq!(read.analysis.churn_tendency, 0.91);
    assert_eq!(read.analysis.reason_codes, ["LOGIN_DROP", "DEPOSIT_DECLINE"]);
    assert_eq!(read.analysis.recommended_action.as_deref(), Some("Offer retention bonus"));
    assert_eq!(read.timestamp, start_time());
}

#[test]
fn caller_supplied_timestamp_is_ignored() {
    let (store, _) = store_with_clock();
    let raw = br#"{"partner_id":"P1","churn_tendency":0.2,"timestamp":"1999-01-01T00:00:00Z"}"#;

    let stored = store.submit(raw).unwrap();

    assert_eq!(stored.timestamp, start_time());
}

#[test]
fn metrics_survive_round_trip_and_serialize_flat() {
    let (store, _) = store_with_clock();
    let raw = serde_json::to_vec(&json!({
        "partner_id": "P55102",
        "churn_tendency": 0.82,
        "metrics": { "login_trend_30d": -60, "deposit_gap_days": 14, "segments": ["vip", "mena"] },
    }))
    .unwrap();

    store.submit(&raw).unwrap();
    let read = store.read().unwrap();

    assert_eq!(read.analysis.metrics["login_trend_30d"], json!(-60));
    assert_eq!(read.analysis.metrics["segments"], json!(["vip", "mena"]));

    let wire = serde_json::to_value(&read).unwrap();
    assert_eq!(wire["partner_id"], "P55102");
    assert_eq!(wire["timestamp"], "2024-03-09T14:05:00Z");
    assert_eq!(wire["metrics"]["deposit_gap_days"], 14);
}

// ─────────────────────────────────────────────────────────────────────────────
// Rejections
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn rejected_submissions_keep_previous_record() {
    let (store, clock) = store_with_clock();
    store.submit(&body("P11972", 0.91)).unwrap();
    let before = store.read().unwrap();
    clock.advance(chrono::Duration::minutes(5));

    let bad_bodies: [&[u8]; 7] = [
        b"not json at all",
        b"",
        b"[1,2,3]",
        b"\"just a string\"",
        br#"{"churn_tendency":0.5}"#,
        br#"{"partner_id":42,"churn_tendency":0.5}"#,
        br#"{"partner_id":"P2","churn_tendency":"high"}"#,
    ];
    for raw in bad_bodies {
        assert!(
            store.submit(raw).is_err(),
            "body {:?} must be rejected",
            String::from_utf8_lossy(raw)
        );
        assert_eq!(store.read().as_ref(), Some(&before), "previous record must survive");
    }
}

#[test]
fn rejection_reasons_are_specific() {
    let (store, _) = store_with_clock();

    assert!(matches!(store.submit(b"{oops"), Err(SubmissionError::Malformed(_))));
    assert!(matches!(store.submit(b"[]"), Err(SubmissionError::NotAnObject)));
    assert!(matches!(
        store.submit(br#"{"partner_id":"P1","churn_tendency":"0.4"}"#),
        Err(SubmissionError::Malformed(_))
    ));
    assert!(matches!(
        store.submit(br#"{"partner_id":"P1","churn_tendency":0.4,"reason_codes":"LOGIN_DROP"}"#),
        Err(SubmissionError::Malformed(_))
    ));
}

/// Only the shape is checked; unusual values are stored as submitted.
#[test]
fn well_shaped_submissions_are_stored_whatever_their_values() {
    let (store, _) = store_with_clock();

    let stored = store
        .submit(br#"{"partner_id":"P1","churn_tendency":1.2,"summary":"x"}"#)
        .expect("structurally valid");
    assert_eq!(stored.analysis.churn_tendency, 1.2);
    assert_eq!(store.read().unwrap().analysis.summary, "x");

    store.submit(br#"{"partner_id":"","churn_tendency":-0.3}"#).expect("structurally valid");
    let read = store.read().unwrap();
    assert_eq!(read.partner_id(), "");
    assert_eq!(read.analysis.churn_tendency, -0.3);
}

#[test]
fn analysis_api_stores_without_parsing() {
    let (store, _) = store_with_clock();
    let analysis = AgentAnalysis {
        partner_id:     "P1".into(),
        churn_tendency: 0.35,
        ..AgentAnalysis::default()
    };

    let stored = store.submit_analysis(analysis.clone());

    assert_eq!(stored.analysis, analysis);
    assert_eq!(store.read(), Some(stored));
}

// ─────────────────────────────────────────────────────────────────────────────
// Replacement
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn last_write_wins() {
    let (store, clock) = store_with_clock();

    store.submit(&body("P11972", 0.91)).unwrap();
    let later = clock.advance(chrono::Duration::seconds(30));
    store.submit(&body("P88231", 0.78)).unwrap();

    let read = store.read().unwrap();
    assert_eq!(read.partner_id(), "P88231");
    assert_eq!(read.timestamp, later);
}

#[test]
fn clear_returns_to_empty() {
    let (store, _) = store_with_clock();
    store.submit(&body("P11972", 0.91)).unwrap();

    store.clear();

    assert!(store.read().is_none());
}

#[test]
fn concurrent_writers_leave_exactly_one_complete_record() {
    let (store, _) = store_with_clock();
    let ids: Vec<String> = (0..16).map(|i| format!("P{i:05}")).collect();

    std::thread::scope(|s| {
        for id in &ids {
            let store = &store;
            s.spawn(move || store.submit(&body(id, 0.5)).unwrap());
        }
    });

    let read = store.read().expect("one write survives");
    assert!(ids.iter().any(|id| id == read.partner_id()));
    assert_eq!(read.analysis.summary, format!("{} is drifting", read.partner_id()));
}
