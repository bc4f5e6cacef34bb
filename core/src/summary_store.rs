//! Agent summary store: holds the single most recent AI analysis.
//!
//! Lifecycle: created empty when the service starts, shared through the
//! service state, never persisted. A restart resets it to empty and readers
//! see "nothing yet", which is a normal state rather than an error.
//!
//! Writes replace the stored record wholesale (last write wins). Only the
//! structural shape is checked: the body must be a JSON object whose fields
//! have the expected types. Values are stored as submitted. A rejected
//! submission never touches the stored record because parsing finishes
//! before the write lock is taken.

use crate::{
    clock::{Clock, SystemClock},
    error::SubmissionError,
    types::{AgentAnalysis, AgentSummary},
};
use std::sync::{Arc, PoisonError, RwLock};

pub struct AgentSummaryStore {
    latest: RwLock<Option<AgentSummary>>,
    clock:  Arc<dyn Clock>,
}

impl AgentSummaryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { latest: RwLock::new(None), clock }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Parse a raw JSON body and store it.
    pub fn submit(&self, body: &[u8]) -> Result<AgentSummary, SubmissionError> {
        let analysis = parse_submission(body)?;
        Ok(self.submit_analysis(analysis))
    }

    /// Stamp with the current time and store.
    pub fn submit_analysis(&self, analysis: AgentAnalysis) -> AgentSummary {
        warn_on_unusual_values(&analysis);
        let record = AgentSummary {
            analysis,
            timestamp: self.clock.now(),
        };
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        log::info!(
            "agent summary stored for {} (tendency={:.2})",
            record.analysis.partner_id,
            record.analysis.churn_tendency
        );
        record
    }

    pub fn read(&self) -> Option<AgentSummary> {
        self.latest.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Forget the stored record, as a restart would.
    pub fn clear(&self) {
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Default for AgentSummaryStore {
    fn default() -> Self {
        Self::with_system_clock()
    }
}

fn parse_submission(body: &[u8]) -> Result<AgentAnalysis, SubmissionError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(SubmissionError::NotAnObject);
    }
    Ok(serde_json::from_value(value)?)
}

/// Logged only. The record is stored either way.
fn warn_on_unusual_values(analysis: &AgentAnalysis) {
    if analysis.partner_id.trim().is_empty() {
        log::warn!("agent summary stored with a blank partner_id");
    }
    if !(0.0..=1.0).contains(&analysis.churn_tendency) {
        log::warn!(
            "agent summary for {}: churn_tendency={} outside [0,1]",
            analysis.partner_id,
            analysis.churn_tendency
        );
    }
}
