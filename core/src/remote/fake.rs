use super::{RemoteIntervention, RemotePartner, RemoteSource, RemoteStats, RemoteSummary};
use crate::{error::RemoteError, types::TriggerReceipt};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-process `RemoteSource` for tests and offline runs.
///
/// Starts healthy and empty. `set_down(true)` makes every call fail with a
/// transport-style error; `fail_with_status` makes every call fail with that
/// HTTP status instead.
#[derive(Debug, Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
    calls: AtomicU64,
}

#[derive(Debug, Default)]
struct FakeState {
    down:          bool,
    fail_status:   Option<u16>,
    stats:         RemoteStats,
    partners:      Vec<RemotePartner>,
    summaries:     HashMap<String, RemoteSummary>,
    interventions: Vec<RemoteIntervention>,
    triggered:     Vec<String>,
    limits_seen:   Vec<usize>,
}

impl FakeRemote {
    pub fn healthy() -> Self {
        Self::default()
    }

    pub fn down() -> Self {
        let fake = Self::default();
        fake.set_down(true);
        fake
    }

    pub fn with_stats(self, stats: RemoteStats) -> Self {
        self.lock().stats = stats;
        self
    }

    pub fn with_partners(self, partners: Vec<RemotePartner>) -> Self {
        self.lock().partners = partners;
        self
    }

    pub fn with_summary(self, partner_id: &str, summary: RemoteSummary) -> Self {
        self.lock().summaries.insert(partner_id.to_string(), summary);
        self
    }

    pub fn with_interventions(self, interventions: Vec<RemoteIntervention>) -> Self {
        self.lock().interventions = interventions;
        self
    }

    pub fn set_down(&self, down: bool) {
        self.lock().down = down;
    }

    pub fn fail_with_status(&self, status: Option<u16>) {
        self.lock().fail_status = status;
    }

    /// Total calls made against this fake.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Partner ids passed to `trigger_intervention` that succeeded.
    pub fn triggered(&self) -> Vec<String> {
        self.lock().triggered.clone()
    }

    /// `limit` values passed to `partners`.
    pub fn limits_seen(&self) -> Vec<usize> {
        self.lock().limits_seen.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and return the state, or the configured failure.
    fn enter(&self, path: &str) -> Result<MutexGuard<'_, FakeState>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        if state.down {
            return Err(RemoteError::Unavailable(format!("fake remote down ({path})")));
        }
        if let Some(status) = state.fail_status {
            return Err(RemoteError::Status { status, path: path.to_string() });
        }
        Ok(state)
    }
}

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn stats(&self) -> Result<RemoteStats, RemoteError> {
        Ok(self.enter("/stats")?.stats.clone())
    }

    async fn partners(&self, limit: usize) -> Result<Vec<RemotePartner>, RemoteError> {
        let mut state = self.enter("/partners")?;
        state.limits_seen.push(limit);
        Ok(state.partners.iter().take(limit).cloned().collect())
    }

    async fn partner(&self, partner_id: &str) -> Result<RemotePartner, RemoteError> {
        let path = format!("/partners/{partner_id}");
        let state = self.enter(&path)?;
        state
            .partners
            .iter()
            .find(|p| p.partner_id == partner_id)
            .cloned()
            .ok_or(RemoteError::Status { status: 404, path })
    }

    async fn partner_summary(&self, partner_id: &str) -> Result<RemoteSummary, RemoteError> {
        let state = self.enter(&format!("/partners/{partner_id}/summary"))?;
        Ok(state.summaries.get(partner_id).cloned().unwrap_or_default())
    }

    async fn interventions(&self) -> Result<Vec<RemoteIntervention>, RemoteError> {
        Ok(self.enter("/interventions")?.interventions.clone())
    }

    async fn trigger_intervention(&self, partner_id: &str) -> Result<TriggerReceipt, RemoteError> {
        let path = format!("/partners/{partner_id}/trigger");
        let mut state = self.enter(&path)?;
        if !state.partners.iter().any(|p| p.partner_id == partner_id) {
            return Err(RemoteError::Status { status: 404, path });
        }
        state.triggered.push(partner_id.to_string());
        Ok(TriggerReceipt { status: "triggered".into() })
    }
}
