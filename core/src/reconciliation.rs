//! Reconciliation layer: merges live analytics data with the fallback
//! dataset and normalizes it into the shapes the dashboard renders.
//!
//! CONTRACT: every public operation is total. Remote failures (transport,
//! non-success status, undecodable body) are logged at `warn` and replaced
//! by the fallback value for that resource:
//!
//!   stats           → fallback baseline stats
//!   partner list    → fallback partner list
//!   single partner  → absent
//!   partner summary → absent
//!   interventions   → empty list
//!   trigger         → absent ("not confirmed")
//!
//! The merge policy (`MergePolicy`) is chosen once per reconciler and
//! applies to every resource.

use crate::{
    analytics::{AlertBoard, RoiStats},
    clock::Clock,
    config::{MergePolicy, WatchConfig},
    error::RemoteError,
    fallback::FallbackDataset,
    remote::{RemoteIntervention, RemotePartner, RemoteSource, RemoteStats},
    types::{AgentSummary, DashboardStats, Intervention, Lookup, PartnerRisk, TriggerReceipt},
};
use std::collections::HashSet;
use std::sync::Arc;

pub struct Reconciler {
    remote:   Arc<dyn RemoteSource>,
    fallback: FallbackDataset,
    config:   WatchConfig,
    clock:    Arc<dyn Clock>,
}

impl Reconciler {
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        fallback: FallbackDataset,
        config: WatchConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { remote, fallback, config, clock }
    }

    pub fn policy(&self) -> MergePolicy {
        self.config.merge_policy
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn fallback(&self) -> &FallbackDataset {
        &self.fallback
    }

    // ── Stats ──────────────────────────────────────────────────

    pub async fn fetch_stats(&self) -> DashboardStats {
        match self.remote.stats().await {
            Ok(remote) => merge_stats(self.policy(), self.fallback.stats(), &remote),
            Err(e) => {
                log::warn!("reconcile: stats unavailable, serving fallback: {e}");
                self.fallback.stats()
            }
        }
    }

    // ── Partners ───────────────────────────────────────────────

    /// Partner list for the dashboard, capped at `display_cap`.
    pub async fn fetch_high_risk_partners(&self, limit: usize) -> Vec<PartnerRisk> {
        self.partner_pool(limit, self.config.display_cap).await
    }

    /// Tagged single-partner lookup.
    pub async fn lookup_partner(&self, partner_id: &str) -> Lookup<PartnerRisk> {
        match self.remote.partner(partner_id).await {
            Ok(wire) => match wire.normalize() {
                Ok(p) if p.partner_id == partner_id => Lookup::Found(p),
                Ok(p) => {
                    log::warn!("reconcile: asked for {partner_id}, remote returned {}", p.partner_id);
                    Lookup::NotFound
                }
                Err(e) => {
                    log::warn!("reconcile: partner {partner_id} rejected: {e}");
                    Lookup::NotFound
                }
            },
            Err(e) => classify("partner", partner_id, e),
        }
    }

    pub async fn fetch_partner(&self, partner_id: &str) -> Option<PartnerRisk> {
        self.lookup_partner(partner_id).await.found()
    }

    pub async fn lookup_partner_summary(&self, partner_id: &str) -> Lookup<AgentSummary> {
        match self.remote.partner_summary(partner_id).await {
            Ok(wire) => match wire.normalize(self.clock.now()) {
                Some(summary) => Lookup::Found(summary),
                None => Lookup::NotFound,
            },
            Err(e) => classify("summary", partner_id, e),
        }
    }

    pub async fn fetch_partner_summary(&self, partner_id: &str) -> Option<AgentSummary> {
        self.lookup_partner_summary(partner_id).await.found()
    }

    // ── Interventions ──────────────────────────────────────────

    pub async fn fetch_interventions(&self) -> Vec<Intervention> {
        match self.remote.interventions().await {
            Ok(wire) => normalize_interventions(wire),
            Err(e) => {
                log::warn!("reconcile: interventions unavailable, serving empty log: {e}");
                Vec::new()
            }
        }
    }

    /// `None` means the trigger was not confirmed. It may or may not have
    /// reached the remote.
    pub async fn trigger_intervention(&self, partner_id: &str) -> Option<TriggerReceipt> {
        match self.remote.trigger_intervention(partner_id).await {
            Ok(receipt) => {
                log::info!("reconcile: intervention triggered for {partner_id} ({})", receipt.status);
                Some(receipt)
            }
            Err(e) => {
                log::warn!("reconcile: trigger for {partner_id} not confirmed: {e}");
                None
            }
        }
    }

    // ── Derived views ──────────────────────────────────────────

    pub async fn fetch_alert_board(&self) -> AlertBoard {
        let cap = self.config.alert_fetch_limit.max(self.config.display_cap);
        let pool = self.partner_pool(self.config.alert_fetch_limit, cap).await;
        AlertBoard::build(&pool, self.config.alert_threshold, self.config.alert_cap)
    }

    pub async fn fetch_roi(&self) -> RoiStats {
        let interventions = self.fetch_interventions().await;
        RoiStats::from_interventions(&interventions, self.config.average_saved_ltv)
    }

    async fn partner_pool(&self, limit: usize, cap: usize) -> Vec<PartnerRisk> {
        match self.remote.partners(limit).await {
            Ok(wire) => {
                let live = normalize_partners(wire);
                merge_partners(self.policy(), live, self.fallback.partners(), cap)
            }
            Err(e) => {
                log::warn!("reconcile: partners unavailable, serving fallback: {e}");
                self.fallback.partners().to_vec()
            }
        }
    }
}

fn classify<T>(what: &str, partner_id: &str, e: RemoteError) -> Lookup<T> {
    if e.is_not_found() {
        log::debug!("reconcile: {what} {partner_id} not found");
        Lookup::NotFound
    } else {
        log::warn!("reconcile: {what} {partner_id} unavailable: {e}");
        Lookup::Unavailable
    }
}

// ── Merge rules ──────────────────────────────────────────────────────────────

/// Combine remote counters with the baseline. Negative remote values count
/// as zero so the result never goes below zero.
pub fn merge_stats(policy: MergePolicy, baseline: DashboardStats, remote: &RemoteStats) -> DashboardStats {
    let exposed = non_negative(remote.total_revenue_exposed);
    let recovered = non_negative(remote.total_recovered_revenue);
    let at_risk = non_negative(remote.total_partners_at_risk).round() as u64;

    match policy {
        MergePolicy::Baseline => DashboardStats {
            total_exposure:       baseline.total_exposure + exposed,
            recoverable_revenue:  baseline.recoverable_revenue + recovered,
            active_interventions: baseline.active_interventions.saturating_add(at_risk),
            risk_trend:           baseline.risk_trend,
        },
        MergePolicy::PassThrough => DashboardStats {
            total_exposure:       exposed,
            recoverable_revenue:  recovered,
            active_interventions: at_risk,
            risk_trend:           baseline.risk_trend,
        },
    }
}

/// Live records first, in remote order, then (under `Baseline`) fallback
/// records whose ids are not already present, truncated to `cap`.
/// An empty live list falls back under either policy.
pub fn merge_partners(
    policy: MergePolicy,
    live: Vec<PartnerRisk>,
    fallback: &[PartnerRisk],
    cap: usize,
) -> Vec<PartnerRisk> {
    if live.is_empty() {
        return fallback.iter().take(cap).cloned().collect();
    }

    let mut merged = live;
    if policy == MergePolicy::Baseline {
        let seen: HashSet<String> = merged.iter().map(|p| p.partner_id.clone()).collect();
        merged.extend(fallback.iter().filter(|p| !seen.contains(&p.partner_id)).cloned());
    }
    merged.truncate(cap);
    merged
}

fn non_negative(v: Option<f64>) -> f64 {
    v.filter(|x| x.is_finite()).unwrap_or(0.0).max(0.0)
}

fn normalize_partners(wire: Vec<RemotePartner>) -> Vec<PartnerRisk> {
    wire.into_iter()
        .filter_map(|p| {
            p.normalize()
                .map_err(|e| log::warn!("reconcile: dropping partner record: {e}"))
                .ok()
        })
        .collect()
}

fn normalize_interventions(wire: Vec<RemoteIntervention>) -> Vec<Intervention> {
    wire.into_iter()
        .filter_map(|i| {
            i.normalize()
                .map_err(|e| log::warn!("reconcile: dropping intervention record: {e}"))
                .ok()
        })
        .collect()
}
