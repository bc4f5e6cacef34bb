//! Derived views: the alert board and ROI statistics.
//!
//! Both are pure functions over already-reconciled data, so they inherit the
//! reconciler's totality and never touch the network themselves.

use crate::types::{Intervention, InterventionStatus, PartnerRisk};
use serde::{Deserialize, Serialize};

/// Urgency at or above which an alert is critical.
pub const CRITICAL_URGENCY: u8 = 80;
/// Urgency at or above which an alert is high priority.
pub const HIGH_URGENCY: u8 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertBoard {
    pub alerts:         Vec<PartnerRisk>,
    pub critical_count: usize,
    pub high_count:     usize,
    pub medium_count:   usize,
}

impl AlertBoard {
    /// Partners at or above `threshold`, most urgent first, at most `cap`.
    /// Ties keep their input order.
    pub fn build(partners: &[PartnerRisk], threshold: f64, cap: usize) -> Self {
        let mut alerts: Vec<PartnerRisk> = partners
            .iter()
            .filter(|p| p.churn_prob >= threshold)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.urgency_score.cmp(&a.urgency_score));
        alerts.truncate(cap);

        let critical_count = alerts.iter().filter(|a| a.urgency_score >= CRITICAL_URGENCY).count();
        let high_count = alerts
            .iter()
            .filter(|a| (HIGH_URGENCY..CRITICAL_URGENCY).contains(&a.urgency_score))
            .count();
        let medium_count = alerts.len() - critical_count - high_count;

        Self { alerts, critical_count, high_count, medium_count }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RoiStats {
    pub total:               usize,
    pub saved:               usize,
    pub failed:              usize,
    pub pending:             usize,
    pub total_ltv_protected: f64,
    /// Whole percent, 0 when there are no interventions.
    pub success_rate:        u32,
}

impl RoiStats {
    pub fn from_interventions(interventions: &[Intervention], average_saved_ltv: f64) -> Self {
        let total = interventions.len();
        let saved = interventions.iter().filter(|i| i.is_saved()).count();
        let failed = interventions.iter().filter(|i| i.is_failed()).count();
        let pending = interventions
            .iter()
            .filter(|i| i.status == InterventionStatus::Pending)
            .count();

        let success_rate = if total > 0 {
            ((saved as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };

        Self {
            total,
            saved,
            failed,
            pending,
            total_ltv_protected: saved as f64 * average_saved_ltv.max(0.0),
            success_rate,
        }
    }
}
