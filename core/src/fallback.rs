//! Fallback dataset: the hand-curated records served whenever the
//! analytics API is unreachable or answers with something unusable.
//!
//! RULE: every record here satisfies `PartnerRisk::validate()` and carries a
//! risk category consistent with its churn probability.

use crate::types::{DashboardStats, PartnerRisk, RiskCategory, Tier};

/// Baseline aggregate counters.
pub const BASELINE_STATS: DashboardStats = DashboardStats {
    total_exposure:       12_500_000.0,
    recoverable_revenue:  4_200_000.0,
    active_interventions: 1_240,
    risk_trend:           12.0,
};

// (partner_id, region, tier, churn_prob, ltv, login_trend_30d, urgency_score)
const PARTNER_ROWS: [(&str, &str, Tier, f64, f64, f64, u8); 10] = [
    ("P11972", "Latin America", Tier::Gold,     0.95, 125_000.0, -85.0, 92),
    ("P88231", "Asia Pacific",  Tier::Platinum, 0.78, 340_000.0, -45.0, 75),
    ("P22104", "Europe",        Tier::Silver,   0.65,  45_000.0, -20.0, 45),
    ("P33892", "Africa",        Tier::Bronze,   0.55,  12_000.0, -15.0, 40),
    ("P44512", "CIS",           Tier::Silver,   0.48,  38_000.0, -10.0, 35),
    ("P55102", "MENA",          Tier::Gold,     0.82,  95_000.0, -60.0, 80),
    ("P66201", "Latin America", Tier::Platinum, 0.35, 210_000.0,   5.0, 20),
    ("P77394", "Asia Pacific",  Tier::Silver,   0.52,  28_000.0, -12.0, 38),
    ("P88410", "Europe",        Tier::Bronze,   0.25,   8_000.0,  10.0, 15),
    ("P99505", "Africa",        Tier::Gold,     0.60,  75_000.0, -18.0, 55),
];

/// Immutable fallback records, built once per reconciler.
#[derive(Debug, Clone)]
pub struct FallbackDataset {
    stats:    DashboardStats,
    partners: Vec<PartnerRisk>,
}

impl FallbackDataset {
    /// The curated demo dataset.
    pub fn curated() -> Self {
        let partners = PARTNER_ROWS
            .iter()
            .map(|&(id, region, tier, churn_prob, ltv, trend, urgency)| PartnerRisk {
                partner_id:      id.to_string(),
                region:          region.to_string(),
                tier,
                churn_prob,
                risk_category:   RiskCategory::from_probability(churn_prob),
                ltv,
                login_trend_30d: trend,
                urgency_score:   urgency,
                status:          None,
            })
            .collect();
        Self { stats: BASELINE_STATS, partners }
    }

    /// A dataset with caller-supplied contents. Records that fail
    /// validation are rejected so the fallback path can never emit them.
    pub fn custom(stats: DashboardStats, partners: Vec<PartnerRisk>) -> Result<Self, String> {
        if stats.total_exposure < 0.0 || stats.recoverable_revenue < 0.0 {
            return Err("fallback stats must be non-negative".into());
        }
        for p in &partners {
            p.validate().map_err(|e| format!("fallback partner {}: {e}", p.partner_id))?;
        }
        Ok(Self { stats, partners })
    }

    pub fn stats(&self) -> DashboardStats {
        self.stats
    }

    pub fn partners(&self) -> &[PartnerRisk] {
        &self.partners
    }

    pub fn partner(&self, partner_id: &str) -> Option<&PartnerRisk> {
        self.partners.iter().find(|p| p.partner_id == partner_id)
    }
}

impl Default for FallbackDataset {
    fn default() -> Self {
        Self::curated()
    }
}
