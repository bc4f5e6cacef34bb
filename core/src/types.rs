//! Domain types shared across the reconciliation layer, the poller and the
//! dashboard service.
//!
//! Everything here is the normalized shape the presentation consumes. Wire
//! shapes coming off the analytics API live in `remote.rs` and are converted
//! into these types by the reconciler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A stable partner identifier, e.g. `P11972`.
pub type PartnerId = String;

/// Churn probability at or above which a partner is bucketed High.
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;
/// Churn probability at or above which a partner is bucketed Medium.
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.4;

// ── Partner ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bronze"   => Ok(Self::Bronze),
            "silver"   => Ok(Self::Silver),
            "gold"     => Ok(Self::Gold),
            "platinum" => Ok(Self::Platinum),
            other      => Err(format!("unknown tier '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RiskCategory {
    High,
    Medium,
    Low,
}

impl RiskCategory {
    /// Bucket a churn probability. Only used when the source did not supply
    /// a category; supplied categories are kept as-is.
    pub fn from_probability(churn_prob: f64) -> Self {
        if churn_prob >= HIGH_RISK_THRESHOLD {
            Self::High
        } else if churn_prob >= MEDIUM_RISK_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl FromStr for RiskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high"   => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low"    => Ok(Self::Low),
            other    => Err(format!("unknown risk category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartnerRisk {
    pub partner_id:      PartnerId,
    pub region:          String,
    pub tier:            Tier,
    pub churn_prob:      f64,
    pub risk_category:   RiskCategory,
    pub ltv:             f64,
    pub login_trend_30d: f64,
    pub urgency_score:   u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status:          Option<String>,
}

impl PartnerRisk {
    /// Check the range invariants every returned record must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        if self.partner_id.trim().is_empty() {
            return Err("empty partner_id".into());
        }
        if !(0.0..=1.0).contains(&self.churn_prob) {
            return Err(format!("churn_prob={} outside [0,1]", self.churn_prob));
        }
        if self.ltv.is_nan() || self.ltv < 0.0 {
            return Err(format!("ltv={} is negative", self.ltv));
        }
        if self.urgency_score > 100 {
            return Err(format!("urgency_score={} above 100", self.urgency_score));
        }
        if !self.login_trend_30d.is_finite() {
            return Err("login_trend_30d is not finite".into());
        }
        Ok(())
    }
}

// ── Aggregate stats ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub total_exposure:       f64,
    pub recoverable_revenue:  f64,
    pub active_interventions: u64,
    /// Percentage.
    pub risk_trend:           f64,
}

// ── Agent summary ────────────────────────────────────────────────────────────

/// What an analysis agent submits. Everything except the timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentAnalysis {
    pub partner_id:         PartnerId,
    pub churn_tendency:     f64,
    #[serde(default)]
    pub summary:            String,
    #[serde(default)]
    pub metrics:            BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub reason_codes:       Vec<String>,
    #[serde(default)]
    pub recommended_action: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSummary {
    #[serde(flatten)]
    pub analysis:  AgentAnalysis,
    pub timestamp: DateTime<Utc>,
}

impl AgentSummary {
    pub fn partner_id(&self) -> &str {
        &self.analysis.partner_id
    }
}

// ── Interventions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InterventionStatus {
    Pending,
    Completed,
    Failed,
}

impl FromStr for InterventionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending"                       => Ok(Self::Pending),
            "completed" | "saved" | "success" => Ok(Self::Completed),
            "failed" | "churned"            => Ok(Self::Failed),
            other                           => Err(format!("unknown intervention status '{other}'")),
        }
    }
}

impl fmt::Display for InterventionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending   => "Pending",
            Self::Completed => "Completed",
            Self::Failed    => "Failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Intervention {
    /// Opaque id assigned by the analytics backend.
    pub id:            String,
    pub partner_id:    PartnerId,
    pub action_type:   String,
    pub status:        InterventionStatus,
    pub timestamp:     DateTime<Utc>,
    pub performed_by:  String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_label: Option<String>,
}

impl Intervention {
    pub fn is_saved(&self) -> bool {
        self.outcome_is("saved")
    }

    pub fn is_failed(&self) -> bool {
        self.outcome_is("failed")
    }

    fn outcome_is(&self, label: &str) -> bool {
        self.outcome_label
            .as_deref()
            .is_some_and(|l| l.trim().eq_ignore_ascii_case(label))
    }
}

/// Acknowledgement returned by the analytics API when an intervention is
/// triggered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerReceipt {
    pub status: String,
}

// ── Tagged lookups ───────────────────────────────────────────────────────────

/// Outcome of a single-record lookup that keeps permanent absence apart from
/// transient failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Unavailable,
}

impl<T> Lookup<T> {
    /// Collapse to the presentation's view: anything but `Found` is absent.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::NotFound | Lookup::Unavailable => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Lookup::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_category_buckets_match_thresholds() {
        assert_eq!(RiskCategory::from_probability(0.95), RiskCategory::High);
        assert_eq!(RiskCategory::from_probability(0.70), RiskCategory::High);
        assert_eq!(RiskCategory::from_probability(0.55), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_probability(0.40), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_probability(0.39), RiskCategory::Low);
    }

    #[test]
    fn intervention_status_accepts_outcome_aliases() {
        assert_eq!("saved".parse::<InterventionStatus>(), Ok(InterventionStatus::Completed));
        assert_eq!("Churned".parse::<InterventionStatus>(), Ok(InterventionStatus::Failed));
        assert_eq!(" PENDING ".parse::<InterventionStatus>(), Ok(InterventionStatus::Pending));
        assert!("unknown".parse::<InterventionStatus>().is_err());
    }

    #[test]
    fn agent_summary_serializes_flat() {
        let summary = AgentSummary {
            analysis: AgentAnalysis {
                partner_id: "P1".into(),
                churn_tendency: 0.9,
                summary: "x".into(),
                ..AgentAnalysis::default()
            },
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["partner_id"], "P1");
        assert_eq!(json["churn_tendency"], 0.9);
        assert!(json.get("analysis").is_none(), "analysis must be flattened");
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn lookup_collapses_to_option() {
        assert_eq!(Lookup::Found(3).found(), Some(3));
        assert_eq!(Lookup::<i32>::NotFound.found(), None);
        assert!(Lookup::<i32>::Unavailable.is_retryable());
        assert!(!Lookup::<i32>::NotFound.is_retryable());
    }
}
