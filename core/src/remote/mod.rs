//! The analytics API seam.
//!
//! RULE: Only this module knows the API's wire shapes.
//! The reconciler talks to a `RemoteSource` and receives wire records,
//! which it normalizes into domain types via the `normalize` methods here.
//! Wire records are lenient (every field optional) so one odd
//! record can be dropped without losing the rest of a list.

mod fake;
mod http;

pub use fake::FakeRemote;
pub use http::{HttpRemote, ServiceClient};

use crate::{
    error::RemoteError,
    types::{
        AgentAnalysis, AgentSummary, Intervention, InterventionStatus, PartnerRisk, RiskCategory,
        Tier, TriggerReceipt,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything the reconciler needs from the analytics API.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// `GET /stats`
    async fn stats(&self) -> Result<RemoteStats, RemoteError>;

    /// `GET /partners?limit=N`
    async fn partners(&self, limit: usize) -> Result<Vec<RemotePartner>, RemoteError>;

    /// `GET /partners/{id}`
    async fn partner(&self, partner_id: &str) -> Result<RemotePartner, RemoteError>;

    /// `GET /partners/{id}/summary`
    async fn partner_summary(&self, partner_id: &str) -> Result<RemoteSummary, RemoteError>;

    /// `GET /interventions`
    async fn interventions(&self) -> Result<Vec<RemoteIntervention>, RemoteError>;

    /// `POST /partners/{id}/trigger`
    async fn trigger_intervention(&self, partner_id: &str) -> Result<TriggerReceipt, RemoteError>;
}

// ── Wire shapes ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteStats {
    pub total_revenue_exposed:   Option<f64>,
    pub total_recovered_revenue: Option<f64>,
    pub total_partners_at_risk:  Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemotePartner {
    pub partner_id:      String,
    pub region:          Option<String>,
    pub tier:            Option<String>,
    pub churn_prob:      Option<f64>,
    pub risk_category:   Option<String>,
    pub ltv:             Option<f64>,
    pub login_trend_30d: Option<f64>,
    pub urgency_score:   Option<f64>,
    pub status:          Option<String>,
}

impl RemotePartner {
    /// Convert to a domain record. Missing optional signals are filled the
    /// documented way; out-of-range values reject the record.
    pub fn normalize(self) -> Result<PartnerRisk, String> {
        let churn_prob = self
            .churn_prob
            .ok_or_else(|| format!("partner {} has no churn_prob", self.partner_id))?;

        let tier: Tier = self
            .tier
            .as_deref()
            .ok_or_else(|| format!("partner {} has no tier", self.partner_id))?
            .parse()?;

        let risk_category = match self.risk_category.as_deref() {
            Some(raw) => raw.parse::<RiskCategory>()?,
            None      => RiskCategory::from_probability(churn_prob),
        };

        let urgency = self.urgency_score.unwrap_or((churn_prob * 100.0).round());
        if !(0.0..=100.0).contains(&urgency) {
            return Err(format!("partner {} urgency_score={urgency} outside [0,100]", self.partner_id));
        }

        let record = PartnerRisk {
            partner_id:      self.partner_id,
            region:          self.region.unwrap_or_default(),
            tier,
            churn_prob,
            risk_category,
            ltv:             self.ltv.unwrap_or(0.0),
            login_trend_30d: self.login_trend_30d.unwrap_or(0.0),
            urgency_score:   urgency.round() as u8,
            status:          self.status,
        };
        record.validate()?;
        Ok(record)
    }
}

impl From<&PartnerRisk> for RemotePartner {
    fn from(p: &PartnerRisk) -> Self {
        Self {
            partner_id:      p.partner_id.clone(),
            region:          Some(p.region.clone()),
            tier:            Some(format!("{:?}", p.tier)),
            churn_prob:      Some(p.churn_prob),
            risk_category:   Some(format!("{:?}", p.risk_category)),
            ltv:             Some(p.ltv),
            login_trend_30d: Some(p.login_trend_30d),
            urgency_score:   Some(f64::from(p.urgency_score)),
            status:          p.status.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteSummary {
    pub partner_id:         Option<String>,
    pub churn_tendency:     Option<f64>,
    pub summary:            Option<String>,
    pub metrics:            Option<BTreeMap<String, serde_json::Value>>,
    pub reason_codes:       Option<Vec<String>>,
    pub recommended_action: Option<String>,
    #[serde(alias = "created_at")]
    pub timestamp:          Option<String>,
}

impl RemoteSummary {
    /// `None` when the API answered with an empty object or a record that
    /// does not name a partner. A missing timestamp takes `observed_at`.
    pub fn normalize(self, observed_at: DateTime<Utc>) -> Option<AgentSummary> {
        let partner_id = self.partner_id.filter(|id| !id.trim().is_empty())?;
        let churn_tendency = self.churn_tendency.unwrap_or(0.0);
        if !(0.0..=1.0).contains(&churn_tendency) {
            log::warn!("summary for {partner_id}: churn_tendency={churn_tendency} outside [0,1]");
            return None;
        }
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(observed_at);

        Some(AgentSummary {
            analysis: AgentAnalysis {
                partner_id,
                churn_tendency,
                summary:            self.summary.unwrap_or_default(),
                metrics:            self.metrics.unwrap_or_default(),
                reason_codes:       self.reason_codes.unwrap_or_default(),
                recommended_action: self.recommended_action,
            },
            timestamp,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteIntervention {
    /// Backends assign either string or integer ids.
    pub id:            serde_json::Value,
    pub partner_id:    String,
    pub action_type:   String,
    pub status:        String,
    pub timestamp:     Option<String>,
    pub performed_by:  Option<String>,
    pub outcome_label: Option<String>,
}

impl RemoteIntervention {
    pub fn normalize(self) -> Result<Intervention, String> {
        let id = match &self.id {
            serde_json::Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            other => return Err(format!("intervention id {other} is not a string or number")),
        };
        let status: InterventionStatus = self.status.parse()?;
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .ok_or_else(|| format!("intervention {id} has no usable timestamp"))?;

        Ok(Intervention {
            id,
            partner_id:    self.partner_id,
            action_type:   self.action_type,
            status,
            timestamp,
            performed_by:  self.performed_by.unwrap_or_else(|| "System".to_string()),
            outcome_label: self.outcome_label,
        })
    }
}

/// Accepts RFC 3339, or a naive ISO-8601 datetime which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
