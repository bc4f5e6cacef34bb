use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_API_URL: &str      = "CHURNWATCH_API_URL";
pub const ENV_BIND: &str         = "CHURNWATCH_BIND";
pub const ENV_TIMEOUT_MS: &str   = "CHURNWATCH_TIMEOUT_MS";
pub const ENV_POLL_SECS: &str    = "CHURNWATCH_POLL_SECS";
pub const ENV_MERGE_POLICY: &str = "CHURNWATCH_MERGE_POLICY";

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8001";
pub const DEFAULT_BIND: &str    = "127.0.0.1:3000";

/// How live data is combined with the fallback dataset.
/// Applied uniformly to every resource the reconciler serves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Fallback values are a floor: remote stats are added on top of the
    /// baseline and remote partners are listed ahead of fallback partners.
    #[default]
    Baseline,
    /// Remote values are shown as-is; fallback data only on failure or an
    /// empty remote list.
    PassThrough,
}

impl std::str::FromStr for MergePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "baseline" | "additive"         => Ok(Self::Baseline),
            "pass_through" | "passthrough"  => Ok(Self::PassThrough),
            other => Err(anyhow::anyhow!("unknown merge policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchConfig {
    /// Base URL of the analytics API.
    pub api_base_url:        String,
    /// Address the dashboard service listens on.
    pub bind_addr:           String,
    pub request_timeout_ms:  u64,
    /// Cadence shared by every polled view.
    pub poll_interval_secs:  u64,
    /// `limit` sent on the partner list request.
    pub partner_fetch_limit: usize,
    /// Maximum partners shown after merging live and fallback records.
    pub display_cap:         usize,
    pub merge_policy:        MergePolicy,
    /// Churn probability at or above which a partner raises an alert.
    pub alert_threshold:     f64,
    pub alert_cap:           usize,
    pub alert_fetch_limit:   usize,
    /// LTV credited per saved partner in the ROI view.
    pub average_saved_ltv:   f64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            api_base_url:        DEFAULT_API_URL.into(),
            bind_addr:           DEFAULT_BIND.into(),
            request_timeout_ms:  5_000,
            poll_interval_secs:  10,
            partner_fetch_limit: 10,
            display_cap:         15,
            merge_policy:        MergePolicy::Baseline,
            alert_threshold:     0.7,
            alert_cap:           15,
            alert_fetch_limit:   50,
            average_saved_ltv:   185_000.0,
        }
    }
}

impl WatchConfig {
    /// Load from a JSON file, then apply environment overrides.
    /// Keys missing from the file keep their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: WatchConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        file.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key/value source. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.trim().is_empty()) {
            self.bind_addr = bind.trim().to_string();
        }
        if let Some(ms) = lookup(ENV_TIMEOUT_MS) {
            self.request_timeout_ms = ms
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{ENV_TIMEOUT_MS}='{ms}': {e}"))?;
        }
        if let Some(secs) = lookup(ENV_POLL_SECS) {
            self.poll_interval_secs = secs
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{ENV_POLL_SECS}='{secs}': {e}"))?;
        }
        if let Some(policy) = lookup(ENV_MERGE_POLICY) {
            self.merge_policy = policy.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_base_url.trim().is_empty() {
            anyhow::bail!("api_base_url must not be empty");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be > 0");
        }
        if self.display_cap == 0 {
            anyhow::bail!("display_cap must be > 0");
        }
        if !(0.0..=1.0).contains(&self.alert_threshold) {
            anyhow::bail!("alert_threshold={} outside [0,1]", self.alert_threshold);
        }
        if self.average_saved_ltv.is_nan() || self.average_saved_ltv < 0.0 {
            anyhow::bail!("average_saved_ltv must be non-negative");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Config with short timeouts for use in tests.
    pub fn default_test() -> Self {
        Self {
            bind_addr:          "127.0.0.1:0".into(),
            request_timeout_ms: 1_000,
            ..Self::default()
        }
    }
}
