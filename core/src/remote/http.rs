use super::{RemoteIntervention, RemotePartner, RemoteSource, RemoteStats, RemoteSummary};
use crate::{
    config::WatchConfig,
    error::RemoteError,
    types::{AgentSummary, TriggerReceipt},
};
use async_trait::async_trait;
use reqwest::{header::CACHE_CONTROL, Client, Method, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// `RemoteSource` over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base:   Url,
    client: Client,
}

impl HttpRemote {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let base = parse_base(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    pub fn from_config(config: &WatchConfig) -> Result<Self, RemoteError> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
        send_json(&self.client, Method::GET, url).await
    }

    /// Decode a JSON array one element at a time, dropping elements that do
    /// not fit the wire shape.
    async fn get_list<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, RemoteError> {
        let path = url.path().to_string();
        let values: Vec<serde_json::Value> = self.get_json(url).await?;
        let total = values.len();
        let decoded: Vec<T> = values
            .into_iter()
            .filter_map(|v| match serde_json::from_value(v) {
                Ok(item) => Some(item),
                Err(e) => {
                    log::warn!("remote {path}: dropping undecodable element: {e}");
                    None
                }
            })
            .collect();
        if decoded.len() < total {
            log::debug!("remote {path}: kept {}/{total} elements", decoded.len());
        }
        Ok(decoded)
    }
}

#[async_trait]
impl RemoteSource for HttpRemote {
    async fn stats(&self) -> Result<RemoteStats, RemoteError> {
        let url = join(&self.base, &["stats"])?;
        let resp = self
            .client
            .get(url.clone())
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;
        decode_response(url, resp).await
    }

    async fn partners(&self, limit: usize) -> Result<Vec<RemotePartner>, RemoteError> {
        let mut url = join(&self.base, &["partners"])?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        self.get_list(url).await
    }

    async fn partner(&self, partner_id: &str) -> Result<RemotePartner, RemoteError> {
        self.get_json(join(&self.base, &["partners", partner_id])?).await
    }

    async fn partner_summary(&self, partner_id: &str) -> Result<RemoteSummary, RemoteError> {
        self.get_json(join(&self.base, &["partners", partner_id, "summary"])?).await
    }

    async fn interventions(&self) -> Result<Vec<RemoteIntervention>, RemoteError> {
        self.get_list(join(&self.base, &["interventions"])?).await
    }

    async fn trigger_intervention(&self, partner_id: &str) -> Result<TriggerReceipt, RemoteError> {
        let url = join(&self.base, &["partners", partner_id, "trigger"])?;
        send_json(&self.client, Method::POST, url).await
    }
}

/// Client for the dashboard service's own agent-summary feed. This is what a
/// polling view reads from.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    base:   Url,
    client: Client,
}

impl ServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let base = parse_base(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    /// `GET /api/agent-summary`. An empty object means nothing has been
    /// submitted since the service started.
    pub async fn latest_agent_summary(&self) -> Result<Option<AgentSummary>, RemoteError> {
        let url = join(&self.base, &["api", "agent-summary"])?;
        let value: serde_json::Value = send_json(&self.client, Method::GET, url).await?;
        if value.as_object().is_some_and(|o| o.is_empty()) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }
}

fn parse_base(base_url: &str) -> Result<Url, RemoteError> {
    let base = Url::parse(base_url).map_err(|e| RemoteError::InvalidUrl {
        url:    base_url.to_string(),
        reason: e.to_string(),
    })?;
    if base.cannot_be_a_base() {
        return Err(RemoteError::InvalidUrl {
            url:    base_url.to_string(),
            reason: "not a hierarchical URL".into(),
        });
    }
    Ok(base)
}

/// Append percent-encoded path segments to `base`, keeping any path prefix
/// the base already has.
fn join(base: &Url, segments: &[&str]) -> Result<Url, RemoteError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RemoteError::InvalidUrl {
            url:    base.to_string(),
            reason: "not a hierarchical URL".into(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn send_json<T: DeserializeOwned>(
    client: &Client,
    method: Method,
    url: Url,
) -> Result<T, RemoteError> {
    let resp = client.request(method, url.clone()).send().await?;
    decode_response(url, resp).await
}

async fn decode_response<T: DeserializeOwned>(
    url: Url,
    resp: reqwest::Response,
) -> Result<T, RemoteError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(RemoteError::Status {
            status: status.as_u16(),
            path:   url.path().to_string(),
        });
    }
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
