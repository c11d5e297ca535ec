//! Tendermint JSON-RPC client
//!
//! Only the two calls the lifecycle needs: the genesis document of a running
//! cluster, and its current validator set.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::jsonrpc::{RpcRequest, RpcResponse};

const VALIDATORS_PER_PAGE: usize = 100;

/// Typed public key as encoded by Tendermint (`{"type": ..., "value": b64}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub value: String,
}

/// One entry of the validator set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    /// Upper-case hex address derived from the public key
    pub address: String,
    pub pub_key: PubKey,
    #[serde(default)]
    pub voting_power: String,
}

#[derive(Debug, Deserialize)]
struct ValidatorsPage {
    validators: Vec<ValidatorInfo>,
    #[serde(default)]
    total: Option<String>,
}

/// Read access to a consensus engine
#[async_trait]
pub trait ConsensusRpc: Send + Sync {
    /// Genesis document of the chain
    async fn genesis(&self) -> Result<Value>;
    /// Current validator set
    async fn validators(&self) -> Result<Vec<ValidatorInfo>>;
}

/// HTTP JSON-RPC client for a Tendermint node
pub struct TendermintClient {
    url: String,
    http_client: reqwest::Client,
}

impl TendermintClient {
    pub fn new(url: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = RpcRequest::new(method, Some(params));
        debug!("Sending RPC request to {}: {}", self.url, method);

        let response = self
            .http_client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send `{}` request to {}", method, self.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("HTTP error {}: {}", status, body));
        }

        let rpc_response: RpcResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse `{}` response", method))?;

        rpc_response
            .into_result()
            .with_context(|| format!("`{}` failed on {}", method, self.url))
    }
}

#[async_trait]
impl ConsensusRpc for TendermintClient {
    async fn genesis(&self) -> Result<Value> {
        let mut result = self.call("genesis", json!({})).await?;
        result
            .get_mut("genesis")
            .map(Value::take)
            .ok_or_else(|| anyhow!("genesis response has no `genesis` field"))
    }

    async fn validators(&self) -> Result<Vec<ValidatorInfo>> {
        let mut all = Vec::new();
        let mut page = 1usize;

        loop {
            let result = self
                .call(
                    "validators",
                    json!({ "page": page.to_string(), "per_page": VALIDATORS_PER_PAGE.to_string() }),
                )
                .await?;
            let parsed: ValidatorsPage =
                serde_json::from_value(result).context("Malformed validators response")?;

            let fetched = parsed.validators.len();
            all.extend(parsed.validators);

            let total = parse_total(parsed.total.as_deref()).unwrap_or(all.len());
            if fetched == 0 || all.len() >= total {
                break;
            }
            page += 1;
        }

        Ok(all)
    }
}

fn parse_total(total: Option<&str>) -> Option<usize> {
    total.and_then(|t| t.parse().ok())
}
