//! Application admin API client
//!
//! Used during validator setup to ask the running cluster to add this node's
//! key to the validator set.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::consensus::PubKey;

#[derive(Debug, Serialize)]
struct UpdateValidatorBody<'a> {
    pub_key: &'a PubKey,
    power: i64,
}

/// Administrative endpoints of the application process
#[async_trait]
pub trait AppAdmin: Send + Sync {
    /// Request a validator-set change; returns the raw response body.
    async fn update_validator(&self, pub_key: &PubKey, power: i64) -> Result<String>;
}

pub struct GlitterAdminClient {
    url: String,
    http_client: reqwest::Client,
}

impl GlitterAdminClient {
    pub fn new(url: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl AppAdmin for GlitterAdminClient {
    async fn update_validator(&self, pub_key: &PubKey, power: i64) -> Result<String> {
        let url = format!("{}/v1/admin/update_validator", self.url);
        debug!("Posting validator change to {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(&UpdateValidatorBody { pub_key, power })
            .send()
            .await
            .with_context(|| format!("Failed to send validator change to {}", url))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("HTTP error {}: {}", status, body));
        }

        info!(power, "Validator change submitted");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_validator_body_shape() {
        let key = PubKey {
            key_type: "tendermint/PubKeyEd25519".to_string(),
            value: "AAAA".to_string(),
        };
        let body = serde_json::to_value(UpdateValidatorBody { pub_key: &key, power: 1 }).unwrap();
        assert_eq!(
            body,
            json!({ "pub_key": { "type": "tendermint/PubKeyEd25519", "value": "AAAA" }, "power": 1 })
        );
    }
}
