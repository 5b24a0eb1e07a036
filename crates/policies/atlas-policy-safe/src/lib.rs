//! Safe (Gnosis Safe) policy adapter, backed by a Safe transaction service.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use atlas_core::PolicyAdapter;
use atlas_model::policy::{vote_threshold, WeightKind};
use atlas_model::PolicySpec;
use chrono::Utc;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
struct SafeInfo {
    owners: Vec<String>,
    threshold: u64,
    #[serde(default)]
    version: Option<String>,
}

/// Capability client for a Safe transaction service
/// (`/api/v1/safes/{address}/`).
pub struct SafePolicy {
    http: reqwest::Client,
    base: Url,
}

impl SafePolicy {
    pub fn new(service_url: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: Url::parse(service_url).context("invalid safe service url")?,
        })
    }

    async fn safe_info(&self, address: &str) -> Result<SafeInfo> {
        let url = self
            .base
            .join(&format!("api/v1/safes/{address}/"))
            .context("safe service url join")?;
        let info: SafeInfo = self
            .http
            .get(url)
            .send()
            .await
            .context("safe service transport failure")?
            .error_for_status()
            .context("safe service http error")?
            .json()
            .await
            .context("safe service returned non-JSON payload")?;
        Ok(info)
    }
}

#[async_trait]
impl PolicyAdapter for SafePolicy {
    fn scheme(&self) -> &'static str {
        "safe"
    }

    async fn fetch_owners(&self, address: &str) -> Result<Vec<String>> {
        let info = self.safe_info(address).await?;
        if info.owners.is_empty() {
            return Err(anyhow!("safe {address} reports no owners"));
        }
        Ok(info.owners)
    }

    async fn fetch_policy(&self, address: &str, owner_count: u64) -> Result<Option<PolicySpec>> {
        let info = self.safe_info(address).await?;
        // The service reports an absolute confirmation count. Run it through
        // the shared ratio arithmetic as a unanimity-capped sanity bound: a
        // Safe can never require more confirmations than it has seats.
        let cap = vote_threshold(owner_count, (owner_count, 1), WeightKind::RoleWeight)?;
        let threshold = info.threshold.min(cap);
        if threshold != info.threshold {
            tracing::warn!(
                target: "atlas_policy_safe",
                address,
                reported = info.threshold,
                owner_count,
                "safe threshold exceeds seat count, capping"
            );
        }
        Ok(Some(PolicySpec {
            owner_count,
            threshold,
            version: info.version.unwrap_or_else(|| "unknown".to_string()),
            fetch_date: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_info_deserializes_service_payloads() {
        let info: SafeInfo = serde_json::from_str(
            r#"{
                "address": "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
                "nonce": 12,
                "threshold": 2,
                "owners": ["0xaaa", "0xbbb", "0xccc"],
                "version": "1.3.0"
            }"#,
        )
        .unwrap();
        assert_eq!(info.threshold, 2);
        assert_eq!(info.owners.len(), 3);
        assert_eq!(info.version.as_deref(), Some("1.3.0"));
    }
}
