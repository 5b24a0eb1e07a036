//! NearBlocks-style explorer client, capability level only.

use anyhow::{anyhow, Context, Result};
use atlas_model::TxInfo;
use chrono::DateTime;
use serde_json::Value as JsonValue;
use url::Url;

pub struct NearExplorer {
    http: reqwest::Client,
    base: Url,
    api_key: Option<String>,
}

impl NearExplorer {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: Url::parse(base_url).context("invalid explorer url")?,
            api_key,
        })
    }

    async fn get(&self, path: &str, pairs: &[(&str, &str)]) -> Result<JsonValue> {
        let mut url = self.base.join(path).context("explorer url join")?;
        {
            let mut qp = url.query_pairs_mut();
            for (k, v) in pairs {
                qp.append_pair(k, v);
            }
        }
        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response: JsonValue = request
            .send()
            .await
            .context("explorer transport failure")?
            .error_for_status()
            .context("explorer http error")?
            .json()
            .await
            .context("explorer returned non-JSON payload")?;
        Ok(response)
    }

    /// Oldest or newest transaction touching the account.
    pub async fn get_edge_transaction(
        &self,
        account_id: &str,
        ascending: bool,
    ) -> Result<Option<TxInfo>> {
        let response = self
            .get(
                &format!("v1/account/{account_id}/txns"),
                &[
                    ("page", "1"),
                    ("per_page", "1"),
                    ("order", if ascending { "asc" } else { "desc" }),
                ],
            )
            .await?;
        let Some(tx) = response
            .get("txns")
            .and_then(JsonValue::as_array)
            .and_then(|rows| rows.first())
        else {
            return Ok(None);
        };
        Ok(Some(parse_tx(tx)?))
    }

    /// The transaction that deployed the current contract code.
    pub async fn get_deployment_transaction(&self, account_id: &str) -> Result<Option<TxInfo>> {
        let response = self
            .get(&format!("v1/account/{account_id}/contract/deployments"), &[])
            .await?;
        let Some(row) = response
            .get("deployments")
            .and_then(JsonValue::as_array)
            .and_then(|rows| rows.first())
        else {
            return Ok(None);
        };
        Ok(Some(parse_tx(row)?))
    }
}

fn parse_tx(tx: &JsonValue) -> Result<TxInfo> {
    let hash = tx
        .get("transaction_hash")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| anyhow!("transaction row missing transaction_hash"))?;
    let block = tx
        .pointer("/block/block_height")
        .and_then(JsonValue::as_u64);
    // NearBlocks timestamps are nanoseconds encoded as strings.
    let timestamp = tx
        .get("block_timestamp")
        .and_then(JsonValue::as_str)
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|nanos| DateTime::from_timestamp(nanos / 1_000_000_000, 0));
    Ok(TxInfo {
        hash: hash.to_string(),
        block,
        timestamp,
    })
}
