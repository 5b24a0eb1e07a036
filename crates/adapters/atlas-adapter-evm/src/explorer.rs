//! Etherscan/Blockscout-compatible explorer client, capability level only.
//!
//! Each lookup degrades to `None` on upstream failure; the adapter logs and
//! moves on.

use anyhow::{anyhow, Context, Result};
use atlas_model::{SourceSpec, TxInfo};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use url::Url;

pub struct Explorer {
    http: reqwest::Client,
    base: Url,
    api_key: Option<String>,
}

impl Explorer {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: Url::parse(base_url).context("invalid explorer url")?,
            api_key,
        })
    }

    async fn query(&self, pairs: &[(&str, &str)]) -> Result<JsonValue> {
        let mut url = self.base.join("api").context("explorer url join")?;
        {
            let mut qp = url.query_pairs_mut();
            for (k, v) in pairs {
                qp.append_pair(k, v);
            }
            if let Some(key) = &self.api_key {
                qp.append_pair("apikey", key);
            }
        }
        let response: JsonValue = self
            .http
            .get(url)
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

    /// Verified source/ABI for a contract. Unverified contracts yield a
    /// spec with `verified: false` and no ABI.
    pub async fn get_source(&self, address: &str) -> Result<Option<SourceSpec>> {
        let response = self
            .query(&[
                ("module", "contract"),
                ("action", "getsourcecode"),
                ("address", address),
            ])
            .await?;
        let Some(entry) = response
            .get("result")
            .and_then(JsonValue::as_array)
            .and_then(|rows| rows.first())
        else {
            return Ok(None);
        };

        let abi_text = entry.get("ABI").and_then(JsonValue::as_str).unwrap_or("");
        let abi: Option<JsonValue> = serde_json::from_str(abi_text).ok();
        let verified = abi.is_some();
        if !verified {
            tracing::debug!(
                target: "atlas_adapter_evm",
                address,
                "contract source not verified"
            );
        }
        Ok(Some(SourceSpec {
            abi,
            verified,
            creation_block: None,
            fetch_date: Utc::now(),
        }))
    }

    /// First or last transaction of an address, by sort order.
    pub async fn get_edge_transaction(&self, address: &str, ascending: bool) -> Result<Option<TxInfo>> {
        let response = self
            .query(&[
                ("module", "account"),
                ("action", "txlist"),
                ("address", address),
                ("page", "1"),
                ("offset", "1"),
                ("sort", if ascending { "asc" } else { "desc" }),
            ])
            .await?;
        let Some(tx) = response
            .get("result")
            .and_then(JsonValue::as_array)
            .and_then(|rows| rows.first())
        else {
            return Ok(None);
        };
        Ok(Some(parse_tx(tx)?))
    }

    /// Deployment transaction of a contract.
    pub async fn get_creation_transaction(&self, address: &str) -> Result<Option<TxInfo>> {
        let response = self
            .query(&[
                ("module", "contract"),
                ("action", "getcontractcreation"),
                ("contractaddresses", address),
            ])
            .await?;
        let Some(entry) = response
            .get("result")
            .and_then(JsonValue::as_array)
            .and_then(|rows| rows.first())
        else {
            return Ok(None);
        };
        Ok(Some(parse_creation(entry)?))
    }
}

fn parse_creation(entry: &JsonValue) -> Result<TxInfo> {
    let hash = entry
        .get("txHash")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| anyhow!("creation lookup missing txHash"))?;
    Ok(TxInfo {
        hash: hash.to_string(),
        block: entry
            .get("blockNumber")
            .and_then(JsonValue::as_str)
            .and_then(|s| s.parse().ok()),
        timestamp: None,
    })
}

fn parse_tx(tx: &JsonValue) -> Result<TxInfo> {
    let hash = tx
        .get("hash")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| anyhow!("transaction row missing hash"))?;
    let block = tx
        .get("blockNumber")
        .and_then(JsonValue::as_str)
        .and_then(|s| s.parse().ok());
    let timestamp = tx
        .get("timeStamp")
        .and_then(JsonValue::as_str)
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    Ok(TxInfo {
        hash: hash.to_string(),
        block,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_transaction_rows() {
        let tx = parse_tx(&json!({
            "hash": "0xfeed",
            "blockNumber": "1234",
            "timeStamp": "1700000000"
        }))
        .unwrap();
        assert_eq!(tx.hash, "0xfeed");
        assert_eq!(tx.block, Some(1234));
        assert!(tx.timestamp.is_some());
    }

    #[test]
    fn missing_hash_is_an_error() {
        assert!(parse_tx(&json!({ "blockNumber": "1" })).is_err());
    }

    #[test]
    fn parses_creation_rows_with_block() {
        let tx = parse_creation(&json!({
            "contractAddress": "0xabc",
            "contractCreator": "0xdef",
            "txHash": "0xbeef",
            "blockNumber": "42"
        }))
        .unwrap();
        assert_eq!(tx.hash, "0xbeef");
        assert_eq!(tx.block, Some(42));

        // Blockscout omits blockNumber on this endpoint; the hash alone
        // still counts as a creation record.
        let tx = parse_creation(&json!({ "txHash": "0xbeef" })).unwrap();
        assert_eq!(tx.block, None);
    }
}
