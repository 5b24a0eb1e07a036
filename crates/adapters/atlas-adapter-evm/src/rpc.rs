//! Minimal JSON-RPC client for EVM nodes.

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value as JsonValue};
use url::Url;

pub struct EthRpc {
    http: reqwest::Client,
    url: Url,
}

impl EthRpc {
    pub fn new(rpc_url: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            url: Url::parse(rpc_url).context("invalid EVM rpc url")?,
        })
    }

    async fn request(&self, method: &str, params: JsonValue) -> Result<JsonValue> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response: JsonValue = self
            .http
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{method} transport failure"))?
            .error_for_status()
            .with_context(|| format!("{method} http error"))?
            .json()
            .await
            .with_context(|| format!("{method} returned non-JSON payload"))?;

        if let Some(err) = response.get("error") {
            return Err(anyhow!("{method} rpc error: {err}"));
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow!("{method} response missing result"))
    }

    /// Deployed bytecode at the address, `0x` when none.
    pub async fn get_code(&self, address: &str) -> Result<String> {
        let result = self
            .request("eth_getCode", json!([address, "latest"]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("eth_getCode returned non-string result"))
    }

    /// Read-only call; `data` is the 4-byte selector plus arguments.
    pub async fn call(&self, to: &str, data: &str) -> Result<String> {
        let result = self
            .request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("eth_call returned non-string result"))
    }
}
