//! NEAR JSON-RPC client: account state, code, view calls, access keys.

use anyhow::{anyhow, Context, Result};
use atlas_model::AccessKeySpec;
use base64::Engine;
use serde_json::{json, Value as JsonValue};
use url::Url;

/// Base58 code hash of an account with no deployed contract.
pub const EMPTY_CODE_HASH: &str = "11111111111111111111111111111111";

pub struct NearRpc {
    http: reqwest::Client,
    url: Url,
}

impl NearRpc {
    pub fn new(rpc_url: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            url: Url::parse(rpc_url).context("invalid NEAR rpc url")?,
        })
    }

    async fn query(&self, params: JsonValue) -> Result<JsonValue> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "atlas",
            "method": "query",
            "params": params,
        });
        let response: JsonValue = self
            .http
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .context("near rpc transport failure")?
            .error_for_status()
            .context("near rpc http error")?
            .json()
            .await
            .context("near rpc returned non-JSON payload")?;

        if let Some(err) = response.get("error") {
            return Err(anyhow!("near rpc error: {err}"));
        }
        let result = response
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow!("near rpc response missing result"))?;
        // view errors come back inside the result envelope
        if let Some(err) = result.get("error") {
            return Err(anyhow!("near view error: {err}"));
        }
        Ok(result)
    }

    /// Code hash of the account, or an error when the account is missing.
    pub async fn code_hash(&self, account_id: &str) -> Result<String> {
        let result = self
            .query(json!({
                "request_type": "view_account",
                "finality": "final",
                "account_id": account_id,
            }))
            .await?;
        result
            .get("code_hash")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("view_account response missing code_hash"))
    }

    /// Deployed contract wasm, decoded from base64.
    pub async fn view_code(&self, account_id: &str) -> Result<Vec<u8>> {
        let result = self
            .query(json!({
                "request_type": "view_code",
                "finality": "final",
                "account_id": account_id,
            }))
            .await?;
        let encoded = result
            .get("code_base64")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| anyhow!("view_code response missing code_base64"))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .context("contract code is not valid base64")
    }

    /// Zero-argument view call; returns the raw result bytes.
    pub async fn call_view(&self, account_id: &str, method: &str) -> Result<Vec<u8>> {
        let args = base64::engine::general_purpose::STANDARD.encode("{}");
        let result = self
            .query(json!({
                "request_type": "call_function",
                "finality": "final",
                "account_id": account_id,
                "method_name": method,
                "args_base64": args,
            }))
            .await?;
        let bytes = result
            .get("result")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| anyhow!("call_function response missing result bytes"))?;
        bytes
            .iter()
            .map(|b| {
                b.as_u64()
                    .and_then(|v| u8::try_from(v).ok())
                    .ok_or_else(|| anyhow!("call_function result contains a non-byte value"))
            })
            .collect()
    }

    /// Every access key currently on the account.
    pub async fn access_key_list(&self, account_id: &str) -> Result<Vec<AccessKeySpec>> {
        let result = self
            .query(json!({
                "request_type": "view_access_key_list",
                "finality": "final",
                "account_id": account_id,
            }))
            .await?;
        let keys = result
            .get("keys")
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(keys
            .iter()
            .filter_map(|entry| {
                let public_key = entry.get("public_key")?.as_str()?.to_string();
                let access_key = entry.get("access_key")?;
                Some(AccessKeySpec {
                    public_key,
                    permission: access_key.get("permission").cloned().unwrap_or(JsonValue::Null),
                    nonce: access_key.get("nonce").and_then(JsonValue::as_u64).unwrap_or(0),
                })
            })
            .collect())
    }
}
