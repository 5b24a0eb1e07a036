//! Subgraph-backed RBAC extraction for AccessControl-style contracts.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use atlas_core::RoleGroupAdapter;
use atlas_model::{RbacSpec, RoleGrant};
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use url::Url;

const ROLES_QUERY: &str = r#"
query roles($contract: String!) {
  accessControlRoles(where: { contract: $contract }) {
    role { id }
    admin { role { id } }
    adminOf { role { id } }
    members { account { id } }
  }
}
"#;

/// Role/membership lookup against an AccessControl subgraph.
pub struct SubgraphRoleGroups {
    http: reqwest::Client,
    url: Url,
}

impl SubgraphRoleGroups {
    pub fn new(subgraph_url: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            url: Url::parse(subgraph_url).context("invalid subgraph url")?,
        })
    }

    fn parse_roles(payload: &JsonValue) -> BTreeMap<String, RoleGrant> {
        let mut roles = BTreeMap::new();
        let rows = payload
            .pointer("/data/accessControlRoles")
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default();
        for row in rows {
            let Some(role_id) = row.pointer("/role/id").and_then(JsonValue::as_str) else {
                continue;
            };
            let admin = row
                .pointer("/admin/role/id")
                .and_then(JsonValue::as_str)
                .map(str::to_string);
            let admin_of = row
                .get("adminOf")
                .and_then(JsonValue::as_array)
                .map(|rows| {
                    rows.iter()
                        .filter_map(|r| r.pointer("/role/id").and_then(JsonValue::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let members = row
                .get("members")
                .and_then(JsonValue::as_array)
                .map(|rows| {
                    rows.iter()
                        .filter_map(|r| r.pointer("/account/id").and_then(JsonValue::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            roles.insert(
                role_id.to_string(),
                RoleGrant {
                    admin,
                    admin_of,
                    members,
                },
            );
        }
        roles
    }
}

#[async_trait]
impl RoleGroupAdapter for SubgraphRoleGroups {
    async fn fetch_rbac(&self, address: &str) -> Result<Option<RbacSpec>> {
        let body = json!({
            "query": ROLES_QUERY,
            "variables": { "contract": address.to_lowercase() },
        });
        let response: JsonValue = self
            .http
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .context("subgraph transport failure")?
            .error_for_status()
            .context("subgraph http error")?
            .json()
            .await
            .context("subgraph returned non-JSON payload")?;

        let roles = Self::parse_roles(&response);
        if roles.is_empty() {
            return Ok(None);
        }
        tracing::debug!(
            target: "atlas_adapter_evm",
            address,
            roles = roles.len(),
            "fetched RBAC roles from subgraph"
        );
        Ok(Some(RbacSpec {
            roles,
            fetch_date: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subgraph_role_rows() {
        let payload = json!({
            "data": {
                "accessControlRoles": [
                    {
                        "role": { "id": "0x00" },
                        "admin": { "role": { "id": "0x00" } },
                        "adminOf": [ { "role": { "id": "0xminter" } } ],
                        "members": [
                            { "account": { "id": "0xaaa" } },
                            { "account": { "id": "0xbbb" } }
                        ]
                    },
                    {
                        "role": { "id": "0xminter" },
                        "admin": { "role": { "id": "0x00" } },
                        "adminOf": [],
                        "members": []
                    }
                ]
            }
        });
        let roles = SubgraphRoleGroups::parse_roles(&payload);
        assert_eq!(roles.len(), 2);
        let root = &roles["0x00"];
        assert_eq!(root.admin.as_deref(), Some("0x00"));
        assert_eq!(root.admin_of, vec!["0xminter"]);
        assert_eq!(root.members, vec!["0xaaa", "0xbbb"]);
    }

    #[test]
    fn malformed_payload_yields_no_roles() {
        assert!(SubgraphRoleGroups::parse_roles(&json!({ "data": null })).is_empty());
        assert!(SubgraphRoleGroups::parse_roles(&json!("garbage")).is_empty());
    }
}
