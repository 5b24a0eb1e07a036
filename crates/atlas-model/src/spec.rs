//! Cacheable, timestamped results of expensive chain and explorer fetches.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default staleness threshold for cached specs, in minutes.
pub const DEFAULT_TTL_MINUTES: i64 = 120;

/// Anything stamped with a fetch date and subject to the TTL policy.
pub trait Timestamped {
    fn fetch_date(&self) -> DateTime<Utc>;

    /// Fresh while `now - fetch_date < ttl`.
    fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.fetch_date() < ttl
    }
}

macro_rules! timestamped {
    ($ty:ty) => {
        impl Timestamped for $ty {
            fn fetch_date(&self) -> DateTime<Utc> {
                self.fetch_date
            }
        }
    };
}

/// ABI/bytecode provenance of a contract deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Verified contract ABI, when the explorer has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<JsonValue>,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_block: Option<u64>,
    pub fetch_date: DateTime<Utc>,
}

timestamped!(SourceSpec);

/// Point-in-time snapshot of a contract's zero-argument read-only state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
    /// Method name → JSON-serialized return value.
    #[serde(default)]
    pub facts: BTreeMap<String, String>,
    /// Method name → address, for methods returning a lone address.
    #[serde(default)]
    pub interacts_with: BTreeMap<String, String>,
    /// Method name → role identifier constant, for `*ROLE*` getters.
    #[serde(default)]
    pub role_getters: BTreeMap<String, String>,
    pub fetch_date: DateTime<Utc>,
}

timestamped!(StateSpec);

impl StateSpec {
    pub fn empty(fetch_date: DateTime<Utc>) -> Self {
        Self {
            facts: BTreeMap::new(),
            interacts_with: BTreeMap::new(),
            role_getters: BTreeMap::new(),
            fetch_date,
        }
    }
}

/// Membership and admin wiring of one RBAC role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<String>,
    #[serde(default)]
    pub admin_of: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Role id → grant, as extracted from a subgraph or an ACL plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RbacSpec {
    #[serde(default)]
    pub roles: BTreeMap<String, RoleGrant>,
    pub fetch_date: DateTime<Utc>,
}

timestamped!(RbacSpec);

/// Multisig ownership policy: seats, approval threshold, scheme version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
    pub owner_count: u64,
    pub threshold: u64,
    pub version: String,
    pub fetch_date: DateTime<Utc>,
}

timestamped!(PolicySpec);

/// Bounded transaction lookup result (first/last/creation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxInfo {
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// One NEAR access key as returned by `view_access_key_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessKeySpec {
    pub public_key: String,
    /// Raw permission document. The literal string `"FullAccess"` marks a
    /// full-access key; any other shape is a restricted key.
    pub permission: JsonValue,
    #[serde(default)]
    pub nonce: u64,
}

impl AccessKeySpec {
    pub fn is_full_access(&self) -> bool {
        self.permission.as_str() == Some("FullAccess")
    }
}
