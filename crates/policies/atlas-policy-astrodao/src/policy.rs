//! Sputnik v2 policy document parsing.
//!
//! A DAO policy lists roles; the governance role is the `council` group.
//! Votes are weighed per action, but a sane DAO uses one uniform policy
//! across its council's actions; anything else is an error condition that
//! gets reported, not silently resolved.

use std::collections::BTreeSet;

use atlas_model::policy::{vote_threshold, WeightKind};
use atlas_model::PolicyError;
use serde_json::Value as JsonValue;

/// Name of the governance role in Sputnik DAOs.
pub const COUNCIL_ROLE: &str = "council";

/// The council role's member-group addresses.
pub fn council_members(policy: &JsonValue) -> Result<Vec<String>, PolicyError> {
    let role = find_council(policy)?;
    let group = role
        .pointer("/kind/Group")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| {
            PolicyError::MalformedPolicy("council role is not a member group".to_string())
        })?;
    let members = group
        .iter()
        .filter_map(JsonValue::as_str)
        .map(str::to_string)
        .collect::<Vec<_>>();
    if members.len() != group.len() {
        return Err(PolicyError::MalformedPolicy(
            "council group contains non-string members".to_string(),
        ));
    }
    Ok(members)
}

/// Approval threshold for the council under its uniform vote policy.
pub fn council_threshold(policy: &JsonValue, seats: u64) -> Result<u64, PolicyError> {
    let role = find_council(policy)?;

    // Per-action policies on the role itself, falling back to the DAO-wide
    // default when the role declares none.
    let mut distinct: BTreeSet<String> = role
        .get("vote_policy")
        .and_then(JsonValue::as_object)
        .map(|actions| actions.values().map(ToString::to_string).collect())
        .unwrap_or_default();
    if distinct.is_empty() {
        let default = policy.get("default_vote_policy").ok_or_else(|| {
            PolicyError::MalformedPolicy("policy declares no vote policy at all".to_string())
        })?;
        distinct.insert(default.to_string());
    }
    if distinct.len() > 1 {
        return Err(PolicyError::NonUniformVotePolicy {
            role: COUNCIL_ROLE.to_string(),
            count: distinct.len(),
        });
    }

    let vote_policy: JsonValue = serde_json::from_str(distinct.iter().next().expect("non-empty"))
        .expect("re-serialized vote policy");
    let weight: WeightKind = vote_policy
        .get("weight_kind")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| PolicyError::MalformedPolicy("vote policy missing weight_kind".to_string()))?
        .parse()?;

    match vote_policy.get("threshold") {
        // Ratio form: [numerator, denominator].
        Some(JsonValue::Array(ratio)) if ratio.len() == 2 => {
            let num = ratio_part(&ratio[0])?;
            let den = ratio_part(&ratio[1])?;
            vote_threshold(seats, (num, den), weight)
        }
        // Fixed-weight form: an absolute vote count.
        Some(fixed) => {
            if weight != WeightKind::RoleWeight {
                return Err(PolicyError::UnsupportedWeightKind(weight.to_string()));
            }
            Ok(ratio_part(fixed)?.min(seats))
        }
        None => Err(PolicyError::MalformedPolicy(
            "vote policy missing threshold".to_string(),
        )),
    }
}

fn find_council(policy: &JsonValue) -> Result<&JsonValue, PolicyError> {
    let roles = policy
        .get("roles")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| PolicyError::MalformedPolicy("policy has no roles array".to_string()))?;
    roles
        .iter()
        .find(|role| role.get("name").and_then(JsonValue::as_str) == Some(COUNCIL_ROLE))
        .ok_or_else(|| PolicyError::MalformedPolicy("policy has no council role".to_string()))
}

/// Sputnik encodes numbers both as JSON numbers and as decimal strings.
fn ratio_part(value: &JsonValue) -> Result<u64, PolicyError> {
    match value {
        JsonValue::Number(n) => n
            .as_u64()
            .ok_or_else(|| PolicyError::MalformedPolicy(format!("bad ratio part {n}"))),
        JsonValue::String(s) => s
            .parse()
            .map_err(|_| PolicyError::MalformedPolicy(format!("bad ratio part '{s}'"))),
        other => Err(PolicyError::MalformedPolicy(format!(
            "bad ratio part {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dao_policy(vote_policy: JsonValue) -> JsonValue {
        json!({
            "roles": [
                {
                    "name": "all",
                    "kind": "Everyone",
                    "permissions": ["*:AddProposal"]
                },
                {
                    "name": "council",
                    "kind": { "Group": ["alice.near", "bob.near", "carol.near", "dan.near", "erin.near"] },
                    "permissions": ["*:*"],
                    "vote_policy": vote_policy
                }
            ],
            "default_vote_policy": {
                "weight_kind": "RoleWeight",
                "quorum": "0",
                "threshold": [1, 2]
            }
        })
    }

    #[test]
    fn extracts_council_members() {
        let members = council_members(&dao_policy(json!({}))).unwrap();
        assert_eq!(members.len(), 5);
        assert_eq!(members[0], "alice.near");
    }

    #[test]
    fn uniform_ratio_policy_derives_threshold() {
        let policy = dao_policy(json!({
            "transfer": { "weight_kind": "RoleWeight", "quorum": "0", "threshold": [1, 2] },
            "policy":   { "weight_kind": "RoleWeight", "quorum": "0", "threshold": [1, 2] }
        }));
        assert_eq!(council_threshold(&policy, 5).unwrap(), 3);
        assert_eq!(council_threshold(&policy, 4).unwrap(), 3);
    }

    #[test]
    fn empty_role_policy_falls_back_to_default() {
        let policy = dao_policy(json!({}));
        assert_eq!(council_threshold(&policy, 5).unwrap(), 3);
    }

    #[test]
    fn distinct_action_policies_are_an_error() {
        let policy = dao_policy(json!({
            "transfer": { "weight_kind": "RoleWeight", "quorum": "0", "threshold": [1, 2] },
            "policy":   { "weight_kind": "RoleWeight", "quorum": "0", "threshold": [2, 3] }
        }));
        assert!(matches!(
            council_threshold(&policy, 5),
            Err(PolicyError::NonUniformVotePolicy { count: 2, .. })
        ));
    }

    #[test]
    fn token_weight_is_rejected() {
        let policy = dao_policy(json!({
            "transfer": { "weight_kind": "TokenWeight", "quorum": "0", "threshold": [1, 2] }
        }));
        assert!(matches!(
            council_threshold(&policy, 5),
            Err(PolicyError::UnsupportedWeightKind(_))
        ));
    }

    #[test]
    fn fixed_threshold_is_capped_at_seats() {
        let policy = dao_policy(json!({
            "transfer": { "weight_kind": "RoleWeight", "quorum": "0", "threshold": "7" }
        }));
        assert_eq!(council_threshold(&policy, 5).unwrap(), 5);
    }

    #[test]
    fn malformed_documents_report_not_crash() {
        assert!(matches!(
            council_members(&json!({ "roles": "oops" })),
            Err(PolicyError::MalformedPolicy(_))
        ));
        assert!(matches!(
            council_members(&json!({ "roles": [] })),
            Err(PolicyError::MalformedPolicy(_))
        ));
        let no_group = json!({
            "roles": [{ "name": "council", "kind": "Everyone" }]
        });
        assert!(matches!(
            council_members(&no_group),
            Err(PolicyError::MalformedPolicy(_))
        ));
    }
}
