//! Vote threshold arithmetic shared by the Safe and AstroDAO policy adapters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// How a governance role weighs votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightKind {
    RoleWeight,
    TokenWeight,
}

impl fmt::Display for WeightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightKind::RoleWeight => f.write_str("RoleWeight"),
            WeightKind::TokenWeight => f.write_str("TokenWeight"),
        }
    }
}

impl FromStr for WeightKind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RoleWeight" => Ok(WeightKind::RoleWeight),
            "TokenWeight" => Ok(WeightKind::TokenWeight),
            other => Err(PolicyError::UnsupportedWeightKind(other.to_string())),
        }
    }
}

/// Approval threshold for `seats` owners under a `(numerator, denominator)`
/// ratio policy: `min(floor(num * seats / den) + 1, seats)`.
///
/// Only seat-counted voting is implemented; token-weighted policies fail
/// explicitly rather than defaulting to anything.
pub fn vote_threshold(
    seats: u64,
    ratio: (u64, u64),
    weight: WeightKind,
) -> Result<u64, PolicyError> {
    if weight != WeightKind::RoleWeight {
        return Err(PolicyError::UnsupportedWeightKind(weight.to_string()));
    }
    let (num, den) = ratio;
    if den == 0 {
        return Err(PolicyError::MalformedPolicy(
            "vote policy ratio has a zero denominator".to_string(),
        ));
    }
    // Widen before multiplying: the numerator comes from untrusted policy
    // documents and may be arbitrarily large.
    let floor = u128::from(num) * u128::from(seats) / u128::from(den);
    Ok((floor + 1).min(u128::from(seats)) as u64)
}
