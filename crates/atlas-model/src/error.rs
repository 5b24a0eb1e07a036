//! Error taxonomy for node construction and policy parsing.

use thiserror::Error;

/// Invalid-input errors raised at construction time, before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),
    #[error("invalid role '{0}'")]
    InvalidRole(String),
    #[error("invalid network '{0}'")]
    InvalidNetwork(String),
    #[error("invalid entity reference '{0}'")]
    InvalidReference(String),
}

/// Malformed or unsupported governance data found on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("unsupported vote weight kind '{0}', only RoleWeight is implemented")]
    UnsupportedWeightKind(String),
    #[error("governance role '{role}' carries {count} distinct vote policies")]
    NonUniformVotePolicy { role: String, count: usize },
    #[error("malformed policy document: {0}")]
    MalformedPolicy(String),
}
