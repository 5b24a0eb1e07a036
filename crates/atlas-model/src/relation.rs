//! Relationship kinds and their fixed inverse table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Directed relation kinds. Every kind has an inverse; emitting one always
/// implies emitting the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relation {
    Owns,
    OwnedBy,
    Provides,
    ProvidedBy,
    DependsOn,
    DependencyOf,
    Consumes,
    ConsumedBy,
    HasMember,
    MemberOf,
}

impl Relation {
    /// Total inverse mapping.
    pub fn inverse(&self) -> Relation {
        match self {
            Relation::Owns => Relation::OwnedBy,
            Relation::OwnedBy => Relation::Owns,
            Relation::Provides => Relation::ProvidedBy,
            Relation::ProvidedBy => Relation::Provides,
            Relation::DependsOn => Relation::DependencyOf,
            Relation::DependencyOf => Relation::DependsOn,
            Relation::Consumes => Relation::ConsumedBy,
            Relation::ConsumedBy => Relation::Consumes,
            Relation::HasMember => Relation::MemberOf,
            Relation::MemberOf => Relation::HasMember,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Owns => "owns",
            Relation::OwnedBy => "owned-by",
            Relation::Provides => "provides",
            Relation::ProvidedBy => "provided-by",
            Relation::DependsOn => "depends-on",
            Relation::DependencyOf => "dependency-of",
            Relation::Consumes => "consumes",
            Relation::ConsumedBy => "consumed-by",
            Relation::HasMember => "has-member",
            Relation::MemberOf => "member-of",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One directed edge between two node names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub relation: Relation,
    pub source: String,
    pub target: String,
}

/// A matched pair of directed edges. The only way to construct relationships,
/// so a forward edge can never be emitted without its inverse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationPair {
    pub forward: Edge,
    pub backward: Edge,
}

impl RelationPair {
    pub fn new(relation: Relation, source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            forward: Edge {
                relation,
                source: source.clone(),
                target: target.clone(),
            },
            backward: Edge {
                relation: relation.inverse(),
                source: target,
                target: source,
            },
        }
    }
}
