// lockjar-common/src/dependency/definition.rs
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LockjarError, Result};
use crate::model::Coordinates;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Compile,
    Runtime,
    Provided,
    Test,
    /// Pulls in another descriptor's managed versions; never a real dependency.
    Import,
}

impl Scope {
    /// Scopes that flow through to the requester's own dependants.
    pub fn is_transitive(self) -> bool {
        matches!(self, Scope::Compile | Scope::Runtime)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Compile => "compile",
            Scope::Runtime => "runtime",
            Scope::Provided => "provided",
            Scope::Test => "test",
            Scope::Import => "import",
        };
        f.write_str(s)
    }
}

impl FromStr for Scope {
    type Err = LockjarError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "compile" => Ok(Scope::Compile),
            "runtime" => Ok(Scope::Runtime),
            "provided" => Ok(Scope::Provided),
            "test" => Ok(Scope::Test),
            "import" => Ok(Scope::Import),
            other => Err(LockjarError::ParseError(
                "scope",
                format!("unknown dependency scope '{other}'"),
            )),
        }
    }
}

/// A `(group, artifact)` pair to cut out of the graph; either side may be `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Exclusion {
    pub group: String,
    pub artifact: String,
}

impl Exclusion {
    pub const WILDCARD: &'static str = "*";

    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().split_once(':') {
            Some((g, a)) if !g.is_empty() && !a.is_empty() && !a.contains(':') => {
                Ok(Self::new(g, a))
            }
            _ => Err(LockjarError::ParseError(
                "exclusion",
                format!("expected group:artifact, got '{raw}'"),
            )),
        }
    }

    pub fn matches(&self, coords: &Coordinates) -> bool {
        (self.group == Self::WILDCARD || self.group == coords.group())
            && (self.artifact == Self::WILDCARD || self.artifact == coords.artifact())
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

impl FromStr for Exclusion {
    type Err = LockjarError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Exclusion::parse(s)
    }
}

/// One declared dependency of `from`. The target version may be empty
/// (managed elsewhere) or a range until the resolver concretizes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub from: Coordinates,
    pub to: Coordinates,
    pub scope: Scope,
    pub optional: bool,
    pub exclusions: BTreeSet<Exclusion>,
}

impl DependencyEdge {
    pub fn new(from: Coordinates, to: Coordinates) -> Self {
        Self {
            from,
            to,
            scope: Scope::Compile,
            optional: false,
            exclusions: BTreeSet::new(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn excluding(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.insert(exclusion);
        self
    }
}
