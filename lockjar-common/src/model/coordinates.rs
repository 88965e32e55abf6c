// lockjar-common/src/model/coordinates.rs
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{LockjarError, Result};

pub const DEFAULT_PACKAGING: &str = "jar";

const MANAGED_PLACEHOLDER: &str = "0";

/// Maven-style identity of an artifact, written positionally as
/// `group:artifact[:packaging[:classifier]]:version`.
///
/// Default packaging (`jar`) and classifier (empty, with `jar` treated as
/// empty) are normalized at construction, so `g:a:1.0`, `g:a:jar:jar:1.0`
/// and `g:a:::1.0` are the same value and hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinates {
    group: String,
    artifact: String,
    packaging: String,
    classifier: String,
    version: String,
}

impl Coordinates {
    /// Builds coordinates from parts. The version may be empty (an edge target
    /// whose version comes from dependency management) or a range.
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        packaging: impl AsRef<str>,
        classifier: impl AsRef<str>,
        version: impl Into<String>,
    ) -> Self {
        let packaging = packaging.as_ref().trim();
        let classifier = classifier.as_ref().trim();
        Self {
            group: group.into(),
            artifact: artifact.into(),
            packaging: if packaging.is_empty() {
                DEFAULT_PACKAGING.to_string()
            } else {
                packaging.to_string()
            },
            classifier: if classifier == DEFAULT_PACKAGING {
                String::new()
            } else {
                classifier.to_string()
            },
            version: version.into(),
        }
    }

    pub fn jar(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::new(group, artifact, DEFAULT_PACKAGING, "", version)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.trim().split(':').collect();
        if parts.len() < 2 || parts.len() > 5 {
            return Err(LockjarError::ParseError(
                "coordinates",
                format!(
                    "bad artifact coordinates '{raw}', expected \
                     group:artifact[:packaging[:classifier]]:version"
                ),
            ));
        }

        let (packaging, classifier, version) = match parts.len() {
            2 => ("", "", ""),
            3 => ("", "", parts[2]),
            4 => (parts[2], "", parts[3]),
            _ => (parts[2], parts[3], parts[4]),
        };

        for (field, value) in [
            ("group", parts[0]),
            ("artifact", parts[1]),
            ("version", version),
        ] {
            if value.trim().is_empty() {
                return Err(LockjarError::ParseError(
                    "coordinates",
                    format!("'{raw}' has an empty {field}"),
                ));
            }
        }

        Ok(Self::new(
            parts[0].trim(),
            parts[1].trim(),
            packaging,
            classifier,
            version.trim(),
        ))
    }

    /// Parses a dependency target, whose version may be left out (`g:a`) or
    /// left empty (`g:a:pom:`) for dependency management to fill in.
    pub fn parse_target(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() == 2 {
            return Self::parse(&format!("{trimmed}:{MANAGED_PLACEHOLDER}"))
                .map(|c| c.with_version(""));
        }
        if parts.len() >= 3 && parts.last().is_some_and(|v| v.trim().is_empty()) {
            let mut filled = parts.clone();
            if let Some(last) = filled.last_mut() {
                *last = MANAGED_PLACEHOLDER;
            }
            return Self::parse(&filled.join(":")).map(|c| c.with_version(""));
        }
        Self::parse(trimmed)
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn packaging(&self) -> &str {
        &self.packaging
    }

    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn has_version(&self) -> bool {
        !self.version.is_empty()
    }

    /// `group:artifact`, the identity used for conflict resolution.
    pub fn key(&self) -> String {
        format!("{}:{}", self.group, self.artifact)
    }

    /// The classifier as used in lock-file digest maps.
    pub fn classifier_or_default(&self) -> &str {
        if self.classifier.is_empty() {
            DEFAULT_PACKAGING
        } else {
            &self.classifier
        }
    }

    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }

    pub fn with_packaging(&self, packaging: &str) -> Self {
        Self::new(
            self.group.clone(),
            self.artifact.clone(),
            packaging,
            &self.classifier,
            self.version.clone(),
        )
    }

    /// Layout path inside a Maven repository:
    /// `org/example/lib/1.0/lib-1.0[-classifier].packaging`.
    pub fn repository_path(&self) -> String {
        let mut path = format!(
            "{}/{}/{}/{}-{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.artifact,
            self.version
        );
        if !self.classifier.is_empty() {
            path.push('-');
            path.push_str(&self.classifier);
        }
        path.push('.');
        path.push_str(&self.packaging);
        path
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)?;
        if !self.classifier.is_empty() {
            write!(f, ":{}:{}", self.packaging, self.classifier)?;
        } else if self.packaging != DEFAULT_PACKAGING {
            write!(f, ":{}", self.packaging)?;
        }
        if !self.version.is_empty() {
            write!(f, ":{}", self.version)?;
        }
        Ok(())
    }
}

impl FromStr for Coordinates {
    type Err = LockjarError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Coordinates::parse(s)
    }
}

impl Ord for Coordinates {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string()
            .cmp(&other.to_string())
            .then_with(|| {
                (&self.packaging, &self.classifier, &self.version).cmp(&(
                    &other.packaging,
                    &other.classifier,
                    &other.version,
                ))
            })
    }
}

impl PartialOrd for Coordinates {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Coordinates {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Coordinates {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Coordinates::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use super::*;

    fn hash_of(c: &Coordinates) -> u64 {
        let mut hasher = DefaultHasher::new();
        c.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn default_packaging_and_classifier_forms_are_equal() {
        let short = Coordinates::parse("g:a:1.0").unwrap();
        let explicit = Coordinates::parse("g:a:jar:jar:1.0").unwrap();
        let elided = Coordinates::parse("g:a:::1.0").unwrap();

        assert_eq!(short, explicit);
        assert_eq!(short, elided);
        assert_eq!(hash_of(&short), hash_of(&explicit));
        assert_eq!(hash_of(&short), hash_of(&elided));
    }

    #[test]
    fn positional_fields() {
        let c = Coordinates::parse("com.example:lib:aar:sources:2.1").unwrap();
        assert_eq!(c.group(), "com.example");
        assert_eq!(c.artifact(), "lib");
        assert_eq!(c.packaging(), "aar");
        assert_eq!(c.classifier(), "sources");
        assert_eq!(c.version(), "2.1");

        let pom = Coordinates::parse("com.example:bom:pom:3.0").unwrap();
        assert_eq!(pom.packaging(), "pom");
        assert_eq!(pom.classifier(), "");
    }

    #[test]
    fn rejects_bad_field_counts_and_empty_fields() {
        for bad in ["g", "g:a:p:c:v:x", "g:a", ":a:1.0", "g::1.0", "g:a:jar:"] {
            assert!(Coordinates::parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn display_round_trips() {
        for raw in ["g:a:1.0", "g:a:pom:1.0", "g:a:jar:sources:1.0", "g:a:aar:x:[1.0,2.0)"] {
            let c = Coordinates::parse(raw).unwrap();
            assert_eq!(c.to_string(), raw);
            assert_eq!(Coordinates::parse(&c.to_string()).unwrap(), c);
        }
    }

    #[test]
    fn repository_layout_path() {
        let c = Coordinates::parse("org.example.deep:lib:jar:sources:1.2").unwrap();
        assert_eq!(
            c.repository_path(),
            "org/example/deep/lib/1.2/lib-1.2-sources.jar"
        );
        assert_eq!(
            Coordinates::parse("g.h:p:pom:3").unwrap().repository_path(),
            "g/h/p/3/p-3.pom"
        );
    }

    #[test]
    fn dependency_targets_may_omit_the_version() {
        let bare = Coordinates::parse_target("g:a").unwrap();
        assert_eq!(bare, Coordinates::jar("g", "a", ""));
        assert!(!bare.has_version());
        assert_eq!(bare.to_string(), "g:a");

        let pom = Coordinates::parse_target("g:a:pom:").unwrap();
        assert_eq!(pom.packaging(), "pom");
        assert!(!pom.has_version());

        let ranged = Coordinates::parse_target("g:a:[1.0,2.0)").unwrap();
        assert_eq!(ranged.version(), "[1.0,2.0)");
        assert!(Coordinates::parse_target("g").is_err());
    }

    #[test]
    fn keys() {
        let c = Coordinates::parse("g:a:aar:1.0").unwrap();
        assert_eq!(c.key(), "g:a");
        assert_eq!(c.classifier_or_default(), "jar");
    }
}
