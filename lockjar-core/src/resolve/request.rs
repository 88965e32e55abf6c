// lockjar-core/src/resolve/request.rs
use std::collections::{BTreeMap, BTreeSet};

use lockjar_common::dependency::Exclusion;
use lockjar_common::model::Coordinates;

/// Active exclusions, each with a note on who declared it.
pub(crate) type Exclusions = BTreeMap<Exclusion, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootArtifact {
    pub coordinates: Coordinates,
    pub exclusions: BTreeSet<Exclusion>,
}

/// Everything one resolution run starts from.
#[derive(Debug, Clone, Default)]
pub struct ResolutionRequest {
    pub repositories: Vec<String>,
    pub artifacts: Vec<RootArtifact>,
    /// Bill-of-materials descriptors whose managed versions pin matching
    /// artifacts anywhere in the graph.
    pub boms: Vec<Coordinates>,
    pub global_exclusions: BTreeSet<Exclusion>,
}

impl ResolutionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_roots(roots: impl IntoIterator<Item = Coordinates>, repositories: &[String]) -> Self {
        let mut request = Self::new();
        for repo in repositories {
            request.add_repository(repo);
        }
        for root in roots {
            request.add_artifact(root, std::iter::empty::<Exclusion>());
        }
        request
    }

    pub fn add_repository(&mut self, url: impl Into<String>) -> &mut Self {
        let url = url.into();
        if !self.repositories.contains(&url) {
            self.repositories.push(url);
        }
        self
    }

    /// Adds a root. A second root with the same coordinates only merges its
    /// exclusions into the first.
    pub fn add_artifact(
        &mut self,
        coordinates: Coordinates,
        exclusions: impl IntoIterator<Item = Exclusion>,
    ) -> &mut Self {
        match self
            .artifacts
            .iter_mut()
            .find(|root| root.coordinates == coordinates)
        {
            Some(existing) => existing.exclusions.extend(exclusions),
            None => self.artifacts.push(RootArtifact {
                coordinates,
                exclusions: exclusions.into_iter().collect(),
            }),
        }
        self
    }

    pub fn add_bom(&mut self, bom: Coordinates) -> &mut Self {
        if !self.boms.contains(&bom) {
            self.boms.push(bom);
        }
        self
    }

    pub fn exclude(&mut self, exclusion: Exclusion) -> &mut Self {
        self.global_exclusions.insert(exclusion);
        self
    }

    pub fn root_keys(&self) -> BTreeSet<String> {
        self.artifacts
            .iter()
            .map(|root| root.coordinates.key())
            .collect()
    }

    /// Global exclusions plus every root's own, keyed to where they came from.
    pub(crate) fn initial_exclusions(&self) -> Exclusions {
        let mut all: Exclusions = self
            .global_exclusions
            .iter()
            .map(|x| (x.clone(), "excluded for the whole request".to_string()))
            .collect();
        for root in &self.artifacts {
            for x in &root.exclusions {
                all.entry(x.clone())
                    .or_insert_with(|| format!("declared on root {}", root.coordinates));
            }
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_roots_merge_exclusions() {
        let mut request = ResolutionRequest::new();
        let app = Coordinates::jar("g", "app", "1.0");
        request
            .add_repository("https://r/")
            .add_repository("https://r/")
            .add_artifact(app.clone(), [Exclusion::new("x", "y")])
            .add_artifact(app, [Exclusion::new("x", "z")])
            .exclude(Exclusion::new("*", "junit"));

        assert_eq!(request.repositories, vec!["https://r/"]);
        assert_eq!(request.artifacts.len(), 1);
        assert_eq!(request.artifacts[0].exclusions.len(), 2);
        let initial = request.initial_exclusions();
        assert_eq!(initial.len(), 3);
        assert_eq!(initial[&Exclusion::new("*", "junit")], "excluded for the whole request");
        assert_eq!(initial[&Exclusion::new("x", "y")], "declared on root g:app:1.0");
        assert_eq!(request.root_keys(), BTreeSet::from(["g:app".to_string()]));
    }
}
