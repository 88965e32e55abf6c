// lockjar-core/src/outdated.rs
use std::fmt;

use lockjar_common::error::{LockjarError, Result};
use lockjar_common::event::{Event, EventSink};
use lockjar_common::model::{Coordinates, Version};
use lockjar_common::repository::RepositoryClient;
use tracing::{debug, warn};

const EVENT_SOURCE: &str = "outdated";

/// At least one of `latest` and `pre_release` is set. `pre_release` is only
/// set when it is newer than both `current` and `latest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    pub coordinates: Coordinates,
    pub current: String,
    pub latest: Option<String>,
    pub pre_release: Option<String>,
}

impl fmt::Display for UpdateInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}", self.coordinates.key(), self.current)?;
        if let Some(latest) = &self.latest {
            write!(f, " -> {latest}")?;
        }
        write!(f, "]")?;
        if let Some(pre_release) = &self.pre_release {
            write!(f, " (pre-release: {pre_release})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct KnownVersions {
    release: Option<String>,
    pre_release: Option<String>,
}

fn keep_max(best: &mut Option<String>, candidate: Option<&str>) {
    let Some(candidate) = candidate else { return };
    let better = best
        .as_deref()
        .map_or(true, |b| Version::parse(candidate) > Version::parse(b));
    if better {
        *best = Some(candidate.to_string());
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutdatedReport {
    pub artifact_count: usize,
    pub repositories: Vec<String>,
    /// In input order.
    pub updates: Vec<UpdateInfo>,
}

impl OutdatedReport {
    pub fn header(&self) -> String {
        let mut header = format!(
            "Checking for updates of {} artifacts against the following repositories:",
            self.artifact_count
        );
        for repo in &self.repositories {
            header.push_str("\n\t");
            header.push_str(repo);
        }
        header
    }
}

impl fmt::Display for OutdatedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        writeln!(f)?;
        if self.updates.is_empty() {
            return writeln!(f, "No updates found");
        }
        for update in &self.updates {
            writeln!(f, "{update}")?;
        }
        Ok(())
    }
}

/// Newest release and newest pre-release any repository knows for `coords`.
/// Per repository a release marker is trusted unless it names a pre-release.
fn latest_known(
    coords: &Coordinates,
    repositories: &[String],
    client: &dyn RepositoryClient,
    events: &EventSink,
) -> Result<KnownVersions> {
    let mut known = KnownVersions::default();
    let mut failures = Vec::new();
    let mut answered = false;

    for repo in repositories {
        let target = format!(
            "{}/{}/{}/maven-metadata.xml",
            repo.trim_end_matches('/'),
            coords.group().replace('.', "/"),
            coords.artifact()
        );
        events.emit(Event::download_starting(target.clone()));
        let index = client.version_index(repo, coords.group(), coords.artifact());
        events.emit(Event::download_complete(target));

        match index {
            Ok(index) => {
                answered = true;
                keep_max(&mut known.release, index.newest_release());
                keep_max(&mut known.pre_release, index.newest_pre_release());
            }
            Err(LockjarError::NotFound(_)) => {
                answered = true;
                debug!("No metadata for {} in {}", coords.key(), repo);
            }
            Err(e) => {
                warn!("Metadata lookup for {} in {} failed: {}", coords.key(), repo, e);
                failures.push(format!("{repo}: {e}"));
            }
        }
    }

    if !answered && !failures.is_empty() {
        return Err(LockjarError::RepositoryError(format!(
            "no repository answered for {}: {}",
            coords.key(),
            failures.join("; ")
        )));
    }
    Ok(known)
}

/// Compares each artifact against the newest version across `repositories`.
/// Blank lines are ignored; unparseable coordinates are reported and skipped.
pub fn check_outdated(
    artifacts: &[String],
    repositories: &[String],
    client: &dyn RepositoryClient,
    events: &EventSink,
) -> Result<OutdatedReport> {
    let wanted: Vec<&str> = artifacts
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();

    let mut updates = Vec::new();
    for raw in &wanted {
        let coords = match Coordinates::parse(raw) {
            Ok(c) => c,
            Err(e) => {
                warn!("Skipping '{}': {}", raw, e);
                events.emit(Event::log(EVENT_SOURCE, format!("skipping '{raw}': {e}")));
                continue;
            }
        };

        let known = latest_known(&coords, repositories, client, events)?;
        if known.release.is_none() && known.pre_release.is_none() {
            events.emit(Event::log(
                EVENT_SOURCE,
                format!("no versions of {} are listed", coords.key()),
            ));
            continue;
        }

        let current = Version::parse(coords.version());
        let latest = known.release.filter(|r| Version::parse(r) > current);
        let floor = latest.as_deref().map_or(current, Version::parse);
        let pre_release = known.pre_release.filter(|p| Version::parse(p) > floor);
        if latest.is_some() || pre_release.is_some() {
            updates.push(UpdateInfo {
                current: coords.version().to_string(),
                latest,
                pre_release,
                coordinates: coords,
            });
        }
    }

    Ok(OutdatedReport {
        artifact_count: wanted.len(),
        repositories: repositories.to_vec(),
        updates,
    })
}
