use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use lockjar_common::catalog::{ArtifactEntry, Catalog, CatalogDependency};
use lockjar_common::dependency::{Exclusion, NodeStatus, Scope};
use lockjar_common::error::{LockjarError, Result};
use lockjar_common::event::{DownloadStage, Event, EventSink, RecordingListener};
use lockjar_common::model::Coordinates;
use lockjar_common::repository::{Descriptor, RepositoryClient, VersionIndex};
use lockjar_core::lockfile;
use lockjar_core::resolve::{FirstRequested, ResolutionRequest, Resolver, ResolverOptions};

const REPO: &str = "https://repo.example/m2/";

fn c(raw: &str) -> Coordinates {
    Coordinates::parse(raw).unwrap()
}

fn dep(raw: &str) -> CatalogDependency {
    CatalogDependency {
        coordinates: raw.to_string(),
        ..CatalogDependency::default()
    }
}

fn scoped(raw: &str, scope: Scope) -> CatalogDependency {
    CatalogDependency {
        scope,
        ..dep(raw)
    }
}

fn publish(catalog: &mut Catalog, raw: &str, dependencies: Vec<CatalogDependency>) {
    publish_entry(
        catalog,
        raw,
        ArtifactEntry {
            dependencies,
            ..ArtifactEntry::default()
        },
    );
}

fn publish_entry(catalog: &mut Catalog, raw: &str, mut entry: ArtifactEntry) {
    let coords = c(raw);
    entry.packaging = coords.packaging().to_string();
    if coords.packaging() != "pom" {
        entry
            .shasums
            .insert("jar".to_string(), format!("sha-{}", coords.key()));
    }
    catalog.add_artifact(REPO, &coords, entry);
}

/// Counts descriptor fetches per `group:artifact:version`.
struct Counting {
    inner: Catalog,
    fetches: Mutex<HashMap<String, usize>>,
}

impl Counting {
    fn new(inner: Catalog) -> Self {
        Self {
            inner,
            fetches: Mutex::new(HashMap::new()),
        }
    }

    fn counts(&self) -> HashMap<String, usize> {
        self.fetches.lock().unwrap().clone()
    }
}

impl RepositoryClient for Counting {
    fn fetch_from(&self, repository: &str, coords: &Coordinates) -> Result<Descriptor> {
        let key = format!("{}:{}", coords.key(), coords.version());
        *self.fetches.lock().unwrap().entry(key).or_default() += 1;
        self.inner.fetch_from(repository, coords)
    }

    fn version_index(&self, repository: &str, group: &str, artifact: &str) -> Result<VersionIndex> {
        self.inner.version_index(repository, group, artifact)
    }

    fn artifact_sha256(&self, repository: &str, coords: &Coordinates) -> Result<Option<String>> {
        self.inner.artifact_sha256(repository, coords)
    }
}

fn request(roots: &[&str]) -> ResolutionRequest {
    let mut request = ResolutionRequest::new();
    request.add_repository(REPO);
    for root in roots {
        request.add_artifact(c(root), Vec::new());
    }
    request
}

fn resolver(client: Arc<dyn RepositoryClient>, options: ResolverOptions) -> (Resolver, Arc<RecordingListener>) {
    let recorder = Arc::new(RecordingListener::new());
    let resolver = Resolver::new(client, options, EventSink::new(recorder.clone()));
    (resolver, recorder)
}

fn options(workers: usize) -> ResolverOptions {
    ResolverOptions {
        workers,
        ..ResolverOptions::default()
    }
}

fn log_messages(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Log { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

fn diamond() -> Catalog {
    let mut catalog = Catalog::new();
    publish(&mut catalog, "g:app:1", vec![dep("g:a:1"), dep("g:b:1")]);
    publish(&mut catalog, "g:a:1", vec![dep("g:x:1.0")]);
    publish(&mut catalog, "g:b:1", vec![dep("g:x:2.0")]);
    publish(&mut catalog, "g:x:1.0", vec![]);
    publish(&mut catalog, "g:x:2.0", vec![]);
    catalog
}

#[test]
fn highest_version_wins_and_loser_keeps_its_chain() {
    let (resolver, recorder) = resolver(Arc::new(diamond()), options(4));
    let graph = resolver.resolve(&request(&["g:app:1"])).unwrap();

    assert_eq!(graph.nodes.len(), 4);
    assert_eq!(graph.version_of("g:x"), Some("2.0"));

    let record = &graph.conflicts["g:x"];
    assert_eq!(record.chosen, "2.0");
    let rejected: Vec<_> = record.rejected().collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].version, "1.0");
    assert_eq!(rejected[0].chains, vec![vec!["g:app:1".to_string(), "g:a:1".to_string()]]);
    let chosen = record.requested.iter().find(|r| r.version == "2.0").unwrap();
    assert_eq!(chosen.chains, vec![vec!["g:app:1".to_string(), "g:b:1".to_string()]]);

    // The losing requester now points at the winner.
    assert_eq!(graph.nodes["g:a"].direct_edges[0].to, c("g:x:2.0"));
    assert!(log_messages(&recorder.events())
        .iter()
        .any(|m| m == "g:x: 2.0 chosen over 1.0"));
}

#[test]
fn conflict_policy_is_swappable() {
    let options = ResolverOptions {
        policy: Arc::new(FirstRequested),
        ..options(2)
    };
    let (resolver, _) = resolver(Arc::new(diamond()), options);
    let graph = resolver.resolve(&request(&["g:app:1"])).unwrap();
    assert_eq!(graph.version_of("g:x"), Some("1.0"));
}

#[test]
fn requester_exclusion_applies_across_paths_and_is_logged() {
    let mut catalog = Catalog::new();
    publish(
        &mut catalog,
        "g:app:1",
        vec![
            CatalogDependency {
                exclusions: vec!["g:x".to_string()],
                ..dep("g:a:1")
            },
            dep("g:b:1"),
        ],
    );
    publish(&mut catalog, "g:a:1", vec![dep("g:x:1")]);
    publish(&mut catalog, "g:b:1", vec![dep("g:x:1")]);
    publish(&mut catalog, "g:x:1", vec![]);

    let (resolver, recorder) = resolver(Arc::new(catalog), options(3));
    let graph = resolver.resolve(&request(&["g:app:1"])).unwrap();

    assert!(graph.node("g:x").is_none());
    assert_eq!(graph.nodes.len(), 3);
    assert!(graph.omissions.iter().all(|o| o.target == "g:x"));
    assert!(graph
        .omissions
        .iter()
        .any(|o| o.chain == vec!["g:app:1".to_string(), "g:b:1".to_string()]));
    assert!(log_messages(&recorder.events())
        .iter()
        .any(|m| m == "g:x omitted, excluded by g:x (declared on g:app:1 -> g:a)"));
}

/// Transport failure for one `group:artifact`, everything else served.
struct Unreachable {
    inner: Catalog,
    key: &'static str,
}

impl RepositoryClient for Unreachable {
    fn fetch_from(&self, repository: &str, coords: &Coordinates) -> Result<Descriptor> {
        if coords.key() == self.key {
            return Err(LockjarError::RepositoryError(format!("{repository} timed out")));
        }
        self.inner.fetch_from(repository, coords)
    }

    fn version_index(&self, repository: &str, group: &str, artifact: &str) -> Result<VersionIndex> {
        self.inner.version_index(repository, group, artifact)
    }

    fn artifact_sha256(&self, repository: &str, coords: &Coordinates) -> Result<Option<String>> {
        self.inner.artifact_sha256(repository, coords)
    }
}

fn excluding(raw: &str, rule: &str) -> CatalogDependency {
    CatalogDependency {
        exclusions: vec![rule.to_string()],
        ..dep(raw)
    }
}

#[test]
fn excluded_subtrees_are_not_fetched() {
    let mut catalog = Catalog::new();
    publish(&mut catalog, "g:app:1", vec![excluding("g:a:1", "g:ghost")]);
    publish(&mut catalog, "g:a:1", vec![dep("g:ghost:1")]);

    let client = Arc::new(Counting::new(catalog));
    let options = ResolverOptions {
        missing_as_fatal: true,
        ..options(2)
    };
    let (resolver, recorder) = resolver(client.clone(), options);
    let graph = resolver.resolve(&request(&["g:app:1"])).unwrap();

    assert_eq!(graph.nodes.keys().collect::<Vec<_>>(), vec!["g:a", "g:app"]);
    assert!(!client.counts().contains_key("g:ghost:1"));
    assert_eq!(graph.omissions.len(), 1);
    assert_eq!(graph.omissions[0].target, "g:ghost");
    assert_eq!(graph.omissions[0].chain, vec!["g:app:1".to_string(), "g:a:1".to_string()]);
    assert!(!log_messages(&recorder.events())
        .iter()
        .any(|m| m.contains("was not found")));
}

#[test]
fn failures_of_excluded_artifacts_do_not_abort() {
    let mut catalog = Catalog::new();
    publish(
        &mut catalog,
        "g:app:1",
        vec![excluding("g:a:1", "g:ghost"), dep("g:b:1"), dep("g:c:1")],
    );
    publish(&mut catalog, "g:a:1", vec![]);
    publish(&mut catalog, "g:b:1", vec![dep("g:ghost:1")]);
    publish(&mut catalog, "g:c:1", vec![dep("g:down:1")]);
    publish(&mut catalog, "g:down:1", vec![]);

    // ghost is missing and down is unreachable, but both are excluded.
    let missing_fatal = ResolverOptions {
        missing_as_fatal: true,
        ..options(2)
    };
    let mut request = request(&["g:app:1"]);
    request.exclude(Exclusion::new("g", "down"));
    let client = Arc::new(Unreachable {
        inner: catalog,
        key: "g:down",
    });
    let (excluded, _) = resolver(client.clone(), missing_fatal.clone());
    let graph = excluded.resolve(&request).unwrap();
    assert_eq!(
        graph.nodes.keys().collect::<Vec<_>>(),
        vec!["g:a", "g:app", "g:b", "g:c"]
    );

    // Without the exclusion the unreachable artifact is fatal again.
    let (included, _) = resolver(client, missing_fatal);
    request.global_exclusions.clear();
    let err = included.resolve(&request).unwrap_err();
    assert!(matches!(err, LockjarError::RepositoryError(_)));
}

#[test]
fn exclusions_declared_by_a_rejected_version_are_dropped() {
    let mut catalog = Catalog::new();
    publish(&mut catalog, "g:app:1", vec![dep("g:a:1"), dep("g:b:1")]);
    publish(&mut catalog, "g:a:1", vec![dep("g:x:1")]);
    publish(&mut catalog, "g:b:1", vec![dep("g:x:2")]);
    publish(&mut catalog, "g:x:1", vec![excluding("g:z:1", "g:y")]);
    publish(&mut catalog, "g:x:2", vec![dep("g:z:1")]);
    publish(&mut catalog, "g:z:1", vec![dep("g:y:1")]);
    publish(&mut catalog, "g:y:1", vec![]);

    let (resolver, _) = resolver(Arc::new(catalog), options(3));
    let graph = resolver.resolve(&request(&["g:app:1"])).unwrap();

    assert_eq!(graph.version_of("g:x"), Some("2"));
    assert_eq!(graph.version_of("g:y"), Some("1"));
    assert!(graph.omissions.is_empty());
    assert_eq!(graph.nodes["g:z"].direct_edges[0].to, c("g:y:1"));
}

#[test]
fn global_exclusions_use_wildcards() {
    let mut request = request(&["g:app:1"]);
    request.exclude(Exclusion::new("g", "*"));

    let (resolver, _) = resolver(Arc::new(diamond()), options(2));
    let graph = resolver.resolve(&request).unwrap();
    assert_eq!(graph.nodes.keys().collect::<Vec<_>>(), vec!["g:app"]);
}

#[test]
fn scopes_follow_maven_rules() {
    let mut catalog = Catalog::new();
    publish(
        &mut catalog,
        "g:app:1",
        vec![
            dep("g:a:1"),
            scoped("g:junit:4", Scope::Test),
            scoped("g:servlet:3", Scope::Provided),
            scoped("g:tool:1", Scope::Test),
        ],
    );
    publish(
        &mut catalog,
        "g:a:1",
        vec![
            scoped("g:rt:1", Scope::Runtime),
            scoped("g:container:1", Scope::Provided),
            CatalogDependency {
                optional: true,
                ..dep("g:opt:1")
            },
            scoped("g:bom:pom:1", Scope::Import),
        ],
    );
    for leaf in ["g:junit:4", "g:servlet:3", "g:tool:1", "g:rt:1", "g:container:1", "g:opt:1"] {
        publish(&mut catalog, leaf, vec![]);
    }

    let (resolver, _) = resolver(Arc::new(catalog), options(2));
    let graph = resolver
        .resolve(&request(&["g:app:1", "g:tool:1"]))
        .unwrap();

    let keys: Vec<&str> = graph.nodes.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["g:a", "g:app", "g:rt", "g:servlet", "g:tool"]);
    let app_deps: Vec<String> = graph.nodes["g:app"]
        .direct_edges
        .iter()
        .map(|e| e.to.key())
        .collect();
    assert_eq!(app_deps, vec!["g:a", "g:servlet", "g:tool"]);
}

#[test]
fn missing_descriptor_becomes_a_leaf_with_a_warning() {
    let mut catalog = Catalog::new();
    publish(&mut catalog, "g:app:1", vec![dep("g:ghost:1"), dep("g:a:1")]);
    publish(&mut catalog, "g:a:1", vec![]);

    let (resolver, recorder) = resolver(Arc::new(catalog), options(2));
    let graph = resolver.resolve(&request(&["g:app:1"])).unwrap();

    let ghost = graph.node("g:ghost").unwrap();
    assert_eq!(ghost.status, NodeStatus::Missing);
    assert!(ghost.direct_edges.is_empty());
    assert_eq!(ghost.sha256, None);
    assert_eq!(graph.missing().count(), 1);
    assert!(log_messages(&recorder.events())
        .contains(&"g:ghost:1 was not found; treating it as a leaf".to_string()));
}

#[test]
fn missing_descriptor_is_fatal_when_configured() {
    let mut catalog = Catalog::new();
    publish(&mut catalog, "g:app:1", vec![dep("g:ghost:1")]);

    let options = ResolverOptions {
        missing_as_fatal: true,
        ..options(2)
    };
    let (resolver, _) = resolver(Arc::new(catalog), options);
    let err = resolver.resolve(&request(&["g:app:1"])).unwrap_err();

    assert!(matches!(err, LockjarError::ResolutionError(_)));
    assert_eq!(
        err.to_string(),
        "Resolution Error: could not resolve g:ghost:1 because no repository has a descriptor \
         for it (requested via g:app:1)"
    );
}

#[test]
fn ranges_pick_the_highest_available_version() {
    let mut catalog = Catalog::new();
    publish(&mut catalog, "g:app:1", vec![dep("g:lib:[1.0,2.0)")]);
    for v in ["1.0", "1.5", "2.0"] {
        publish(&mut catalog, &format!("g:lib:{v}"), vec![]);
    }

    let (resolver, _) = resolver(Arc::new(catalog), options(2));
    let graph = resolver.resolve(&request(&["g:app:1"])).unwrap();
    assert_eq!(graph.version_of("g:lib"), Some("1.5"));
}

#[test]
fn unsatisfiable_range_aborts_the_run() {
    let mut catalog = Catalog::new();
    publish(&mut catalog, "g:app:1", vec![dep("g:lib:[3.0,4.0)")]);
    publish(&mut catalog, "g:lib:1.0", vec![]);

    let (resolver, _) = resolver(Arc::new(catalog), options(2));
    let err = resolver.resolve(&request(&["g:app:1"])).unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, LockjarError::ResolutionError(_)));
    assert!(message.contains("could not resolve g:lib:[3.0,4.0) because no available version satisfies"));
    assert!(message.ends_with("(requested via g:app:1)"));
}

#[test]
fn shared_descriptors_are_fetched_once() {
    let mut catalog = Catalog::new();
    let members: Vec<String> = (1..=6).map(|i| format!("g:m{i}:1")).collect();
    publish(
        &mut catalog,
        "g:app:1",
        members.iter().map(|m| dep(m)).collect(),
    );
    publish_entry(
        &mut catalog,
        "g:grand:pom:1",
        ArtifactEntry {
            managed: BTreeMap::from([("g:shared".to_string(), "3.0".to_string())]),
            ..ArtifactEntry::default()
        },
    );
    publish_entry(
        &mut catalog,
        "g:parent:pom:1",
        ArtifactEntry {
            parent: Some("g:grand:pom:1".to_string()),
            ..ArtifactEntry::default()
        },
    );
    for member in &members {
        publish_entry(
            &mut catalog,
            member,
            ArtifactEntry {
                parent: Some("g:parent:pom:1".to_string()),
                dependencies: vec![dep("g:shared")],
                ..ArtifactEntry::default()
            },
        );
    }
    publish(&mut catalog, "g:shared:3.0", vec![]);

    let client = Arc::new(Counting::new(catalog));
    let (resolver, _) = resolver(client.clone(), options(4));
    let graph = resolver.resolve(&request(&["g:app:1"])).unwrap();

    assert_eq!(graph.version_of("g:shared"), Some("3.0"));
    let counts = client.counts();
    assert_eq!(counts["g:parent:1"], 1);
    assert_eq!(counts["g:grand:1"], 1);
    assert_eq!(counts["g:shared:3.0"], 1);
    assert!(counts.values().all(|&n| n == 1), "{counts:?}");
}

#[test]
fn bom_versions_override_transitive_requests() {
    let mut catalog = diamond();
    publish_entry(
        &mut catalog,
        "g:platform:pom:7",
        ArtifactEntry {
            managed: BTreeMap::from([("g:x".to_string(), "5.0".to_string())]),
            ..ArtifactEntry::default()
        },
    );
    publish(&mut catalog, "g:x:5.0", vec![]);

    let mut request = request(&["g:app:1"]);
    request.add_bom(c("g:platform:pom:7"));
    let (resolver, _) = resolver(Arc::new(catalog), options(2));
    let graph = resolver.resolve(&request).unwrap();

    assert_eq!(graph.version_of("g:x"), Some("5.0"));
    assert!(graph.conflicts.get("g:x").is_none());
}

#[test]
fn cycles_in_descriptors_are_broken() {
    let mut catalog = Catalog::new();
    publish(&mut catalog, "g:a:1", vec![dep("g:b:1")]);
    publish(&mut catalog, "g:b:1", vec![dep("g:a:1")]);

    let (resolver, recorder) = resolver(Arc::new(catalog), options(2));
    let graph = resolver.resolve(&request(&["g:a:1"])).unwrap();

    assert_eq!(graph.broken_cycles, vec![("g:b".to_string(), "g:a".to_string())]);
    assert!(graph.nodes["g:b"].direct_edges.is_empty());
    assert!(log_messages(&recorder.events())
        .iter()
        .any(|m| m.contains("dependency cycle broken")));
}

#[test]
fn digests_are_attached_except_for_aggregators() {
    let mut catalog = Catalog::new();
    publish(&mut catalog, "g:app:1", vec![dep("g:agg:pom:1")]);
    publish(&mut catalog, "g:agg:pom:1", vec![dep("g:lib:1")]);
    publish(&mut catalog, "g:lib:1", vec![]);

    let (resolver, _) = resolver(Arc::new(catalog), options(2));
    let graph = resolver.resolve(&request(&["g:app:1"])).unwrap();

    assert_eq!(graph.nodes["g:lib"].sha256.as_deref(), Some("sha-g:lib"));
    assert_eq!(graph.nodes["g:agg"].sha256, None);
    assert!(graph.nodes["g:agg"].is_aggregator());

    let doc = lockfile::render_graph(&[REPO.to_string()], &graph);
    assert_eq!(doc["artifacts"]["g:agg"]["shasums"], serde_json::json!({"jar": null}));
    assert_eq!(doc["artifacts"]["g:lib"]["shasums"]["jar"], "sha-g:lib");
}

#[test]
fn events_arrive_in_phase_and_download_order() {
    let (resolver, recorder) = resolver(Arc::new(diamond()), options(4));
    resolver.resolve(&request(&["g:app:1"])).unwrap();
    let events = recorder.events();

    let phases: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            Event::Phase { name } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(phases, vec!["resolving", "downloading"]);

    let mut started: HashMap<&str, usize> = HashMap::new();
    for (i, event) in events.iter().enumerate() {
        if let Event::Download { stage, target } = event {
            match stage {
                DownloadStage::Starting => {
                    started.insert(target, i);
                }
                DownloadStage::Complete => {
                    assert!(started.contains_key(target.as_str()), "{target} completed before starting");
                }
            }
        }
    }
    assert!(started.contains_key("g:x:2.0"));
}

#[test]
fn transport_failure_aborts_without_a_partial_graph() {
    let mut catalog = diamond();
    catalog.set_unavailable("https://down.example/");

    let mut request = ResolutionRequest::new();
    request.add_repository("https://down.example/");
    request.add_artifact(c("g:app:1"), Vec::new());

    let (resolver, _) = resolver(Arc::new(catalog), options(2));
    let err = resolver.resolve(&request).unwrap_err();
    assert!(matches!(err, LockjarError::RepositoryError(_)));
}

/// Digest lookups for `g:x` blow up inside the client.
struct CrashingDigests(Catalog);

impl RepositoryClient for CrashingDigests {
    fn fetch_from(&self, repository: &str, coords: &Coordinates) -> Result<Descriptor> {
        self.0.fetch_from(repository, coords)
    }

    fn version_index(&self, repository: &str, group: &str, artifact: &str) -> Result<VersionIndex> {
        self.0.version_index(repository, group, artifact)
    }

    fn artifact_sha256(&self, repository: &str, coords: &Coordinates) -> Result<Option<String>> {
        if coords.key() == "g:x" {
            panic!("digest backend crashed");
        }
        self.0.artifact_sha256(repository, coords)
    }
}

#[test]
fn digest_worker_panic_fails_the_run() {
    let (resolver, _) = resolver(Arc::new(CrashingDigests(diamond())), options(2));
    let err = resolver.resolve(&request(&["g:app:1"])).unwrap_err();
    assert!(matches!(err, LockjarError::Generic(_)));
    assert!(err.to_string().contains("g:x:2.0"));
}

#[test]
fn later_repositories_back_up_earlier_ones() {
    let mut catalog = diamond();
    catalog.set_unavailable("https://down.example/");

    let mut request = ResolutionRequest::new();
    request.add_repository("https://down.example/");
    request.add_repository(REPO);
    request.add_artifact(c("g:app:1"), Vec::new());

    let (resolver, _) = resolver(Arc::new(catalog), options(2));
    let graph = resolver.resolve(&request).unwrap();
    let app = &graph.nodes["g:app"];
    assert_eq!(app.served_by.as_deref(), Some(REPO));
    assert_eq!(app.repositories, vec!["https://down.example/".to_string(), REPO.to_string()]);
}

#[test]
fn output_is_identical_across_worker_counts() {
    let render = |workers: usize| {
        let (resolver, _) = resolver(Arc::new(diamond()), options(workers));
        let graph = resolver.resolve(&request(&["g:app:1"])).unwrap();
        let lock = lockfile::to_text(&lockfile::render_graph(&[REPO.to_string()], &graph)).unwrap();
        let rules = lockjar_core::render_rules(&graph.dependency_infos(), &Default::default());
        (lock, rules)
    };
    let single = render(1);
    for workers in [2, 8] {
        assert_eq!(render(workers), single);
    }
}

#[test]
fn convenience_entry_point() {
    let graph = lockjar_core::resolve(
        Arc::new(diamond()),
        [c("g:app:1")],
        &[REPO.to_string()],
        Arc::new(lockjar_core::HighestVersion),
    )
    .unwrap();
    assert_eq!(graph.version_of("g:x"), Some("2.0"));
    assert_eq!(graph.roots, vec![c("g:app:1")]);
}
