// lockjar-core/src/resolve/discover.rs
// Parallel walk over every requested artifact version. Nothing here decides
// which version wins; it only makes sure every descriptor that settlement
// could look at has been fetched exactly once. A child is skipped when every
// chain reaching its requester declares an exclusion matching it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Sender};
use lockjar_common::dependency::{DependencyEdge, Exclusion, NodeStatus, Scope};
use lockjar_common::error::{LockjarError, Result};
use lockjar_common::event::{Event, EventSink};
use lockjar_common::model::{Coordinates, VersionRange};
use lockjar_common::repository::{Descriptor, FetchedDescriptor, RepositoryClient};
use threadpool::ThreadPool;
use tracing::{debug, error, warn};

use super::flight::SingleFlight;
use super::request::Exclusions;

const MAX_PARENT_DEPTH: usize = 16;
pub(crate) const EVENT_SOURCE: &str = "resolver";

pub(crate) fn gav(coords: &Coordinates) -> String {
    format!("{}:{}", coords.key(), coords.version())
}

/// Scope rules: `import` never, `test` only into a root, `provided` and
/// optional edges only out of a root.
pub(crate) fn follows(edge: &DependencyEdge, requester_is_root: bool, roots: &BTreeSet<String>) -> bool {
    match edge.scope {
        Scope::Import => false,
        Scope::Test => roots.contains(&edge.to.key()),
        Scope::Provided => requester_is_root,
        scope => scope.is_transitive() && (!edge.optional || requester_is_root),
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Child {
    Ready(DependencyEdge),
    /// Reported only if settlement actually reaches the edge.
    Unresolvable { edge: DependencyEdge, reason: String },
}

impl Child {
    pub(crate) fn edge(&self) -> &DependencyEdge {
        match self {
            Child::Ready(edge) | Child::Unresolvable { edge, .. } => edge,
        }
    }
}

/// A failure that belongs to one artifact version. It aborts the run only if
/// settlement visits that version, so excluded or outvoted artifacts never do.
#[derive(Debug, Clone)]
pub(crate) enum Deferred {
    /// No repository has the descriptor and missing artifacts are fatal.
    Missing,
    Failed(LockjarError),
}

#[derive(Debug, Clone)]
pub(crate) struct DiscoveredNode {
    pub coordinates: Coordinates,
    pub status: NodeStatus,
    pub repositories: Vec<String>,
    pub served_by: Option<String>,
    pub children: Vec<Child>,
    pub deferred: Option<Deferred>,
}

pub(crate) struct Discovery {
    client: Arc<dyn RepositoryClient>,
    repositories: Vec<String>,
    events: EventSink,
    descriptors: SingleFlight<FetchedDescriptor>,
    versions: SingleFlight<Vec<String>>,
    pub(crate) bom_managed: BTreeMap<String, String>,
    root_keys: BTreeSet<String>,
    missing_as_fatal: bool,
    cancelled: AtomicBool,
}

impl Discovery {
    pub(crate) fn new(
        client: Arc<dyn RepositoryClient>,
        repositories: Vec<String>,
        events: EventSink,
        root_keys: BTreeSet<String>,
        missing_as_fatal: bool,
    ) -> Self {
        Self {
            client,
            repositories,
            events,
            descriptors: SingleFlight::new("descriptors"),
            versions: SingleFlight::new("versions"),
            bom_managed: BTreeMap::new(),
            root_keys,
            missing_as_fatal,
            cancelled: AtomicBool::new(false),
        }
    }

    fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Distinct descriptors fetched (or attempted) so far.
    pub(crate) fn descriptor_fetches(&self) -> usize {
        self.descriptors.len()
    }

    /// `Ok(None)` when no repository has the descriptor.
    pub(crate) fn fetch(&self, coords: &Coordinates) -> Result<Option<Arc<FetchedDescriptor>>> {
        let outcome = self.descriptors.get_or_fetch(&gav(coords), || {
            let target = coords.to_string();
            self.events.emit(Event::download_starting(target.clone()));
            let fetched = self.client.fetch_descriptor(coords, &self.repositories);
            self.events.emit(Event::download_complete(target));
            fetched
        });
        match outcome {
            Ok(fetched) => Ok(Some(fetched)),
            Err(LockjarError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Parent descriptors of `descriptor`, nearest first.
    fn lineage(&self, descriptor: &Descriptor) -> Result<Vec<Arc<FetchedDescriptor>>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = descriptor.parent.clone();
        while let Some(parent) = next {
            if chain.len() >= MAX_PARENT_DEPTH || !seen.insert(gav(&parent)) {
                warn!("Parent chain of {} is cyclic or too deep; stopping", parent);
                break;
            }
            match self.fetch(&parent)? {
                Some(fetched) => {
                    next = fetched.descriptor.parent.clone();
                    chain.push(fetched);
                }
                None => {
                    self.events.emit(Event::log(
                        EVENT_SOURCE,
                        format!("parent {parent} was not found; its managed versions are ignored"),
                    ));
                    break;
                }
            }
        }
        Ok(chain)
    }

    fn managed_version(&self, descriptor: &Descriptor, key: &str) -> Result<Option<String>> {
        if let Some(v) = descriptor.managed_versions.get(key) {
            return Ok(Some(v.clone()));
        }
        Ok(self
            .lineage(descriptor)?
            .iter()
            .find_map(|p| p.descriptor.managed_versions.get(key).cloned()))
    }

    /// Merged managed versions of the given BOMs; the first BOM naming an
    /// artifact wins, and inside one BOM the child overrides its parents.
    pub(crate) fn collect_bom_versions(&self, boms: &[Coordinates]) -> Result<BTreeMap<String, String>> {
        let mut merged = BTreeMap::new();
        for bom in boms {
            let Some(fetched) = self.fetch(bom)? else {
                if self.missing_as_fatal {
                    return Err(LockjarError::unresolvable(
                        bom.to_string(),
                        "the BOM descriptor was not found",
                        &[],
                    ));
                }
                self.events.emit(Event::log(
                    EVENT_SOURCE,
                    format!("BOM {bom} was not found; its managed versions are ignored"),
                ));
                continue;
            };
            let mut own = BTreeMap::new();
            for parent in self.lineage(&fetched.descriptor)?.iter().rev() {
                own.extend(parent.descriptor.managed_versions.clone());
            }
            own.extend(fetched.descriptor.managed_versions.clone());
            for (key, version) in own {
                merged.entry(key).or_insert(version);
            }
        }
        debug!("{} BOM-managed versions", merged.len());
        Ok(merged)
    }

    /// Union of every repository's version listing for `group:artifact`.
    fn available_versions(&self, group: &str, artifact: &str) -> Result<Arc<Vec<String>>> {
        let key = format!("{group}:{artifact}");
        self.versions.get_or_fetch(&key, || {
            let target = format!("{}/{}/maven-metadata.xml", group.replace('.', "/"), artifact);
            self.events.emit(Event::download_starting(target.clone()));
            let mut all: Vec<String> = Vec::new();
            let mut failure = None;
            for repo in &self.repositories {
                match self.client.version_index(repo, group, artifact) {
                    Ok(index) => {
                        for v in index.versions {
                            if !all.contains(&v) {
                                all.push(v);
                            }
                        }
                    }
                    Err(LockjarError::NotFound(_)) => {}
                    Err(e) => failure = Some(e),
                }
            }
            self.events.emit(Event::download_complete(target));
            match failure {
                Some(e) if all.is_empty() => Err(e),
                _ => Ok(all),
            }
        })
    }

    /// Fixes the version an edge (or root) points at. The outer error aborts
    /// the run; the inner one explains why this target cannot be resolved.
    pub(crate) fn concretize(
        &self,
        requester: Option<&Descriptor>,
        target: &Coordinates,
    ) -> Result<std::result::Result<Coordinates, String>> {
        let key = target.key();
        let mut version = target.version().to_string();

        if requester.is_some() {
            if let Some(pinned) = self.bom_managed.get(&key) {
                version = pinned.clone();
            }
        }
        if version.is_empty() {
            if let Some(descriptor) = requester {
                version = self.managed_version(descriptor, &key)?.unwrap_or_default();
            }
        }
        if version.is_empty() {
            version = self.bom_managed.get(&key).cloned().unwrap_or_default();
        }
        if version.is_empty() {
            return Ok(Err("no version is declared or managed for it".to_string()));
        }

        if let Some(range) = VersionRange::parse(&version) {
            let available = self.available_versions(target.group(), target.artifact())?;
            match range.highest_satisfying(available.iter().map(String::as_str)) {
                Some(chosen) => {
                    debug!("{} resolved range {} to {}", key, version, chosen);
                    version = chosen.to_string();
                }
                None => {
                    return Ok(Err(format!(
                        "no available version satisfies {version} (known: [{}])",
                        available.join(", ")
                    )))
                }
            }
        }
        Ok(Ok(target.with_version(version)))
    }

    fn leaf(&self, coords: &Coordinates, deferred: Option<Deferred>) -> DiscoveredNode {
        DiscoveredNode {
            coordinates: coords.clone(),
            status: NodeStatus::Missing,
            repositories: self.repositories.clone(),
            served_by: None,
            children: Vec::new(),
            deferred,
        }
    }

    fn discover(&self, coords: &Coordinates) -> Result<DiscoveredNode> {
        let fetched = match self.fetch(coords) {
            Ok(Some(fetched)) => fetched,
            Ok(None) => {
                debug!("{} was not found in any repository", coords);
                let deferred = self.missing_as_fatal.then_some(Deferred::Missing);
                return Ok(self.leaf(coords, deferred));
            }
            Err(e) => {
                warn!("Fetching {} failed: {}", coords, e);
                return Ok(self.leaf(coords, Some(Deferred::Failed(e))));
            }
        };

        let descriptor = &fetched.descriptor;
        let coordinates = coords.with_packaging(&descriptor.packaging);
        let requester_is_root = self.root_keys.contains(&coordinates.key());

        let mut children = Vec::new();
        for declared in &descriptor.dependencies {
            if !follows(declared, requester_is_root, &self.root_keys) {
                continue;
            }
            let mut edge = declared.clone();
            edge.from = coordinates.clone();
            match self.concretize(Some(descriptor), &declared.to)? {
                Ok(to) => {
                    edge.to = to;
                    children.push(Child::Ready(edge));
                }
                Err(reason) => children.push(Child::Unresolvable { edge, reason }),
            }
        }

        Ok(DiscoveredNode {
            coordinates,
            status: NodeStatus::Resolved,
            repositories: fetched.repositories.clone(),
            served_by: Some(fetched.served_by.clone()),
            children,
            deferred: None,
        })
    }
}

enum Outcome {
    Discovered(DiscoveredNode),
    Failed(LockjarError),
    Skipped,
}

fn submit(pool: &ThreadPool, ctx: &Arc<Discovery>, tx: &Sender<Outcome>, coords: Coordinates) {
    let ctx = Arc::clone(ctx);
    let tx = tx.clone();
    pool.execute(move || {
        if ctx.cancelled() {
            let _ = tx.send(Outcome::Skipped);
            return;
        }
        let result = panic::catch_unwind(AssertUnwindSafe(|| ctx.discover(&coords)));
        let outcome = match result {
            Ok(Ok(node)) => Outcome::Discovered(node),
            Ok(Err(e)) => Outcome::Failed(e),
            Err(_) => Outcome::Failed(LockjarError::Generic(format!(
                "worker panicked while discovering {coords}"
            ))),
        };
        let _ = tx.send(outcome);
    });
}

/// Fetches every artifact version reachable from `roots`, keyed by
/// `group:artifact:version`. `exclusions` apply everywhere; exclusions
/// declared on edges prune only below the edge, and only while every chain
/// reaching a version carries them. The first fatal error stops new work,
/// lets in-flight fetches drain, and is returned with nothing else.
pub(crate) fn discover_all(
    ctx: Arc<Discovery>,
    roots: &[Coordinates],
    exclusions: &Exclusions,
    workers: usize,
) -> Result<HashMap<String, DiscoveredNode>> {
    let pool = ThreadPool::new(workers.max(1));
    let (tx, rx) = unbounded::<Outcome>();
    debug!("Discovery started with {} workers", workers.max(1));

    // Exclusions shared by every chain that reached a version so far.
    let mut inherited: HashMap<String, BTreeSet<Exclusion>> = HashMap::new();
    let mut pending = 0usize;
    for root in roots {
        if inherited.insert(gav(root), BTreeSet::new()).is_none() {
            pending += 1;
            submit(&pool, &ctx, &tx, root.clone());
        }
    }

    let mut nodes: HashMap<String, DiscoveredNode> = HashMap::new();
    let mut first_error: Option<LockjarError> = None;

    while pending > 0 {
        let outcome = rx
            .recv()
            .map_err(|e| LockjarError::Generic(format!("discovery channel closed: {e}")))?;
        pending -= 1;

        match outcome {
            Outcome::Skipped => {}
            Outcome::Failed(e) => {
                if first_error.is_none() {
                    error!("Resolution aborted: {}", e);
                    ctx.cancelled.store(true, Ordering::SeqCst);
                    first_error = Some(e);
                }
            }
            Outcome::Discovered(node) => {
                if first_error.is_some() {
                    continue;
                }
                let id = gav(&node.coordinates);
                nodes.insert(id.clone(), node);

                let mut expand = vec![id];
                while let Some(id) = expand.pop() {
                    let Some(node) = nodes.get(&id) else {
                        continue;
                    };
                    let scope = inherited.get(&id).cloned().unwrap_or_default();
                    for child in &node.children {
                        let Child::Ready(edge) = child else {
                            continue;
                        };
                        if exclusions.keys().chain(&scope).any(|x| x.matches(&edge.to)) {
                            continue;
                        }
                        let mut below = scope.clone();
                        below.extend(edge.exclusions.iter().cloned());

                        let target = gav(&edge.to);
                        match inherited.get_mut(&target) {
                            None => {
                                inherited.insert(target, below);
                                pending += 1;
                                submit(&pool, &ctx, &tx, edge.to.clone());
                            }
                            Some(current) => {
                                let narrowed: BTreeSet<Exclusion> =
                                    current.intersection(&below).cloned().collect();
                                if narrowed.len() < current.len() {
                                    *current = narrowed;
                                    if nodes.contains_key(&target) {
                                        expand.push(target);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    pool.join();

    match first_error {
        Some(e) => Err(e),
        None => {
            debug!(
                "Discovery finished: {} artifact versions, {} descriptor fetches",
                nodes.len(),
                ctx.descriptor_fetches()
            );
            Ok(nodes)
        }
    }
}
