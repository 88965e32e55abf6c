// lockjar-core/src/resolve/engine.rs
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::unbounded;
use lockjar_common::config::{default_worker_count, Config};
use lockjar_common::dependency::{NodeStatus, ResolvedGraph};
use lockjar_common::error::{LockjarError, Result};
use lockjar_common::event::{Event, EventSink};
use lockjar_common::model::Coordinates;
use lockjar_common::repository::RepositoryClient;
use threadpool::ThreadPool;
use tracing::{debug, error, instrument};

use super::discover::{self, Discovery, EVENT_SOURCE};
use super::policy::{ConflictPolicy, HighestVersion};
use super::request::ResolutionRequest;
use super::settle;

pub const PHASE_RESOLVING: &str = "resolving";
pub const PHASE_DOWNLOADING: &str = "downloading";
pub const PHASE_WRITING: &str = "writing output";

#[derive(Clone)]
pub struct ResolverOptions {
    pub policy: Arc<dyn ConflictPolicy>,
    pub missing_as_fatal: bool,
    pub workers: usize,
    /// Look up payload digests once the graph is settled.
    pub fetch_digests: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            policy: Arc::new(HighestVersion),
            missing_as_fatal: false,
            workers: default_worker_count(),
            fetch_digests: true,
        }
    }
}

impl ResolverOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            missing_as_fatal: config.missing_as_fatal,
            workers: config.workers,
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for ResolverOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverOptions")
            .field("policy", &self.policy.name())
            .field("missing_as_fatal", &self.missing_as_fatal)
            .field("workers", &self.workers)
            .field("fetch_digests", &self.fetch_digests)
            .finish()
    }
}

pub struct Resolver {
    client: Arc<dyn RepositoryClient>,
    options: ResolverOptions,
    events: EventSink,
}

impl Resolver {
    pub fn new(client: Arc<dyn RepositoryClient>, options: ResolverOptions, events: EventSink) -> Self {
        Self {
            client,
            options,
            events,
        }
    }

    /// Resolves the request into a settled graph. Any fatal error discards
    /// everything resolved so far.
    #[instrument(skip_all, name = "resolve")]
    pub fn resolve(&self, request: &ResolutionRequest) -> Result<ResolvedGraph> {
        if request.repositories.is_empty() {
            return Err(LockjarError::Config(
                "at least one repository is required".to_string(),
            ));
        }
        if request.artifacts.is_empty() {
            debug!("Nothing to resolve");
            return Ok(ResolvedGraph::default());
        }

        self.events.phase(PHASE_RESOLVING);
        let root_keys = request.root_keys();
        let mut discovery = Discovery::new(
            Arc::clone(&self.client),
            request.repositories.clone(),
            self.events.clone(),
            root_keys,
            self.options.missing_as_fatal,
        );
        discovery.bom_managed = discovery.collect_bom_versions(&request.boms)?;

        let mut roots = Vec::with_capacity(request.artifacts.len());
        for root in &request.artifacts {
            match discovery.concretize(None, &root.coordinates)? {
                Ok(concrete) => roots.push(concrete),
                Err(reason) => {
                    return Err(LockjarError::unresolvable(
                        root.coordinates.to_string(),
                        reason,
                        &[],
                    ))
                }
            }
        }

        let exclusions = request.initial_exclusions();
        let discovered = discover::discover_all(
            Arc::new(discovery),
            &roots,
            &exclusions,
            self.options.workers,
        )?;

        let settlement = settle::settle(&roots, &discovered, &exclusions, self.options.policy.as_ref())?;
        for note in settlement.notes {
            self.events.emit(note);
        }
        let mut graph = settlement.graph;
        debug!(
            "Settled {} artifacts, {} conflicts",
            graph.nodes.len(),
            graph.conflicts.len()
        );

        if self.options.fetch_digests {
            self.events.phase(PHASE_DOWNLOADING);
            self.attach_digests(&mut graph)?;
        }
        Ok(graph)
    }

    /// Looks up the payload digest of every resolved, non-aggregator node on
    /// the worker pool. A repository without a digest leaves `sha256` empty.
    fn attach_digests(&self, graph: &mut ResolvedGraph) -> Result<()> {
        let targets: Vec<(String, String, Coordinates)> = graph
            .nodes
            .iter()
            .filter(|(_, n)| n.status == NodeStatus::Resolved && !n.is_aggregator())
            .filter_map(|(key, n)| {
                n.served_by
                    .clone()
                    .map(|repo| (key.clone(), repo, n.coordinates.clone()))
            })
            .collect();
        if targets.is_empty() {
            return Ok(());
        }

        let pool = ThreadPool::new(self.options.workers.max(1));
        let (tx, rx) = unbounded::<(String, Result<Option<String>>)>();
        let cancelled = Arc::new(AtomicBool::new(false));

        for (key, repo, coords) in targets.iter().cloned() {
            let tx = tx.clone();
            let client = Arc::clone(&self.client);
            let events = self.events.clone();
            let cancelled = Arc::clone(&cancelled);
            pool.execute(move || {
                if cancelled.load(Ordering::SeqCst) {
                    let _ = tx.send((key, Ok(None)));
                    return;
                }
                let target = format!("{}/{}", repo.trim_end_matches('/'), coords.repository_path());
                events.emit(Event::download_starting(target.clone()));
                let lookup = panic::catch_unwind(AssertUnwindSafe(|| client.artifact_sha256(&repo, &coords)));
                let digest = match lookup {
                    Ok(Err(LockjarError::NotFound(_))) => {
                        events.emit(Event::log(
                            EVENT_SOURCE,
                            format!("no digest published for {coords}"),
                        ));
                        Ok(None)
                    }
                    Ok(other) => other,
                    Err(_) => Err(LockjarError::Generic(format!(
                        "worker panicked while looking up the digest of {coords}"
                    ))),
                };
                events.emit(Event::download_complete(target));
                if digest.is_err() {
                    cancelled.store(true, Ordering::SeqCst);
                }
                let _ = tx.send((key, digest));
            });
        }
        drop(tx);

        let mut digests = BTreeMap::new();
        let mut first_error = None;
        let mut received = 0usize;
        for (key, digest) in rx.iter().take(targets.len()) {
            received += 1;
            match digest {
                Ok(sha) => {
                    digests.insert(key, sha);
                }
                Err(e) => {
                    if first_error.is_none() {
                        error!("Digest lookup failed: {}", e);
                        first_error = Some(e);
                    }
                }
            }
        }
        pool.join();

        if let Some(e) = first_error {
            return Err(e);
        }
        if received < targets.len() {
            return Err(LockjarError::Generic(format!(
                "digest lookup lost {} of {} results",
                targets.len() - received,
                targets.len()
            )));
        }
        for (key, sha) in digests {
            if let Some(node) = graph.nodes.get_mut(&key) {
                node.sha256 = sha;
            }
        }
        Ok(())
    }
}

/// Resolves `roots` against `repositories` with a silent listener.
pub fn resolve(
    client: Arc<dyn RepositoryClient>,
    roots: impl IntoIterator<Item = Coordinates>,
    repositories: &[String],
    policy: Arc<dyn ConflictPolicy>,
) -> Result<ResolvedGraph> {
    let options = ResolverOptions {
        policy,
        ..ResolverOptions::default()
    };
    Resolver::new(client, options, EventSink::null())
        .resolve(&ResolutionRequest::from_roots(roots, repositories))
}
