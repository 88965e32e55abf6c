// lockjar-core/src/resolve/settle.rs
// Pure settlement over the fully discovered descriptor set: pick one version
// per artifact, apply exclusions, break cycles. No I/O happens here.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use lockjar_common::dependency::{
    ConflictRecord, NodeStatus, Omission, ResolvedGraph, ResolvedNode, VersionRequest,
};
use lockjar_common::error::{LockjarError, Result};
use lockjar_common::event::Event;
use lockjar_common::model::Coordinates;
use tracing::{debug, warn};

use super::discover::{gav, Child, Deferred, DiscoveredNode, EVENT_SOURCE};
use super::policy::ConflictPolicy;
use super::request::Exclusions;

const MAX_ROUNDS: usize = 32;
/// After this many rounds candidate versions and declared exclusions
/// accumulate across rounds, which stops graphs whose winners would
/// otherwise flip back and forth.
const STICKY_AFTER: usize = 8;

pub(crate) struct Settlement {
    pub graph: ResolvedGraph,
    pub notes: Vec<Event>,
}

#[derive(Default)]
struct Walk {
    visited: Vec<String>,
    requests: BTreeMap<String, Vec<VersionRequest>>,
    /// Exclusions on the edges this walk followed, first declarer kept.
    declared_exclusions: Exclusions,
    omissions: Vec<Omission>,
    missing: Vec<Event>,
    unresolvable: Option<LockjarError>,
}

impl Walk {
    fn fail(&mut self, err: LockjarError) {
        if self.unresolvable.is_none() {
            self.unresolvable = Some(err);
        }
    }
}

fn same_rules(a: &Exclusions, b: &Exclusions) -> bool {
    a.keys().eq(b.keys())
}

fn record(requests: &mut BTreeMap<String, Vec<VersionRequest>>, key: String, version: &str, chain: Vec<String>) {
    let entry = requests.entry(key).or_default();
    match entry.iter_mut().find(|r| r.version == version) {
        Some(existing) => {
            if !existing.chains.contains(&chain) {
                existing.chains.push(chain);
            }
        }
        None => entry.push(VersionRequest {
            version: version.to_string(),
            chains: vec![chain],
        }),
    }
}

fn lookup<'a>(nodes: &'a HashMap<String, DiscoveredNode>, key: &str, version: &str) -> Result<&'a DiscoveredNode> {
    let id = format!("{key}:{version}");
    nodes
        .get(&id)
        .ok_or_else(|| LockjarError::Generic(format!("{id} was never discovered")))
}

/// Breadth-first from the roots, visiting every artifact once at its current
/// winning version (or its first requested version before one is chosen).
fn walk(
    roots: &[Coordinates],
    nodes: &HashMap<String, DiscoveredNode>,
    winners: &BTreeMap<String, String>,
    exclusions: &Exclusions,
) -> Result<Walk> {
    let mut out = Walk::default();
    let mut queue = VecDeque::new();
    let mut reached_via: HashMap<String, Vec<String>> = HashMap::new();

    for root in roots {
        let key = root.key();
        record(&mut out.requests, key.clone(), root.version(), Vec::new());
        if !reached_via.contains_key(&key) {
            reached_via.insert(key.clone(), Vec::new());
            queue.push_back(key);
        }
    }

    while let Some(key) = queue.pop_front() {
        let version = match winners.get(&key) {
            Some(v) => v.clone(),
            None => out
                .requests
                .get(&key)
                .and_then(|r| r.first())
                .map(|r| r.version.clone())
                .unwrap_or_default(),
        };
        let node = lookup(nodes, &key, &version)?;
        let requested_via = reached_via.get(&key).cloned().unwrap_or_default();
        match &node.deferred {
            Some(Deferred::Missing) => out.fail(LockjarError::unresolvable(
                node.coordinates.to_string(),
                "no repository has a descriptor for it",
                &requested_via,
            )),
            Some(Deferred::Failed(e)) => out.fail(e.clone()),
            None if node.status == NodeStatus::Missing => out.missing.push(Event::log_with_detail(
                EVENT_SOURCE,
                format!("{} was not found; treating it as a leaf", node.coordinates),
                format!("tried {}", node.repositories.join(", ")),
            )),
            None => {}
        }
        let mut path = requested_via;
        path.push(node.coordinates.to_string());
        out.visited.push(key);

        for child in &node.children {
            let edge = child.edge();
            if let Some((rule, declarer)) = exclusions.iter().find(|(x, _)| x.matches(&edge.to)) {
                out.omissions.push(Omission {
                    target: edge.to.key(),
                    reason: format!("excluded by {rule} ({declarer})"),
                    chain: path.clone(),
                });
                continue;
            }

            match child {
                Child::Unresolvable { edge, reason } => {
                    out.fail(LockjarError::unresolvable(edge.to.to_string(), reason, &path));
                }
                Child::Ready(edge) => {
                    for rule in &edge.exclusions {
                        out.declared_exclusions
                            .entry(rule.clone())
                            .or_insert_with(|| format!("declared on {} -> {}", node.coordinates, edge.to.key()));
                    }
                    let child_key = edge.to.key();
                    record(&mut out.requests, child_key.clone(), edge.to.version(), path.clone());
                    if !reached_via.contains_key(&child_key) {
                        reached_via.insert(child_key.clone(), path.clone());
                        queue.push_back(child_key);
                    }
                }
            }
        }
    }
    Ok(out)
}

fn choose_all(
    candidates: &BTreeMap<String, Vec<String>>,
    policy: &dyn ConflictPolicy,
) -> Result<BTreeMap<String, String>> {
    candidates
        .iter()
        .map(|(key, versions)| {
            policy
                .choose(key, versions)
                .map(|chosen| (key.clone(), chosen))
                .ok_or_else(|| {
                    LockjarError::ResolutionError(format!(
                        "conflict policy '{}' chose no version for {key}",
                        policy.name()
                    ))
                })
        })
        .collect()
}

pub(crate) fn settle(
    roots: &[Coordinates],
    nodes: &HashMap<String, DiscoveredNode>,
    initial_exclusions: &Exclusions,
    policy: &dyn ConflictPolicy,
) -> Result<Settlement> {
    let mut winners: BTreeMap<String, String> = BTreeMap::new();
    let mut exclusions = initial_exclusions.clone();
    let mut seen_versions: BTreeMap<String, Vec<String>> = BTreeMap::new();

    let mut settled = None;
    for round in 0..MAX_ROUNDS {
        let current = walk(roots, nodes, &winners, &exclusions)?;

        let mut round_versions: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, requests) in &current.requests {
            let all = seen_versions.entry(key.clone()).or_default();
            for request in requests {
                if !all.contains(&request.version) {
                    all.push(request.version.clone());
                }
            }
            round_versions.insert(
                key.clone(),
                requests.iter().map(|r| r.version.clone()).collect(),
            );
        }
        let sticky = round >= STICKY_AFTER;
        let candidates = if sticky { &seen_versions } else { &round_versions };
        let next_winners = choose_all(candidates, policy)?;

        // Only versions this walk visited declare exclusions for the next.
        let mut next_exclusions = if sticky {
            exclusions.clone()
        } else {
            initial_exclusions.clone()
        };
        for (rule, declarer) in &current.declared_exclusions {
            next_exclusions
                .entry(rule.clone())
                .or_insert_with(|| declarer.clone());
        }

        if next_winners == winners && same_rules(&next_exclusions, &exclusions) {
            debug!("Settled after {} rounds", round + 1);
            settled = Some(current);
            break;
        }
        winners = next_winners;
        exclusions = next_exclusions;
    }

    let Some(walk) = settled else {
        return Err(LockjarError::ResolutionError(format!(
            "version selection did not settle after {MAX_ROUNDS} rounds"
        )));
    };
    if let Some(err) = walk.unresolvable {
        return Err(err);
    }

    let mut notes = walk.missing;
    let mut graph = ResolvedGraph {
        roots: roots.to_vec(),
        ..ResolvedGraph::default()
    };

    let mut settled_coordinates: HashMap<String, Coordinates> = HashMap::new();
    for key in &walk.visited {
        let version = winners.get(key).map(String::as_str).unwrap_or_default();
        let node = lookup(nodes, key, version)?;
        settled_coordinates.insert(key.clone(), node.coordinates.clone());
    }

    for key in &walk.visited {
        let version = winners.get(key).map(String::as_str).unwrap_or_default();
        let node = lookup(nodes, key, version)?;
        let mut seen_targets = HashSet::new();
        let direct_edges = node
            .children
            .iter()
            .filter_map(|child| match child {
                Child::Ready(edge) => Some(edge),
                Child::Unresolvable { .. } => None,
            })
            .filter(|edge| !exclusions.keys().any(|x| x.matches(&edge.to)))
            .filter_map(|edge| {
                let target = settled_coordinates.get(&edge.to.key())?;
                seen_targets.insert(edge.to.key()).then(|| {
                    let mut settled_edge = edge.clone();
                    settled_edge.to = target.clone();
                    settled_edge
                })
            })
            .collect();

        graph.nodes.insert(
            key.clone(),
            ResolvedNode {
                coordinates: node.coordinates.clone(),
                direct_edges,
                repositories: node.repositories.clone(),
                served_by: node.served_by.clone(),
                sha256: None,
                status: node.status,
            },
        );
    }

    for (key, requests) in walk.requests {
        if requests.len() < 2 || !graph.nodes.contains_key(&key) {
            continue;
        }
        let chosen = winners.get(&key).cloned().unwrap_or_default();
        let record = ConflictRecord { chosen, requested: requests };
        notes.push(conflict_note(&key, &record));
        graph.conflicts.insert(key, record);
    }

    for omission in &walk.omissions {
        notes.push(Event::log_with_detail(
            EVENT_SOURCE,
            format!("{} omitted, {}", omission.target, omission.reason),
            format!("requested via {}", omission.chain.join(" -> ")),
        ));
    }
    graph.omissions = walk.omissions;

    graph.broken_cycles = break_cycles(&mut graph);
    for (from, to) in &graph.broken_cycles {
        warn!("Dependency cycle broken at {} -> {}", from, to);
        notes.push(Event::log(
            EVENT_SOURCE,
            format!("dependency cycle broken by dropping {from} -> {to}"),
        ));
    }

    Ok(Settlement { graph, notes })
}

fn conflict_note(key: &str, record: &ConflictRecord) -> Event {
    let rejected: Vec<&str> = record.rejected().map(|r| r.version.as_str()).collect();
    let detail = record
        .requested
        .iter()
        .flat_map(|r| {
            r.chains.iter().map(move |chain| {
                if chain.is_empty() {
                    format!("{} requested directly", r.version)
                } else {
                    format!("{} via {}", r.version, chain.join(" -> "))
                }
            })
        })
        .collect::<Vec<_>>()
        .join("\n");
    Event::log_with_detail(
        EVENT_SOURCE,
        format!("{key}: {} chosen over {}", record.chosen, rejected.join(", ")),
        detail,
    )
}

/// Depth-first from the roots (then any leftover node, in key order); every
/// edge into a node still on the stack is dropped, so the first path seen
/// keeps its edges.
fn break_cycles(graph: &mut ResolvedGraph) -> Vec<(String, String)> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        OnStack,
        Done,
    }

    let mut order: Vec<String> = graph.roots.iter().map(Coordinates::key).collect();
    order.extend(graph.nodes.keys().cloned());

    let mut marks: HashMap<String, Mark> = HashMap::new();
    let mut back_edges: Vec<(String, String)> = Vec::new();

    for start in order {
        if marks.contains_key(&start) || !graph.nodes.contains_key(&start) {
            continue;
        }
        let mut stack: Vec<(String, usize)> = vec![(start.clone(), 0)];
        marks.insert(start, Mark::OnStack);

        while let Some((key, next)) = stack.last().cloned() {
            let target = graph
                .nodes
                .get(&key)
                .and_then(|n| n.direct_edges.get(next))
                .map(|e| e.to.key());
            match target {
                None => {
                    marks.insert(key, Mark::Done);
                    stack.pop();
                }
                Some(target) => {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    match marks.get(&target) {
                        Some(Mark::OnStack) => back_edges.push((key, target)),
                        Some(Mark::Done) => {}
                        None => {
                            if graph.nodes.contains_key(&target) {
                                marks.insert(target.clone(), Mark::OnStack);
                                stack.push((target, 0));
                            }
                        }
                    }
                }
            }
        }
    }

    for (from, to) in &back_edges {
        if let Some(node) = graph.nodes.get_mut(from) {
            node.direct_edges.retain(|e| &e.to.key() != to);
        }
    }
    back_edges
}
