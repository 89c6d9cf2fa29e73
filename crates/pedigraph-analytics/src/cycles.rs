//! Self-ancestry audit.
//!
//! A dog can never be its own ancestor, so any `HAS_PARENT` walk that
//! revisits a node has found corrupt registry data. The audit walks every
//! dog of a cohort depth-first with relationship-path uniqueness (a node
//! repeat is exactly the signal being sought, so node uniqueness would
//! mask it) and reports one representative id per distinct broken lineage.

use std::collections::{BTreeSet, HashSet, VecDeque};

use tracing::debug;

use pedigraph_core::{props, Direction, Label, RegistryId, RelType};
use pedigraph_store::{NodeId, ReadTx, RelId, RelRecord};

use crate::cohort::{cohort_dogs, registry_id};

/// Audit every dog of the named breeds for self-ancestry. Returns one
/// representative registry id per distinct broken lineage.
pub fn audit_breeds(tx: &ReadTx<'_>, breeds: &[String]) -> BTreeSet<RegistryId> {
    let mut visited: HashSet<RelId> = HashSet::new();
    let mut findings = BTreeSet::new();

    for dog in cohort_dogs(tx, breeds) {
        let mut path: Vec<RelRecord> = Vec::new();
        let mut nodes: Vec<NodeId> = vec![dog];
        let mut walked: HashSet<RelId> = HashSet::new();

        match probe(tx, dog, &mut path, &mut nodes, &visited, &mut walked) {
            Some(repeat_at) => {
                if let Some(id) = registry_id(tx, dog) {
                    debug!(%id, circle = path.len() - repeat_at, "self-ancestry circle found");
                    findings.insert(id);
                }
                // Retire the circle and everything genealogically below
                // its endpoint so the same broken region is reported once.
                for rel in &path[repeat_at..] {
                    visited.insert(rel.id);
                }
                mark_descendants(tx, nodes[repeat_at], &mut visited);
            }
            None => {
                // Clean ancestry: later cohort dogs sharing it skip the
                // re-walk entirely.
                visited.extend(walked);
            }
        }
    }
    findings
}

/// Point diagnostic for one dog: any `HAS_PARENT` path leading back to the
/// dog itself, as the sequence of registry ids along the loop.
pub fn self_ancestry_path(tx: &ReadTx<'_>, id: &RegistryId) -> Option<Vec<RegistryId>> {
    let start = tx.find_node(Label::Dog, props::REGISTRY_ID, &id.into())?;
    let mut trail: Vec<NodeId> = vec![start];
    let mut rels: Vec<RelId> = Vec::new();
    if !find_return(tx, start, start, &mut rels, &mut trail) {
        return None;
    }
    Some(
        trail
            .into_iter()
            .filter_map(|node| registry_id(tx, node))
            .collect(),
    )
}

/// Depth-first walk over unvisited `HAS_PARENT` edges. Returns the index
/// into `nodes` of the first repeated node; on return, `path` ends with
/// the relationship that closed the circle.
fn probe(
    tx: &ReadTx<'_>,
    node: NodeId,
    path: &mut Vec<RelRecord>,
    nodes: &mut Vec<NodeId>,
    visited: &HashSet<RelId>,
    walked: &mut HashSet<RelId>,
) -> Option<usize> {
    for rel in tx.relationships(node, Some(RelType::HasParent), Direction::Outgoing) {
        if visited.contains(&rel.id) || path.iter().any(|taken| taken.id == rel.id) {
            continue;
        }
        walked.insert(rel.id);
        let target = rel.to;
        if let Some(pos) = nodes.iter().position(|&seen| seen == target) {
            path.push(rel);
            return Some(pos);
        }
        nodes.push(target);
        path.push(rel);
        if let Some(pos) = probe(tx, target, path, nodes, visited, walked) {
            return Some(pos);
        }
        path.pop();
        nodes.pop();
    }
    None
}

fn find_return(
    tx: &ReadTx<'_>,
    node: NodeId,
    start: NodeId,
    rels: &mut Vec<RelId>,
    trail: &mut Vec<NodeId>,
) -> bool {
    for rel in tx.relationships(node, Some(RelType::HasParent), Direction::Outgoing) {
        if rels.contains(&rel.id) {
            continue;
        }
        if rel.to == start {
            trail.push(start);
            return true;
        }
        rels.push(rel.id);
        trail.push(rel.to);
        if find_return(tx, rel.to, start, rels, trail) {
            return true;
        }
        trail.pop();
        rels.pop();
    }
    false
}

/// Mark every relationship reachable through *incoming* `HAS_PARENT` edges
/// from `endpoint` (the circle's descendants) as visited.
fn mark_descendants(tx: &ReadTx<'_>, endpoint: NodeId, visited: &mut HashSet<RelId>) {
    let mut queue = VecDeque::from([endpoint]);
    let mut seen: HashSet<NodeId> = HashSet::from([endpoint]);
    while let Some(node) = queue.pop_front() {
        for rel in tx.relationships(node, Some(RelType::HasParent), Direction::Incoming) {
            visited.insert(rel.id);
            if seen.insert(rel.from) {
                queue.push_back(rel.from);
            }
        }
    }
}
