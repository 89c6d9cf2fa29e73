//! Coefficient of inbreeding after Sewall Wright.
//!
//! `F = Σ 0.5^(L1+L2+1) × (1 + F_A)` over every accepted pair of ancestor
//! paths meeting in a common ancestor `A`, where `L1`/`L2` are the edge
//! lengths of the two paths and `F_A` is the common ancestor's own
//! coefficient, computed fresh at the full configured depth. A path pair is
//! rejected when the two paths overlap anywhere besides the common ancestor
//! itself, which would double-count a shared line already charged to a
//! different ancestor.

use std::collections::{HashMap, HashSet};

use pedigraph_core::{Direction, ParentRole, RelType};
use pedigraph_store::{NodeId, ReadTx};

pub(crate) fn parent_of(tx: &ReadTx<'_>, node: NodeId, role: ParentRole) -> Option<NodeId> {
    tx.relationships(node, Some(RelType::HasParent), Direction::Outgoing)
        .into_iter()
        .find(|rel| rel.role() == Some(role.as_str()))
        .map(|rel| rel.to)
}

/// Coefficient of a dog already in the graph, in `[0, 1]`. A dog with an
/// unknown parent scores 0.
pub fn coefficient_of_inbreeding(tx: &ReadTx<'_>, dog: NodeId, generations: u32) -> f64 {
    match (
        parent_of(tx, dog, ParentRole::Father),
        parent_of(tx, dog, ParentRole::Mother),
    ) {
        (Some(father), Some(mother)) => coefficient_for_mating(tx, father, mother, generations),
        _ => 0.0,
    }
}

/// Coefficient of a hypothetical (or actual) mating of two graphed dogs.
pub fn coefficient_for_mating(
    tx: &ReadTx<'_>,
    father: NodeId,
    mother: NodeId,
    generations: u32,
) -> f64 {
    if generations == 0 {
        return 0.0;
    }
    let father_index = ancestor_paths(tx, father, generations - 1);
    let mother_index = ancestor_paths(tx, mother, generations - 1);

    let mut total = 0.0;
    for (ancestor, mother_paths) in &mother_index {
        let Some(father_paths) = father_index.get(ancestor) else {
            continue;
        };
        // The ancestor's own coefficient only matters once a pair survives
        // the overlap check.
        let mut ancestor_coi: Option<f64> = None;
        for mother_path in mother_paths {
            for father_path in father_paths {
                if overlap_beyond_ancestor(father_path, mother_path) {
                    continue;
                }
                let coi = *ancestor_coi.get_or_insert_with(|| {
                    coefficient_of_inbreeding(tx, *ancestor, generations)
                });
                let edges = (father_path.len() - 1) + (mother_path.len() - 1) + 1;
                total += 0.5f64.powi(edges as i32) * (1.0 + coi);
            }
        }
    }
    total
}

/// Every `HAS_PARENT` path of up to `max_edges` edges from `start`,
/// grouped by the path's terminal ancestor. The zero-length path makes
/// `start` its own terminal, so a parent can itself be the common ancestor.
fn ancestor_paths(
    tx: &ReadTx<'_>,
    start: NodeId,
    max_edges: u32,
) -> HashMap<NodeId, Vec<Vec<NodeId>>> {
    let mut index = HashMap::new();
    let mut path = vec![start];
    collect(tx, start, &mut path, max_edges, &mut index);
    index
}

fn collect(
    tx: &ReadTx<'_>,
    node: NodeId,
    path: &mut Vec<NodeId>,
    remaining: u32,
    index: &mut HashMap<NodeId, Vec<Vec<NodeId>>>,
) {
    index.entry(node).or_default().push(path.clone());
    if remaining == 0 {
        return;
    }
    for role in ParentRole::ALL {
        if let Some(parent) = parent_of(tx, node, role) {
            // A residual parent cycle must not hang the read model.
            if path.contains(&parent) {
                continue;
            }
            path.push(parent);
            collect(tx, parent, path, remaining - 1, index);
            path.pop();
        }
    }
}

fn overlap_beyond_ancestor(a: &[NodeId], b: &[NodeId]) -> bool {
    let nodes: HashSet<NodeId> = a.iter().copied().collect();
    b.iter().filter(|node| nodes.contains(node)).count() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use pedigraph_core::ParentRole::{Father, Mother};

    #[test]
    fn unknown_parent_scores_zero() {
        let store = fixtures::store();
        let a = {
            let mut tx = store.write();
            let a = fixtures::dog(&mut tx, "NO/1/01");
            let b = fixtures::dog(&mut tx, "NO/2/95");
            fixtures::parent(&mut tx, a, b, Father);
            tx.commit().unwrap();
            a
        };
        let read = store.read();
        assert_eq!(coefficient_of_inbreeding(&read, a, 3), 0.0);
    }

    // A's father B is also the father of A's mother C. B's and D's own
    // lines are distinct, so the only common-ancestor contribution is
    // through B itself: 0.5^(0+1+1) = 0.25. The deeper X/Y path pairs
    // overlap in B and are rejected.
    #[test]
    fn half_sib_parents_score_a_quarter() {
        let store = fixtures::store();
        let a = {
            let mut tx = store.write();
            let a = fixtures::dog(&mut tx, "A");
            let b = fixtures::dog(&mut tx, "B");
            let c = fixtures::dog(&mut tx, "C");
            let d = fixtures::dog(&mut tx, "D");
            let x = fixtures::dog(&mut tx, "X");
            let y = fixtures::dog(&mut tx, "Y");
            fixtures::parent(&mut tx, a, b, Father);
            fixtures::parent(&mut tx, a, c, Mother);
            fixtures::parent(&mut tx, b, x, Father);
            fixtures::parent(&mut tx, b, y, Mother);
            fixtures::parent(&mut tx, c, b, Father);
            fixtures::parent(&mut tx, c, d, Mother);
            for (child, ids) in [(x, ["G", "H"]), (y, ["I", "J"])] {
                let f = fixtures::dog(&mut tx, ids[0]);
                let m = fixtures::dog(&mut tx, ids[1]);
                fixtures::parent(&mut tx, child, f, Father);
                fixtures::parent(&mut tx, child, m, Mother);
            }
            tx.commit().unwrap();
            a
        };
        let read = store.read();
        let coi = coefficient_of_inbreeding(&read, a, 3);
        assert!((coi - 0.25).abs() < 1e-12, "coi was {coi}");
    }

    #[test]
    fn full_sibling_mating_scores_a_quarter() {
        let store = fixtures::store();
        let (s1, s2) = {
            let mut tx = store.write();
            let f = fixtures::dog(&mut tx, "F");
            let m = fixtures::dog(&mut tx, "M");
            let s1 = fixtures::dog(&mut tx, "S1");
            let s2 = fixtures::dog(&mut tx, "S2");
            for sibling in [s1, s2] {
                fixtures::parent(&mut tx, sibling, f, Father);
                fixtures::parent(&mut tx, sibling, m, Mother);
            }
            tx.commit().unwrap();
            (s1, s2)
        };
        let read = store.read();
        let coi = coefficient_for_mating(&read, s1, s2, 3);
        assert!((coi - 0.25).abs() < 1e-12, "coi was {coi}");
    }

    #[test]
    fn inbred_common_ancestor_raises_the_coefficient() {
        // The common ancestor B is itself the product of a full-sibling
        // mating (F_B = 0.25), lifting the half-sib figure from 0.25 to
        // 0.25 × 1.25.
        let store = fixtures::store();
        let a = {
            let mut tx = store.write();
            let a = fixtures::dog(&mut tx, "A");
            let b = fixtures::dog(&mut tx, "B");
            let c = fixtures::dog(&mut tx, "C");
            fixtures::parent(&mut tx, a, b, Father);
            fixtures::parent(&mut tx, a, c, Mother);
            fixtures::parent(&mut tx, c, b, Father);
            let s1 = fixtures::dog(&mut tx, "S1");
            let s2 = fixtures::dog(&mut tx, "S2");
            fixtures::parent(&mut tx, b, s1, Father);
            fixtures::parent(&mut tx, b, s2, Mother);
            let f = fixtures::dog(&mut tx, "F");
            let m = fixtures::dog(&mut tx, "M");
            for sibling in [s1, s2] {
                fixtures::parent(&mut tx, sibling, f, Father);
                fixtures::parent(&mut tx, sibling, m, Mother);
            }
            tx.commit().unwrap();
            a
        };
        let read = store.read();
        let coi = coefficient_of_inbreeding(&read, a, 3);
        assert!((coi - 0.25 * 1.25).abs() < 1e-12, "coi was {coi}");
    }
}
