use serde::Serialize;

use pedigraph_core::{props, ParentRole, PropValue};
use pedigraph_store::{NodeId, ReadTx};

use crate::inbreeding::parent_of;

/// Nested ancestry of one dog to a bounded depth, as handed to the
/// presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct PedigreeTree {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub father: Option<Box<PedigreeTree>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mother: Option<Box<PedigreeTree>>,
}

pub fn pedigree_tree(tx: &ReadTx<'_>, dog: NodeId, depth: u32) -> PedigreeTree {
    let prop_str = |key: &str| {
        tx.get_property(dog, key)
            .as_ref()
            .and_then(PropValue::as_str)
            .map(str::to_string)
    };
    let mut tree = PedigreeTree {
        id: prop_str(props::REGISTRY_ID).unwrap_or_default(),
        name: prop_str(props::NAME),
        father: None,
        mother: None,
    };
    if depth == 0 {
        return tree;
    }
    if let Some(father) = parent_of(tx, dog, ParentRole::Father) {
        tree.father = Some(Box::new(pedigree_tree(tx, father, depth - 1)));
    }
    if let Some(mother) = parent_of(tx, dog, ParentRole::Mother) {
        tree.mother = Some(Box::new(pedigree_tree(tx, mother, depth - 1)));
    }
    tree
}

/// Share of the `2^(G+1) − 2` ancestor slots within `generations`
/// generations that are filled, as a percentage.
pub fn pedigree_completeness(tx: &ReadTx<'_>, dog: NodeId, generations: u32) -> f64 {
    if generations == 0 {
        return 100.0;
    }
    // Saturate: the depth is caller-supplied and 2^64 slots is already
    // beyond any real pedigree.
    let complete = 2u64
        .saturating_pow(generations.saturating_add(1))
        .saturating_sub(2);
    let known = known_slots(tx, dog, generations);
    known as f64 / complete as f64 * 100.0
}

fn known_slots(tx: &ReadTx<'_>, dog: NodeId, remaining: u32) -> u64 {
    if remaining == 0 {
        return 0;
    }
    let mut known = 0;
    for role in ParentRole::ALL {
        if let Some(parent) = parent_of(tx, dog, role) {
            known += 1 + known_slots(tx, parent, remaining - 1);
        }
    }
    known
}
