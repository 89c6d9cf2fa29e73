//! Read models over the pedigree graph: coefficient of inbreeding,
//! self-ancestry audits, ancestry trees and cohort statistics. Everything
//! here runs against read transactions only and can execute on any number
//! of concurrent readers.

mod cohort;
mod cycles;
mod inbreeding;
mod stats;
mod tree;

pub use cohort::cohort_dogs;
pub use cycles::{audit_breeds, self_ancestry_path};
pub use inbreeding::{coefficient_for_mating, coefficient_of_inbreeding};
pub use stats::{breed_inbreeding_stats, CoiStats};
pub use tree::{pedigree_completeness, pedigree_tree, PedigreeTree};

#[cfg(test)]
pub(crate) mod fixtures {
    use pedigraph_core::{props, Label, ParentRole, PropValue, RelType};
    use pedigraph_store::{GraphStore, NodeId, WriteTx};

    pub fn dog(tx: &mut WriteTx<'_>, id: &str) -> NodeId {
        let node = tx
            .find_or_create_node(Label::Dog, props::REGISTRY_ID, PropValue::from(id))
            .unwrap();
        tx.set_property(node, props::NAME, PropValue::from(id))
            .unwrap();
        node
    }

    pub fn breed_dog(tx: &mut WriteTx<'_>, id: &str, breed: &str) -> NodeId {
        let node = dog(tx, id);
        let synonym = tx
            .find_or_create_node(Label::BreedSynonym, props::NAME, PropValue::from(breed))
            .unwrap();
        tx.create_relationship(node, synonym, RelType::IsBreed, vec![])
            .unwrap();
        node
    }

    pub fn parent(tx: &mut WriteTx<'_>, child: NodeId, parent: NodeId, role: ParentRole) {
        tx.create_relationship(
            child,
            parent,
            RelType::HasParent,
            vec![(props::ROLE, role.as_str().into())],
        )
        .unwrap();
    }

    pub fn store() -> GraphStore {
        GraphStore::new()
    }
}
