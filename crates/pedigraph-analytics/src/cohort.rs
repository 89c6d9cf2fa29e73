use std::collections::BTreeSet;

use pedigraph_core::{props, Direction, Label, PropValue, RegistryId, RelType};
use pedigraph_store::{NodeId, ReadTx};

/// Every dog belonging to one of the named breeds, resolved through both
/// the synonym layer and the canonical breed taxonomy. Names that match
/// nothing in the graph contribute nothing.
pub fn cohort_dogs(tx: &ReadTx<'_>, breeds: &[String]) -> Vec<NodeId> {
    let mut synonyms: BTreeSet<NodeId> = BTreeSet::new();
    for name in breeds {
        let value = PropValue::from(name.as_str());
        if let Some(synonym) = tx.find_node(Label::BreedSynonym, props::NAME, &value) {
            synonyms.insert(synonym);
        }
        // A canonical breed name covers all synonyms attached to it.
        if let Some(breed) = tx.find_node(Label::Breed, props::NAME, &value) {
            for rel in tx.relationships(breed, Some(RelType::MemberOf), Direction::Incoming) {
                if tx.label(rel.from) == Some(Label::BreedSynonym) {
                    synonyms.insert(rel.from);
                }
            }
        }
    }

    let mut dogs: BTreeSet<NodeId> = BTreeSet::new();
    for synonym in synonyms {
        for rel in tx.relationships(synonym, Some(RelType::IsBreed), Direction::Incoming) {
            dogs.insert(rel.from);
        }
    }
    dogs.into_iter().collect()
}

pub(crate) fn registry_id(tx: &ReadTx<'_>, node: NodeId) -> Option<RegistryId> {
    tx.get_property(node, props::REGISTRY_ID)
        .and_then(|value| value.as_str().map(RegistryId::from))
}
