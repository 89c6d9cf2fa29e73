use std::collections::{BTreeSet, HashMap};
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use pedigraph_core::{props, Direction, Label, PedigraphError, PropValue, RelType, Result};

use crate::tx::{ReadTx, WriteTx};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelId(pub(crate) u64);

impl fmt::Display for RelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) label: Label,
    pub(crate) props: HashMap<String, PropValue>,
}

#[derive(Debug, Clone)]
pub(crate) struct RelData {
    pub(crate) from: NodeId,
    pub(crate) to: NodeId,
    pub(crate) rel_type: RelType,
    pub(crate) props: HashMap<String, PropValue>,
}

/// Snapshot of a relationship as returned by queries.
#[derive(Debug, Clone)]
pub struct RelRecord {
    pub id: RelId,
    pub from: NodeId,
    pub to: NodeId,
    pub rel_type: RelType,
    pub props: HashMap<String, PropValue>,
}

impl RelRecord {
    /// The `role` property, if the relationship carries one.
    pub fn role(&self) -> Option<&str> {
        self.props.get(props::ROLE).and_then(PropValue::as_str)
    }
}

/// Uniqueness constraints of the pedigree schema. `find_or_create_node`
/// only operates on constrained (label, key) pairs.
const CONSTRAINTS: &[(Label, &str)] = &[
    (Label::Dog, props::REGISTRY_ID),
    (Label::BreedSynonym, props::NAME),
    (Label::Breed, props::NAME),
    (Label::BreedGroup, props::GROUP_CODE),
    (Label::Litter, props::LITTER_ID),
];

#[derive(Debug, Default)]
pub(crate) struct StoreInner {
    next_id: u64,
    pub(crate) nodes: HashMap<NodeId, NodeData>,
    pub(crate) rels: HashMap<RelId, RelData>,
    outgoing: HashMap<NodeId, Vec<RelId>>,
    incoming: HashMap<NodeId, Vec<RelId>>,
    by_label: HashMap<Label, BTreeSet<NodeId>>,
    /// label -> property key -> value -> node, for constrained keys only.
    unique: HashMap<Label, HashMap<String, HashMap<PropValue, NodeId>>>,
}

impl StoreInner {
    fn with_constraints() -> Self {
        let mut inner = Self::default();
        for (label, key) in CONSTRAINTS {
            inner
                .unique
                .entry(*label)
                .or_default()
                .insert((*key).to_string(), HashMap::new());
        }
        inner
    }

    pub(crate) fn is_constrained(&self, label: Label, key: &str) -> bool {
        self.unique
            .get(&label)
            .is_some_and(|keys| keys.contains_key(key))
    }

    pub(crate) fn find_unique(&self, label: Label, key: &str, value: &PropValue) -> Option<NodeId> {
        self.unique.get(&label)?.get(key)?.get(value).copied()
    }

    pub(crate) fn create_node(&mut self, label: Label) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(
            id,
            NodeData {
                label,
                props: HashMap::new(),
            },
        );
        self.by_label.entry(label).or_default().insert(id);
        id
    }

    /// Set a node property, maintaining unique indexes. Returns the old
    /// value for the undo log.
    pub(crate) fn set_property(
        &mut self,
        node: NodeId,
        key: &str,
        value: PropValue,
    ) -> Result<Option<PropValue>> {
        let label = self
            .nodes
            .get(&node)
            .map(|n| n.label)
            .ok_or_else(|| PedigraphError::NodeNotFound(node.to_string()))?;

        if self.is_constrained(label, key) {
            if let Some(owner) = self.find_unique(label, key, &value) {
                if owner != node {
                    return Err(PedigraphError::Store(format!(
                        "uniqueness constraint violated: {}.{} = {:?} already owned by {}",
                        label, key, value, owner
                    )));
                }
            }
        }

        let old = self
            .nodes
            .get_mut(&node)
            .ok_or_else(|| PedigraphError::NodeNotFound(node.to_string()))?
            .props
            .insert(key.to_string(), value.clone());

        if self.is_constrained(label, key) {
            if let Some(index) = self.unique.get_mut(&label).and_then(|keys| keys.get_mut(key)) {
                if let Some(ref old_value) = old {
                    index.remove(old_value);
                }
                index.insert(value, node);
            }
        }

        Ok(old)
    }

    /// Remove a property (undo path only). Cleans the unique index.
    pub(crate) fn unset_property(&mut self, node: NodeId, key: &str) {
        let Some(data) = self.nodes.get_mut(&node) else {
            return;
        };
        let label = data.label;
        let old = data.props.remove(key);
        if let (Some(old_value), true) = (old, self.is_constrained(label, key)) {
            if let Some(index) = self.unique.get_mut(&label).and_then(|k| k.get_mut(key)) {
                index.remove(&old_value);
            }
        }
    }

    pub(crate) fn remove_node(&mut self, node: NodeId) {
        if let Some(data) = self.nodes.remove(&node) {
            if let Some(set) = self.by_label.get_mut(&data.label) {
                set.remove(&node);
            }
            // Earlier undo entries normally unset indexed properties;
            // a bare create can still leave entries behind.
            if let Some(keys) = self.unique.get_mut(&data.label) {
                for index in keys.values_mut() {
                    index.retain(|_, owner| *owner != node);
                }
            }
        }
        self.outgoing.remove(&node);
        self.incoming.remove(&node);
    }

    pub(crate) fn create_relationship(
        &mut self,
        from: NodeId,
        to: NodeId,
        rel_type: RelType,
        props: HashMap<String, PropValue>,
    ) -> Result<RelId> {
        for node in [from, to] {
            if !self.nodes.contains_key(&node) {
                return Err(PedigraphError::NodeNotFound(node.to_string()));
            }
        }
        self.next_id += 1;
        let id = RelId(self.next_id);
        self.rels.insert(
            id,
            RelData {
                from,
                to,
                rel_type,
                props,
            },
        );
        self.outgoing.entry(from).or_default().push(id);
        self.incoming.entry(to).or_default().push(id);
        Ok(id)
    }

    pub(crate) fn delete_relationship(&mut self, id: RelId) -> Result<RelData> {
        let data = self
            .rels
            .remove(&id)
            .ok_or_else(|| PedigraphError::Store(format!("no such relationship: {}", id)))?;
        if let Some(out) = self.outgoing.get_mut(&data.from) {
            out.retain(|r| *r != id);
        }
        if let Some(inc) = self.incoming.get_mut(&data.to) {
            inc.retain(|r| *r != id);
        }
        Ok(data)
    }

    pub(crate) fn restore_relationship(&mut self, id: RelId, data: RelData) {
        self.outgoing.entry(data.from).or_default().push(id);
        self.incoming.entry(data.to).or_default().push(id);
        self.rels.insert(id, data);
    }

    pub(crate) fn relationships(
        &self,
        node: NodeId,
        rel_type: Option<RelType>,
        direction: Direction,
    ) -> Vec<RelRecord> {
        let ids = match direction {
            Direction::Outgoing => self.outgoing.get(&node),
            Direction::Incoming => self.incoming.get(&node),
        };
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.rels.get(id).map(|data| (*id, data)))
            .filter(|(_, data)| rel_type.is_none_or(|t| data.rel_type == t))
            .map(|(id, data)| RelRecord {
                id,
                from: data.from,
                to: data.to,
                rel_type: data.rel_type,
                props: data.props.clone(),
            })
            .collect()
    }

    pub(crate) fn nodes_with_label(&self, label: Label) -> Vec<NodeId> {
        self.by_label
            .get(&label)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// The embedded graph store. Cheap to share behind an `Arc`; hand out
/// transactions via [`GraphStore::read`] and [`GraphStore::write`].
#[derive(Debug)]
pub struct GraphStore {
    pub(crate) inner: RwLock<StoreInner>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::with_constraints()),
        }
    }

    /// Open a read transaction. Readers run concurrently and only ever
    /// observe committed state.
    pub fn read(&self) -> ReadTx<'_> {
        ReadTx::new(self.inner.read())
    }

    /// Open the single write transaction. Blocks until the current writer
    /// (if any) finishes. Dropping the transaction without calling
    /// `commit` rolls back every mutation.
    pub fn write(&self) -> WriteTx<'_> {
        WriteTx::new(self.inner.write())
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
