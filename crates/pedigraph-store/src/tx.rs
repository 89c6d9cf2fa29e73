use std::collections::HashMap;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use pedigraph_core::{Direction, Label, PedigraphError, PropValue, RelType, Result};

use crate::store::{NodeId, RelData, RelId, RelRecord, StoreInner};

/// Read transaction: a shared snapshot of committed state.
pub struct ReadTx<'a> {
    inner: RwLockReadGuard<'a, StoreInner>,
}

impl<'a> ReadTx<'a> {
    pub(crate) fn new(inner: RwLockReadGuard<'a, StoreInner>) -> Self {
        Self { inner }
    }

    /// Indexed lookup of a node by a unique property.
    pub fn find_node(&self, label: Label, key: &str, value: &PropValue) -> Option<NodeId> {
        self.inner.find_unique(label, key, value)
    }

    pub fn get_property(&self, node: NodeId, key: &str) -> Option<PropValue> {
        self.inner.nodes.get(&node)?.props.get(key).cloned()
    }

    pub fn has_property(&self, node: NodeId, key: &str) -> bool {
        self.get_property(node, key).is_some()
    }

    pub fn label(&self, node: NodeId) -> Option<Label> {
        self.inner.nodes.get(&node).map(|n| n.label)
    }

    pub fn relationships(
        &self,
        node: NodeId,
        rel_type: Option<RelType>,
        direction: Direction,
    ) -> Vec<RelRecord> {
        self.inner.relationships(node, rel_type, direction)
    }

    pub fn nodes_with_label(&self, label: Label) -> Vec<NodeId> {
        self.inner.nodes_with_label(label)
    }

    pub fn node_count(&self) -> usize {
        self.inner.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.inner.rels.len()
    }
}

enum UndoOp {
    CreateNode(NodeId),
    CreateRel(RelId),
    DeleteRel(RelId, RelData),
    SetProp {
        node: NodeId,
        key: String,
        old: Option<PropValue>,
    },
}

/// Write transaction. Mutations apply to live state under the exclusive
/// lock and are recorded in an undo log; dropping the transaction without
/// committing replays the log in reverse.
pub struct WriteTx<'a> {
    inner: RwLockWriteGuard<'a, StoreInner>,
    undo: Vec<UndoOp>,
    committed: bool,
}

impl<'a> WriteTx<'a> {
    pub(crate) fn new(inner: RwLockWriteGuard<'a, StoreInner>) -> Self {
        Self {
            inner,
            undo: Vec::new(),
            committed: false,
        }
    }

    pub fn create_node(&mut self, label: Label) -> NodeId {
        let id = self.inner.create_node(label);
        self.undo.push(UndoOp::CreateNode(id));
        id
    }

    /// Look up a node by unique property, creating it when absent.
    ///
    /// Only valid for constrained (label, key) pairs; anything else is a
    /// contract violation surfaced as a store error.
    pub fn find_or_create_node(
        &mut self,
        label: Label,
        key: &str,
        value: PropValue,
    ) -> Result<NodeId> {
        if !self.inner.is_constrained(label, key) {
            return Err(PedigraphError::Store(format!(
                "no uniqueness constraint on {}.{}",
                label, key
            )));
        }
        if let Some(existing) = self.inner.find_unique(label, key, &value) {
            return Ok(existing);
        }
        let id = self.create_node(label);
        self.set_property(id, key, value)?;
        Ok(id)
    }

    pub fn set_property(&mut self, node: NodeId, key: &str, value: PropValue) -> Result<()> {
        let old = self.inner.set_property(node, key, value)?;
        self.undo.push(UndoOp::SetProp {
            node,
            key: key.to_string(),
            old,
        });
        Ok(())
    }

    pub fn get_property(&self, node: NodeId, key: &str) -> Option<PropValue> {
        self.inner.nodes.get(&node)?.props.get(key).cloned()
    }

    pub fn has_property(&self, node: NodeId, key: &str) -> bool {
        self.get_property(node, key).is_some()
    }

    pub fn find_node(&self, label: Label, key: &str, value: &PropValue) -> Option<NodeId> {
        self.inner.find_unique(label, key, value)
    }

    pub fn create_relationship(
        &mut self,
        from: NodeId,
        to: NodeId,
        rel_type: RelType,
        props: Vec<(&str, PropValue)>,
    ) -> Result<RelId> {
        let props: HashMap<String, PropValue> = props
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let id = self.inner.create_relationship(from, to, rel_type, props)?;
        self.undo.push(UndoOp::CreateRel(id));
        Ok(id)
    }

    pub fn delete_relationship(&mut self, id: RelId) -> Result<()> {
        let data = self.inner.delete_relationship(id)?;
        self.undo.push(UndoOp::DeleteRel(id, data));
        Ok(())
    }

    pub fn relationships(
        &self,
        node: NodeId,
        rel_type: Option<RelType>,
        direction: Direction,
    ) -> Vec<RelRecord> {
        self.inner.relationships(node, rel_type, direction)
    }

    /// Commit the transaction, making all mutations durable.
    pub fn commit(mut self) -> Result<()> {
        self.undo.clear();
        self.committed = true;
        Ok(())
    }
}

impl Drop for WriteTx<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for op in self.undo.drain(..).rev() {
            match op {
                UndoOp::CreateNode(id) => self.inner.remove_node(id),
                UndoOp::CreateRel(id) => {
                    let _ = self.inner.delete_relationship(id);
                }
                UndoOp::DeleteRel(id, data) => self.inner.restore_relationship(id, data),
                UndoOp::SetProp { node, key, old } => match old {
                    Some(value) => {
                        let _ = self.inner.set_property(node, &key, value);
                    }
                    None => self.inner.unset_property(node, &key),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::GraphStore;
    use pedigraph_core::{props, Direction, Label, PropValue, RelType};

    #[test]
    fn find_or_create_is_idempotent() {
        let store = GraphStore::new();
        let mut tx = store.write();
        let a = tx
            .find_or_create_node(Label::Dog, props::REGISTRY_ID, "NO/1/01".into())
            .unwrap();
        let b = tx
            .find_or_create_node(Label::Dog, props::REGISTRY_ID, "NO/1/01".into())
            .unwrap();
        assert_eq!(a, b);
        tx.commit().unwrap();

        let read = store.read();
        assert_eq!(read.nodes_with_label(Label::Dog).len(), 1);
        assert_eq!(
            read.find_node(Label::Dog, props::REGISTRY_ID, &"NO/1/01".into()),
            Some(a)
        );
    }

    #[test]
    fn unconstrained_key_is_rejected() {
        let store = GraphStore::new();
        let mut tx = store.write();
        assert!(tx
            .find_or_create_node(Label::Dog, props::NAME, "Rex".into())
            .is_err());
    }

    #[test]
    fn uniqueness_violation_is_an_error() {
        let store = GraphStore::new();
        let mut tx = store.write();
        let _a = tx
            .find_or_create_node(Label::Dog, props::REGISTRY_ID, "NO/1/01".into())
            .unwrap();
        let b = tx.create_node(Label::Dog);
        assert!(tx
            .set_property(b, props::REGISTRY_ID, "NO/1/01".into())
            .is_err());
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let store = GraphStore::new();
        {
            let mut tx = store.write();
            let a = tx
                .find_or_create_node(Label::Dog, props::REGISTRY_ID, "NO/1/01".into())
                .unwrap();
            tx.set_property(a, props::NAME, "Rex".into()).unwrap();
            // No commit.
        }
        let read = store.read();
        assert_eq!(read.node_count(), 0);
        assert_eq!(
            read.find_node(Label::Dog, props::REGISTRY_ID, &"NO/1/01".into()),
            None
        );

        drop(read);

        // The index entry is gone too: a later insert must succeed.
        let mut tx = store.write();
        tx.find_or_create_node(Label::Dog, props::REGISTRY_ID, "NO/1/01".into())
            .unwrap();
        tx.commit().unwrap();
        assert_eq!(store.read().node_count(), 1);
    }

    #[test]
    fn relationship_delete_and_rollback() {
        let store = GraphStore::new();
        let (a, b, rel) = {
            let mut tx = store.write();
            let a = tx
                .find_or_create_node(Label::Dog, props::REGISTRY_ID, "NO/1/01".into())
                .unwrap();
            let b = tx
                .find_or_create_node(Label::Dog, props::REGISTRY_ID, "NO/2/01".into())
                .unwrap();
            let rel = tx
                .create_relationship(
                    a,
                    b,
                    RelType::HasParent,
                    vec![(props::ROLE, "father".into())],
                )
                .unwrap();
            tx.commit().unwrap();
            (a, b, rel)
        };

        // Deleting inside an aborted transaction restores the edge.
        {
            let mut tx = store.write();
            tx.delete_relationship(rel).unwrap();
            assert!(tx
                .relationships(a, Some(RelType::HasParent), Direction::Outgoing)
                .is_empty());
        }
        let read = store.read();
        let out = read.relationships(a, Some(RelType::HasParent), Direction::Outgoing);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, b);
        assert_eq!(out[0].role(), Some("father"));
        let inc = read.relationships(b, Some(RelType::HasParent), Direction::Incoming);
        assert_eq!(inc.len(), 1);
        assert_eq!(inc[0].from, a);
    }

    #[test]
    fn typed_relationship_filtering() {
        let store = GraphStore::new();
        let mut tx = store.write();
        let dog = tx
            .find_or_create_node(Label::Dog, props::REGISTRY_ID, "NO/1/01".into())
            .unwrap();
        let synonym = tx
            .find_or_create_node(Label::BreedSynonym, props::NAME, "boxer".into())
            .unwrap();
        let parent = tx
            .find_or_create_node(Label::Dog, props::REGISTRY_ID, "NO/2/01".into())
            .unwrap();
        tx.create_relationship(dog, synonym, RelType::IsBreed, vec![])
            .unwrap();
        tx.create_relationship(
            dog,
            parent,
            RelType::HasParent,
            vec![(props::ROLE, PropValue::from("mother"))],
        )
        .unwrap();
        tx.commit().unwrap();

        let read = store.read();
        assert_eq!(
            read.relationships(dog, Some(RelType::HasParent), Direction::Outgoing)
                .len(),
            1
        );
        assert_eq!(
            read.relationships(dog, None, Direction::Outgoing).len(),
            2
        );
        assert_eq!(
            read.relationships(synonym, Some(RelType::IsBreed), Direction::Incoming)
                .len(),
            1
        );
    }
}
