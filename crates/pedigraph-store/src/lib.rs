//! Embedded transactional graph store.
//!
//! The pedigree system consumes a graph store through a narrow surface:
//! single-writer transactions with rollback, indexed node lookup under
//! uniqueness constraints, and typed directed relationship access. This
//! crate provides that surface over an in-memory graph guarded by a
//! readers-writer lock; any number of concurrent readers, one writer.

mod store;
mod tx;

pub use store::{GraphStore, NodeId, RelId, RelRecord};
pub use tx::{ReadTx, WriteTx};
