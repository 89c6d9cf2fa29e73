//! Import pipeline: a write-coalescing engine plus a recursive, concurrent
//! crawl that populates the pedigree graph from an external registry.
//!
//! All graph mutations flow through the [`WriteCoalescer`]; the
//! [`PedigreeImporter`] drives it while guaranteeing at-most-one in-flight
//! build per canonical registry id.

pub mod builders;
pub mod coalescer;
pub mod json_source;
pub mod pipeline;

pub use coalescer::{BuildError, BuildFn, BuildHandle, WriteCoalescer};
pub use json_source::JsonFileSource;
pub use pipeline::PedigreeImporter;
