pub mod config;
pub mod error;
pub mod record;
pub mod source;
pub mod types;

pub use config::*;
pub use error::*;
pub use record::*;
pub use source::*;
pub use types::*;
