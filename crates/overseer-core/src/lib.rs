//! Overseer Core - shared types, wire protocol, and error taxonomy

pub mod config;
pub mod error;
pub mod protocol;
pub mod types;

pub use config::EngineConfig;
pub use error::{ExecutionFault, LookupError, ProtocolFault, StructureError};
pub use protocol::*;
pub use types::*;
