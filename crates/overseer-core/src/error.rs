//! Error taxonomy for Overseer
//!
//! `StructureError` is fatal at build/confirm time and never raised during
//! execution; a malformed tree must not begin running. `ExecutionFault` and
//! `ProtocolFault` are recovered locally and surfaced through logs and the
//! engine's retained last fault - the tree stays alive and inspectable.

use thiserror::Error;

/// Malformed tree detected while building or confirming a container.
#[derive(Error, Debug)]
pub enum StructureError {
    #[error("duplicate label '{0}' in container")]
    DuplicateLabel(String),

    #[error("transition declared for unknown outcome '{outcome}' of state '{label}'")]
    UnknownOutcome { label: String, outcome: String },

    #[error("missing transition for outcome '{outcome}' of state '{label}'")]
    MissingTransition { label: String, outcome: String },

    #[error("missing autonomy entry for outcome '{outcome}' of state '{label}'")]
    MissingAutonomy { label: String, outcome: String },

    #[error("transition of state '{label}' targets '{target}', which is neither a sibling label nor a container outcome")]
    UnknownTarget { label: String, target: String },

    #[error("remap target '{target}' of state '{label}' is not an available userdata key")]
    UnknownRemapTarget { label: String, target: String },

    #[error("container '{0}' has no states")]
    EmptyContainer(String),

    #[error("engine '{0}' is already confirmed")]
    AlreadyConfirmed(String),
}

/// A state's execution step failed. Retained by the engine instead of
/// propagating, so an operator can inspect and intervene.
#[derive(Error, Debug)]
#[error("failed to execute state '{label}': {source}")]
pub struct ExecutionFault {
    pub label: String,
    #[source]
    pub source: anyhow::Error,
}

impl ExecutionFault {
    pub fn new(label: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            label: label.into(),
            source,
        }
    }
}

/// Failure while resolving the active path or emitting a sync/structure
/// message. Recovered locally; a best-effort degraded message is still sent.
#[derive(Error, Debug)]
pub enum ProtocolFault {
    #[error("no active deep state")]
    NoActiveState,

    #[error("engine is not confirmed yet")]
    NotConfirmed,
}

/// Autonomy lookup for a pair that is not registered.
#[derive(Error, Debug)]
#[error("no autonomy entry for outcome '{outcome}' of state '{label}'")]
pub struct LookupError {
    pub label: String,
    pub outcome: String,
}
