//! Wire protocol between a running engine and its mirror/operator UI
//!
//! Outbound (engine -> mirror):
//!   behavior/status            BehaviorStatus        high frequency, cheap
//!   behavior/mirror/structure  StructureDescription  on demand
//!   behavior/feedback          CommandAck            on command completion
//!   behavior/log               BehaviorLogEvent      fire-and-forget
//!
//! Inbound (operator -> engine), drained once per tick, never inline:
//!   command/autonomy    AutonomyCommand    negative level = preempt now
//!   command/sync        SyncCommand        request explicit resync
//!   command/attach      AttachCommand      attach mirror at a new level
//!   command/structure   StructureRequest   request the full tree description
//!   command/preempt     PreemptCommand     stop, honored even unattended
//!   command/transition  OutcomeRequest     force an outcome of the active state

use serde::{Deserialize, Serialize};

use crate::types::BehaviorId;

/// Topic names used on the message bus.
pub mod topic {
    pub const STATUS: &str = "behavior/status";
    pub const STRUCTURE: &str = "behavior/mirror/structure";
    pub const FEEDBACK: &str = "behavior/feedback";
    pub const LOG: &str = "behavior/log";

    pub const CMD_AUTONOMY: &str = "command/autonomy";
    pub const CMD_SYNC: &str = "command/sync";
    pub const CMD_ATTACH: &str = "command/attach";
    pub const CMD_STRUCTURE: &str = "command/structure";
    pub const CMD_PREEMPT: &str = "command/preempt";
    pub const CMD_TRANSITION: &str = "command/transition";
}

// ---------------------------------------------------------------------------
// Engine -> mirror
// ---------------------------------------------------------------------------

/// Continuous status: which behavior is running and a checksum of its deep
/// active path. `path_checksum` is `0` when no state is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorStatus {
    pub behavior_id: BehaviorId,
    pub path_checksum: u32,
}

/// One node of the structural description. `transitions` and `autonomy` are
/// aligned with `outcomes` by index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEntry {
    pub path: String,
    #[serde(default)]
    pub children: Vec<String>,
    pub outcomes: Vec<String>,
    #[serde(default)]
    pub transitions: Vec<String>,
    #[serde(default)]
    pub autonomy: Vec<u8>,
}

/// Full structural description of a behavior tree, depth-first with every
/// parent listed before its children's own entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureDescription {
    pub behavior_id: BehaviorId,
    pub containers: Vec<ContainerEntry>,
}

/// Acknowledgement that an operator command was processed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandAck {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

/// Severity of a behavior log event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured log line mirrored to remote UIs in addition to local tracing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorLogEvent {
    pub text: String,
    pub severity: LogSeverity,
}

// ---------------------------------------------------------------------------
// Operator -> engine
// ---------------------------------------------------------------------------

/// Change the autonomy level. A negative level is the preempt sentinel: it
/// requests an immediate stop instead of a level change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutonomyCommand {
    pub level: i32,
}

/// Request an explicit resynchronization. Empty payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCommand {}

/// Attach a mirror: set the autonomy level, enable remote control, and
/// schedule an explicit sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachCommand {
    pub level: u8,
}

/// Request the full structural description. Carries the requesting mirror's
/// identity for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureRequest {
    pub mirror_id: i32,
}

/// Stop the behavior. Honored even when no mirror is attached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreemptCommand {}

/// Force an outcome of the currently active state. `outcome` indexes the
/// target state's declared outcome list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRequest {
    pub target: String,
    pub outcome: usize,
}
