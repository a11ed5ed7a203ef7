//! Overseer Engine - supervised hierarchical behavior execution
//!
//! A behavior is a tree of states: leaves do the work, containers compose
//! them and resolve child outcomes into their own. Exactly one state executes
//! at a time. Every transition is gated by an operator-controlled autonomy
//! level, a failing state is isolated instead of crashing the tree, and a
//! remote mirror is kept in sync through a cheap path checksum with an
//! explicit full-resync fallback.

pub mod container;
pub mod engine;
pub mod gate;
pub mod logger;
pub mod state;
pub mod userdata;

pub use container::StateContainer;
pub use engine::BehaviorEngine;
pub use gate::AutonomyGate;
pub use logger::BehaviorLogger;
pub use state::{BehaviorState, Node};
pub use userdata::{DataScope, ScopedUserData, UserData};
