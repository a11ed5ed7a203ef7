//! Core types for Overseer

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Identifier assigned to a running behavior instance at confirmation time.
/// Disambiguates which engine a synchronization message belongs to.
pub type BehaviorId = i32;

/// Autonomy level meaning "no gating - run unattended, remote control disabled".
pub const AUTONOMY_UNATTENDED: u8 = 255;

/// Default autonomy level a fresh engine starts at.
pub const AUTONOMY_DEFAULT: u8 = 3;

/// Reserved outcome used to propagate preemption up the container hierarchy.
pub const PREEMPTED: &str = "preempted";

/// Terminal symbol produced by a state when it finishes a unit of work.
/// Cheaply cloneable; outcomes are declared at construction and immutable.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Outcome(Arc<str>);

impl Outcome {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    /// The reserved preemption outcome.
    pub fn preempted() -> Self {
        Self::new(PREEMPTED)
    }

    pub fn is_preempted(&self) -> bool {
        &*self.0 == PREEMPTED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Outcome {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Outcome {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Process-wide autonomy level as a shared cell.
///
/// Replaces an implicit global: the cell is explicitly threaded through
/// construction into every gate that reads it. Writes come only from the
/// engine's command drain, so there is a single writer by discipline.
#[derive(Clone, Debug)]
pub struct AutonomyCell(Arc<AtomicU8>);

impl AutonomyCell {
    pub fn new(level: u8) -> Self {
        Self(Arc::new(AtomicU8::new(level)))
    }

    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, level: u8) {
        self.0.store(level, Ordering::Relaxed);
    }

    /// True when gating is disabled entirely (level 255).
    pub fn is_unattended(&self) -> bool {
        self.get() == AUTONOMY_UNATTENDED
    }
}

impl Default for AutonomyCell {
    fn default() -> Self {
        Self::new(AUTONOMY_DEFAULT)
    }
}

/// Adler-32 checksum of a state path with the top bit cleared, or `0` when no
/// path is active. Cheap enough to recompute for every continuous status
/// message (O(path length), no allocation).
pub fn path_checksum(path: Option<&str>) -> u32 {
    match path {
        Some(p) => adler32::RollingAdler32::from_buffer(p.as_bytes()).hash() & 0x7fff_ffff,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic() {
        let a = path_checksum(Some("/Scan/Approach"));
        let b = path_checksum(Some("/Scan/Approach"));
        assert_eq!(a, b);
        assert_ne!(a, path_checksum(Some("/Scan/Retreat")));
    }

    #[test]
    fn checksum_of_absent_path_is_zero() {
        assert_eq!(path_checksum(None), 0);
    }

    #[test]
    fn checksum_top_bit_is_cleared() {
        assert!(path_checksum(Some("/A")) < 0x8000_0000);
    }
}
