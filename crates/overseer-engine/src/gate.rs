//! The autonomy gate
//!
//! Every container carries one gate holding the required autonomy level for
//! each (child label, outcome) pair, plus a handle to the shared process-wide
//! autonomy level. A transition fires only if its required level is strictly
//! below the current level, so raising the level can only unlock more
//! transitions, never fewer.

use std::collections::HashMap;

use overseer_core::{AutonomyCell, LookupError, Outcome};

pub struct AutonomyGate {
    cell: AutonomyCell,
    required: HashMap<String, HashMap<Outcome, u8>>,
}

impl AutonomyGate {
    pub fn new(cell: AutonomyCell) -> Self {
        Self {
            cell,
            required: HashMap::new(),
        }
    }

    pub fn cell(&self) -> &AutonomyCell {
        &self.cell
    }

    /// Register the required levels for one child. Called by the container's
    /// `add`, which has already validated the key set.
    pub(crate) fn register(&mut self, label: &str, levels: HashMap<Outcome, u8>) {
        self.required.insert(label.to_string(), levels);
    }

    /// Whether a transition out of `label` via `outcome` may fire right now.
    /// An unregistered pair is never allowed (required level effectively
    /// infinite).
    pub fn is_transition_allowed(&self, label: &str, outcome: &Outcome) -> bool {
        match self.required.get(label).and_then(|m| m.get(outcome)) {
            Some(required) => u32::from(*required) < u32::from(self.cell.get()),
            None => false,
        }
    }

    /// Required level for a registered pair, for UI/telemetry. Unlike the
    /// permissive check above, an unknown pair is an error here.
    pub fn required_autonomy(&self, label: &str, outcome: &Outcome) -> Result<u8, LookupError> {
        self.required
            .get(label)
            .and_then(|m| m.get(outcome))
            .copied()
            .ok_or_else(|| LookupError {
                label: label.to_string(),
                outcome: outcome.to_string(),
            })
    }
}
