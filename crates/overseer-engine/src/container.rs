//! Hierarchical state container
//!
//! A container composes leaf states and nested containers into a tree,
//! executes exactly one active child per tick, and resolves child outcomes
//! through its transition map - either re-entering a sibling or bubbling a
//! container-level outcome up to its own parent. Structural consistency is
//! checked when children are added and when the tree is confirmed, so a
//! malformed tree never begins running.

use std::collections::{BTreeSet, HashMap};

use overseer_core::{
    AutonomyCell, ContainerEntry, ExecutionFault, LookupError, Outcome, StructureError, PREEMPTED,
};
use tracing::{debug, warn};

use crate::gate::AutonomyGate;
use crate::state::Node;
use crate::userdata::{DataScope, ScopedUserData};

/// Per-tick inputs resolved by the engine's command drain.
#[derive(Clone, Debug, Default)]
pub struct TickInputs {
    /// Preemption was requested; the active leaf produces `preempted`
    /// instead of executing.
    pub preempt: bool,
    /// Operator-forced outcome for a named state. Bypasses the autonomy
    /// gate at the state that matches.
    pub forced: Option<ForcedOutcome>,
}

#[derive(Clone, Debug)]
pub struct ForcedOutcome {
    pub label: String,
    pub outcome: Outcome,
}

/// The deepest currently-executing leaf.
#[derive(Clone, Debug)]
pub struct DeepActive {
    pub label: String,
    pub path: String,
    pub outcomes: Vec<Outcome>,
}

struct ChildSlot {
    label: String,
    path: String,
    node: Node,
    transitions: HashMap<Outcome, String>,
    remap: HashMap<String, String>,
    /// Whether `on_enter` is still owed before the next execute.
    entering: bool,
    /// Outcome a nested container produced but the gate denied. The inner
    /// machine has already torn down, so the outcome is re-offered to the
    /// gate on later ticks instead of re-entering the machine.
    pending: Option<Outcome>,
}

pub struct StateContainer {
    name: String,
    path: String,
    outcomes: Vec<Outcome>,
    children: Vec<ChildSlot>,
    labels: HashMap<String, usize>,
    current: Option<usize>,
    gate: AutonomyGate,
    controlled: bool,
}

impl StateContainer {
    /// Create an empty container. The reserved `preempted` outcome is always
    /// part of a container's outcome set so preemption can bubble up.
    pub fn new(name: impl Into<String>, outcomes: &[&str], autonomy: AutonomyCell) -> Self {
        let mut outcomes: Vec<Outcome> = outcomes.iter().map(|o| Outcome::new(*o)).collect();
        if !outcomes.iter().any(Outcome::is_preempted) {
            outcomes.push(Outcome::preempted());
        }
        Self {
            name: name.into(),
            path: String::new(),
            outcomes,
            children: Vec::new(),
            labels: HashMap::new(),
            current: None,
            gate: AutonomyGate::new(autonomy),
            controlled: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn gate(&self) -> &AutonomyGate {
        &self.gate
    }

    pub fn is_controlled(&self) -> bool {
        self.controlled
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Register a child under this container.
    ///
    /// `transitions` maps each declared outcome of the child to a sibling
    /// label or one of this container's outcomes; `autonomy` gives the
    /// required autonomy level per outcome. Both must cover exactly the
    /// child's declared outcome set (the reserved `preempted` outcome is
    /// routed implicitly). `remap` maps child-local userdata keys to keys in
    /// this container's scope.
    pub fn add(
        &mut self,
        label: &str,
        node: Node,
        transitions: &[(&str, &str)],
        autonomy: &[(&str, u8)],
        remap: &[(&str, &str)],
    ) -> Result<(), StructureError> {
        if self.labels.contains_key(label) {
            return Err(StructureError::DuplicateLabel(label.to_string()));
        }
        let declared = node.outcomes();

        let mut transition_map = HashMap::new();
        for (outcome, target) in transitions {
            let outcome = Outcome::new(*outcome);
            if !declared.contains(&outcome) {
                return Err(StructureError::UnknownOutcome {
                    label: label.to_string(),
                    outcome: outcome.to_string(),
                });
            }
            transition_map.insert(outcome, target.to_string());
        }

        let mut autonomy_map = HashMap::new();
        for (outcome, level) in autonomy {
            let outcome = Outcome::new(*outcome);
            if !declared.contains(&outcome) {
                return Err(StructureError::UnknownOutcome {
                    label: label.to_string(),
                    outcome: outcome.to_string(),
                });
            }
            autonomy_map.insert(outcome, *level);
        }

        for outcome in &declared {
            if outcome.is_preempted() {
                continue;
            }
            if !transition_map.contains_key(outcome) {
                return Err(StructureError::MissingTransition {
                    label: label.to_string(),
                    outcome: outcome.to_string(),
                });
            }
            if !autonomy_map.contains_key(outcome) {
                return Err(StructureError::MissingAutonomy {
                    label: label.to_string(),
                    outcome: outcome.to_string(),
                });
            }
        }

        // preemption always bubbles to the container's own outcome
        transition_map
            .entry(Outcome::preempted())
            .or_insert_with(|| PREEMPTED.to_string());

        self.gate.register(label, autonomy_map);
        self.labels.insert(label.to_string(), self.children.len());
        self.children.push(ChildSlot {
            label: label.to_string(),
            path: String::new(),
            node,
            transitions: transition_map,
            remap: remap
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            entering: true,
            pending: None,
        });
        Ok(())
    }

    /// Validate cross-child consistency: transition targets must resolve and
    /// remap targets must name keys available in the parent scope. Called at
    /// confirmation time, after the whole tree is built, so forward
    /// references between siblings are fine.
    pub fn validate(&self, available_keys: &BTreeSet<String>) -> Result<(), StructureError> {
        if self.children.is_empty() {
            return Err(StructureError::EmptyContainer(self.name.clone()));
        }
        for slot in &self.children {
            for target in slot.transitions.values() {
                let is_sibling = self.labels.contains_key(target);
                let is_outcome = self.outcomes.iter().any(|o| o.as_str() == target);
                if !is_sibling && !is_outcome {
                    return Err(StructureError::UnknownTarget {
                        label: slot.label.clone(),
                        target: target.clone(),
                    });
                }
            }
            for target in slot.remap.values() {
                if !available_keys.contains(target) {
                    return Err(StructureError::UnknownRemapTarget {
                        label: slot.label.clone(),
                        target: target.clone(),
                    });
                }
            }
            if let Node::Container(inner) = &slot.node {
                let mut child_keys = available_keys.clone();
                child_keys.extend(slot.remap.keys().cloned());
                inner.validate(&child_keys)?;
            }
        }
        Ok(())
    }

    /// Assign hierarchical paths: a child's path is its parent's path plus
    /// `/label`. The root path is the empty string.
    pub fn assign_paths(&mut self, prefix: &str) {
        self.path = prefix.to_string();
        for slot in &mut self.children {
            let path = format!("{}/{}", prefix, slot.label);
            slot.path = path.clone();
            if let Node::Container(inner) = &mut slot.node {
                inner.assign_paths(&path);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Execute one step of the active child and resolve a produced outcome.
    ///
    /// Returns `Ok(None)` while the subtree keeps running (including when a
    /// transition was denied by the autonomy gate), `Ok(Some(outcome))` when
    /// a container-level outcome fired, and `Err` when the active leaf's step
    /// failed. On error the active state is left unchanged so an operator can
    /// inspect and retry. A denied outcome of a nested container is retained
    /// and re-offered to the gate on later ticks; a denied leaf outcome is
    /// dropped and the leaf simply executes again.
    pub fn execute(
        &mut self,
        data: &mut dyn DataScope,
        inputs: &TickInputs,
    ) -> Result<Option<Outcome>, ExecutionFault> {
        if self.children.is_empty() {
            return Ok(None);
        }
        let idx = *self.current.get_or_insert(0);
        let label = self.children[idx].label.clone();

        let mut forced_here = false;
        let produced = {
            let ChildSlot {
                node,
                remap,
                entering,
                pending,
                ..
            } = &mut self.children[idx];
            let mut view = ScopedUserData::new(data, remap);
            match node {
                Node::Leaf(state) => {
                    if inputs.preempt {
                        Some(Outcome::preempted())
                    } else if let Some(forced) =
                        inputs.forced.as_ref().filter(|f| f.label == label)
                    {
                        forced_here = true;
                        debug!("forcing outcome '{}' of state '{label}'", forced.outcome);
                        Some(forced.outcome.clone())
                    } else {
                        if *entering {
                            *entering = false;
                            state.on_enter(&mut view);
                        }
                        state
                            .execute(&mut view)
                            .map_err(|err| ExecutionFault::new(label.clone(), err))?
                    }
                }
                Node::Container(inner) => {
                    if let Some(held) = pending.take() {
                        // the inner machine already finished and tore down;
                        // re-offer its outcome without re-entering it
                        if inputs.preempt {
                            Some(Outcome::preempted())
                        } else {
                            Some(held)
                        }
                    } else {
                        inner.execute(&mut view, inputs)?
                    }
                }
            }
        };

        let Some(outcome) = produced else {
            return Ok(None);
        };

        // preemption and operator-forced outcomes are overrides; everything
        // else must pass the autonomy gate
        let bypass_gate = outcome.is_preempted() || forced_here;
        if !bypass_gate && !self.gate.is_transition_allowed(&label, &outcome) {
            debug!(
                "outcome '{}' of state '{}' denied at autonomy level {}",
                outcome,
                label,
                self.gate.cell().get()
            );
            // a leaf stays active and executes again; a finished inner
            // machine must hold its outcome instead of restarting
            if matches!(self.children[idx].node, Node::Container(_)) {
                self.children[idx].pending = Some(outcome);
            }
            return Ok(None);
        }

        let Some(target) = self.children[idx].transitions.get(&outcome).cloned() else {
            // unreachable on a validated tree; deny rather than panic
            warn!("no transition for outcome '{outcome}' of state '{label}'");
            return Ok(None);
        };

        self.exit_child(idx, data);
        if let Some(&next) = self.labels.get(&target) {
            self.current = Some(next);
            Ok(None)
        } else {
            self.current = None;
            Ok(Some(Outcome::new(target)))
        }
    }

    fn exit_child(&mut self, idx: usize, data: &mut dyn DataScope) {
        let ChildSlot {
            node,
            remap,
            entering,
            ..
        } = &mut self.children[idx];
        if let Node::Leaf(state) = node {
            if !*entering {
                let mut view = ScopedUserData::new(data, remap);
                state.on_exit(&mut view);
            }
        }
        *entering = true;
    }

    /// The deepest currently-executing leaf, following "current child"
    /// pointers down through nested containers. `None` while inactive.
    pub fn deep_active(&self) -> Option<DeepActive> {
        let idx = self.current?;
        let slot = &self.children[idx];
        match &slot.node {
            Node::Leaf(state) => Some(DeepActive {
                label: slot.label.clone(),
                path: slot.path.clone(),
                outcomes: state.outcomes().to_vec(),
            }),
            Node::Container(inner) => inner.deep_active(),
        }
    }

    pub fn active_deep_path(&self) -> Option<String> {
        self.deep_active().map(|deep| deep.path)
    }

    /// Required autonomy of an outcome of the currently active child.
    pub fn required_autonomy(&self, outcome: &Outcome) -> Result<u8, LookupError> {
        let idx = self.current.ok_or_else(|| LookupError {
            label: "<inactive>".to_string(),
            outcome: outcome.to_string(),
        })?;
        self.gate.required_autonomy(&self.children[idx].label, outcome)
    }

    // -----------------------------------------------------------------------
    // Lifecycle and description
    // -----------------------------------------------------------------------

    /// Invoke every descendant's start hook, parents before children.
    pub fn notify_start(&mut self) {
        for slot in &mut self.children {
            match &mut slot.node {
                Node::Leaf(state) => state.on_start(),
                Node::Container(inner) => inner.notify_start(),
            }
        }
    }

    /// Invoke every descendant's stop hook exactly once, depth-first, and
    /// drop the remote-control flag on every level on the way out.
    pub fn notify_stop(&mut self) {
        for slot in &mut self.children {
            match &mut slot.node {
                Node::Leaf(state) => state.on_stop(),
                Node::Container(inner) => inner.notify_stop(),
            }
        }
        self.controlled = false;
    }

    /// Enable or disable remote control on this container and every nested
    /// container below it.
    pub fn set_controlled(&mut self, controlled: bool) {
        self.controlled = controlled;
        for slot in &mut self.children {
            if let Node::Container(inner) = &mut slot.node {
                inner.set_controlled(controlled);
            }
        }
    }

    /// Describe this subtree: one entry per node, depth-first with each
    /// parent's entry before its children's own, so a receiver can rebuild
    /// the tree top-down.
    pub fn describe(&self) -> Vec<ContainerEntry> {
        let mut entries = Vec::new();
        self.add_to_description(&mut entries);
        entries
    }

    fn add_to_description(&self, out: &mut Vec<ContainerEntry>) -> usize {
        let own = out.len();
        out.push(ContainerEntry {
            path: self.path.clone(),
            children: self.children.iter().map(|s| s.label.clone()).collect(),
            outcomes: self.outcomes.iter().map(Outcome::to_string).collect(),
            transitions: Vec::new(),
            autonomy: Vec::new(),
        });
        for slot in &self.children {
            let declared = slot.node.outcomes();
            let entry = match &slot.node {
                Node::Container(inner) => inner.add_to_description(out),
                Node::Leaf(_) => {
                    out.push(ContainerEntry {
                        path: slot.path.clone(),
                        children: Vec::new(),
                        outcomes: Vec::new(),
                        transitions: Vec::new(),
                        autonomy: Vec::new(),
                    });
                    out.len() - 1
                }
            };
            out[entry].outcomes = declared.iter().map(Outcome::to_string).collect();
            out[entry].transitions = declared
                .iter()
                .map(|oc| slot.transitions.get(oc).cloned().unwrap_or_default())
                .collect();
            out[entry].autonomy = declared
                .iter()
                .map(|oc| self.gate.required_autonomy(&slot.label, oc).unwrap_or(0))
                .collect();
        }
        own
    }
}
