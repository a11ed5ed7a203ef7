//! The leaf execution primitive and the node sum type

use overseer_core::Outcome;

use crate::container::StateContainer;
use crate::userdata::DataScope;

/// A single unit of work with typed outcomes.
///
/// `execute` is called once per tick while the state is active. Returning
/// `Ok(None)` keeps the state active; returning `Ok(Some(outcome))` asks the
/// surrounding container to transition (subject to the autonomy gate). Errors
/// are isolated by the engine's fail-safe wrapper: the state stays active and
/// the fault is retained for inspection.
pub trait BehaviorState: Send {
    /// Outcomes this state may terminate with. Declared at construction,
    /// immutable afterwards.
    fn outcomes(&self) -> &[Outcome];

    /// Called when the state becomes active, before its first `execute`.
    fn on_enter(&mut self, _data: &mut dyn DataScope) {}

    /// Execute one step of work.
    fn execute(&mut self, data: &mut dyn DataScope) -> anyhow::Result<Option<Outcome>>;

    /// Called when the state is left for another state.
    fn on_exit(&mut self, _data: &mut dyn DataScope) {}

    /// Called once when the whole behavior starts.
    fn on_start(&mut self) {}

    /// Called once when the whole behavior stops or is preempted.
    fn on_stop(&mut self) {}
}

/// A node of the behavior tree: a leaf state or a nested container.
///
/// A closed sum type instead of runtime type inspection; traversal recurses
/// by matching on the variant.
pub enum Node {
    Leaf(Box<dyn BehaviorState>),
    Container(StateContainer),
}

impl Node {
    pub fn leaf(state: impl BehaviorState + 'static) -> Self {
        Self::Leaf(Box::new(state))
    }

    pub fn container(container: StateContainer) -> Self {
        Self::Container(container)
    }

    /// Declared outcomes of this node.
    pub fn outcomes(&self) -> Vec<Outcome> {
        match self {
            Node::Leaf(state) => state.outcomes().to_vec(),
            Node::Container(c) => c.outcomes().to_vec(),
        }
    }
}
