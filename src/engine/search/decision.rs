use std::cell::RefCell;
use std::rc::Rc;

use crate::basic_types::Failure;
use crate::basic_types::PropagationStatus;
use crate::engine::search::monitor::MonitorRef;
use crate::engine::solver::Solver;

/// A binary branching unit.
///
/// `apply` is taken on the left branch, `refute` on the right; both may narrow domains and
/// fail. A decision is shared between the driver and the choice-point marker that owns the
/// right branch, hence the `Rc` in [`DecisionRef`].
pub trait Decision {
    fn apply(&self, solver: &mut Solver) -> PropagationStatus;

    fn refute(&self, solver: &mut Solver) -> PropagationStatus;

    fn debug_string(&self) -> String {
        "Decision".to_owned()
    }
}

pub type DecisionRef = Rc<dyn Decision>;

/// Produces the next [`Decision`] at the current search node.
pub trait DecisionBuilder {
    /// The next decision, or `Ok(None)` when the node is a leaf (solution candidate).
    /// Returning `Err` fails the node immediately (the rendition of the engine's
    /// distinguished fail decision).
    fn next(&mut self, solver: &mut Solver) -> Result<Option<DecisionRef>, Failure>;

    /// Extra monitors this builder wants installed for the search it drives.
    fn append_monitors(&mut self, solver: &mut Solver) -> Vec<MonitorRef> {
        let _ = solver;
        Vec::new()
    }

    fn debug_string(&self) -> String {
        "DecisionBuilder".to_owned()
    }
}

/// What the branch selector wants done with the decision the builder produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionModification {
    /// Apply the decision and push a choice point, the default.
    NoChange,
    /// Explore the right branch first (the decision is wrapped in [`ReverseDecision`]).
    SwitchBranches,
    /// Apply only; the right branch is permanently discarded.
    KeepLeft,
    /// Refute only; the left branch is permanently discarded.
    KeepRight,
    /// Fail the node without exploring either branch.
    KillBoth,
}

/// Per-search hook that may rewrite the branching of every decision.
pub type BranchSelector = Rc<RefCell<dyn FnMut(&mut Solver) -> DecisionModification>>;

/// Swaps the branches of a decision.
pub(crate) struct ReverseDecision {
    decision: DecisionRef,
}

impl ReverseDecision {
    pub(crate) fn new(decision: DecisionRef) -> ReverseDecision {
        ReverseDecision { decision }
    }
}

impl Decision for ReverseDecision {
    fn apply(&self, solver: &mut Solver) -> PropagationStatus {
        self.decision.refute(solver)
    }

    fn refute(&self, solver: &mut Solver) -> PropagationStatus {
        self.decision.apply(solver)
    }

    fn debug_string(&self) -> String {
        format!("Reverse({})", self.decision.debug_string())
    }
}
