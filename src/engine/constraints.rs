use crate::basic_types::Failure;
use crate::basic_types::PropagationStatus;
use crate::containers::Arena;
use crate::containers::Handle;
use crate::engine::demon::Demon;
use crate::engine::demon::DemonPriority;
use crate::engine::propagation::PostContext;
use crate::engine::propagation::PropagationContext;
use crate::engine::propagation::RunContext;

/// Identifies a constraint owned by a [`crate::Solver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintId {
    id: u32,
}

impl Handle for ConstraintId {
    fn from_index(index: usize) -> Self {
        ConstraintId { id: index as u32 }
    }

    fn index(self) -> usize {
        self.id as usize
    }
}

pub(crate) type ConstraintStore = Arena<ConstraintId, Box<dyn Constraint>>;

/// The contract between the engine and a domain constraint.
///
/// `post` subscribes the constraint's demons to its variables and must not narrow any domain;
/// `initial_propagate` performs the first narrowing pass. Both run inside a freeze window
/// (see [`crate::Solver::add_constraint`]), so the queue drains once at the end.
pub trait Constraint {
    /// Subscribe demons to the constraint's variables. Never narrows a domain.
    fn post(&mut self, context: &mut PostContext<'_>);

    /// First propagation pass; may narrow domains.
    fn initial_propagate(&mut self, context: &mut PropagationContext<'_>) -> PropagationStatus;

    /// Main reaction, called by the generic constraint demon created through
    /// [`PostContext::make_constraint_demon`]. Constraints with specialised demons can leave
    /// the default.
    fn propagate(&mut self, context: &mut PropagationContext<'_>) -> PropagationStatus {
        let _ = context;
        Ok(())
    }

    fn debug_string(&self) -> String {
        "Constraint".to_owned()
    }
}

/// Generic demon calling back into its constraint's [`Constraint::propagate`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct ConstraintDemon {
    constraint: ConstraintId,
    priority: DemonPriority,
}

impl ConstraintDemon {
    pub(crate) fn new(constraint: ConstraintId, priority: DemonPriority) -> ConstraintDemon {
        ConstraintDemon {
            constraint,
            priority,
        }
    }
}

impl Demon for ConstraintDemon {
    fn run(&mut self, context: &mut RunContext<'_>) -> PropagationStatus {
        context.propagate_constraint(self.constraint)
    }

    fn priority(&self) -> DemonPriority {
        self.priority
    }

    fn debug_string(&self) -> String {
        format!("ConstraintDemon({:?})", self.constraint)
    }
}

/// The constraint that is always satisfied.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrueConstraint;

impl Constraint for TrueConstraint {
    fn post(&mut self, _: &mut PostContext<'_>) {}

    fn initial_propagate(&mut self, _: &mut PropagationContext<'_>) -> PropagationStatus {
        Ok(())
    }

    fn debug_string(&self) -> String {
        "TrueConstraint".to_owned()
    }
}

/// The constraint that always fails. Posted by the engine when `fail()` is called outside a
/// search, so that the next propagation fails deterministically.
#[derive(Clone, Debug, Default)]
pub struct FalseConstraint {
    explanation: String,
}

impl FalseConstraint {
    pub fn new(explanation: impl Into<String>) -> FalseConstraint {
        FalseConstraint {
            explanation: explanation.into(),
        }
    }
}

impl Constraint for FalseConstraint {
    fn post(&mut self, _: &mut PostContext<'_>) {}

    fn initial_propagate(&mut self, _: &mut PropagationContext<'_>) -> PropagationStatus {
        Err(Failure)
    }

    fn debug_string(&self) -> String {
        if self.explanation.is_empty() {
            "FalseConstraint".to_owned()
        } else {
            format!("FalseConstraint({})", self.explanation)
        }
    }
}
