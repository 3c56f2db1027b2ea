//! A minimal library of decisions and decision builders, enough to drive a search over
//! integer and boolean variables. Richer phase libraries build on the same
//! [`Decision`]/[`DecisionBuilder`] contract.

use std::rc::Rc;

use crate::basic_types::Failure;
use crate::basic_types::PropagationStatus;
use crate::engine::constraints::Constraint;
use crate::engine::search::decision::BranchSelector;
use crate::engine::search::decision::Decision;
use crate::engine::search::decision::DecisionBuilder;
use crate::engine::search::decision::DecisionRef;
use crate::engine::solver::Solver;
use crate::engine::trail::RevI64;
use crate::engine::variables::VarId;

/// The decision `var == value` / `var != value`.
#[derive(Clone, Copy, Debug)]
pub struct AssignVarValue {
    var: VarId,
    value: i64,
}

impl AssignVarValue {
    pub fn new(var: VarId, value: i64) -> AssignVarValue {
        AssignVarValue { var, value }
    }
}

impl Decision for AssignVarValue {
    fn apply(&self, solver: &mut Solver) -> PropagationStatus {
        solver.set_value(self.var, self.value)
    }

    fn refute(&self, solver: &mut Solver) -> PropagationStatus {
        solver.remove_value(self.var, self.value)
    }

    fn debug_string(&self) -> String {
        format!("{:?} == {}", self.var, self.value)
    }
}

/// The decision `var <= value` / `var >= value + 1`.
#[derive(Clone, Copy, Debug)]
pub struct SplitVarDomain {
    var: VarId,
    value: i64,
    lower_first: bool,
}

impl SplitVarDomain {
    pub fn new(var: VarId, value: i64, lower_first: bool) -> SplitVarDomain {
        SplitVarDomain {
            var,
            value,
            lower_first,
        }
    }
}

impl Decision for SplitVarDomain {
    fn apply(&self, solver: &mut Solver) -> PropagationStatus {
        if self.lower_first {
            solver.set_max(self.var, self.value)
        } else {
            solver.set_min(self.var, self.value + 1)
        }
    }

    fn refute(&self, solver: &mut Solver) -> PropagationStatus {
        if self.lower_first {
            solver.set_min(self.var, self.value + 1)
        } else {
            solver.set_max(self.var, self.value)
        }
    }

    fn debug_string(&self) -> String {
        format!("{:?} split at {}", self.var, self.value)
    }
}

/// Assigns the first unbound variable in input order to its minimum value.
///
/// The scan position is a reversible integer, so backtracking resumes the scan where the
/// failed subtree started instead of rescanning from the front.
#[derive(Debug)]
pub struct InputOrderMin {
    vars: Vec<VarId>,
    position: Option<RevI64>,
}

impl InputOrderMin {
    pub fn new(vars: Vec<VarId>) -> InputOrderMin {
        InputOrderMin {
            vars,
            position: None,
        }
    }
}

impl DecisionBuilder for InputOrderMin {
    fn next(&mut self, solver: &mut Solver) -> Result<Option<DecisionRef>, Failure> {
        let position_cell = *self
            .position
            .get_or_insert_with(|| solver.new_rev_i64(0));
        let mut position = solver.rev_i64(position_cell) as usize;
        while position < self.vars.len() && solver.is_bound(self.vars[position]) {
            position += 1;
        }
        solver.set_rev_i64(position_cell, position as i64);
        if position == self.vars.len() {
            return Ok(None);
        }
        let var = self.vars[position];
        let value = solver.min(var);
        Ok(Some(Rc::new(AssignVarValue::new(var, value))))
    }

    fn debug_string(&self) -> String {
        "InputOrderMin".to_owned()
    }
}

/// Adds a constraint as the single "decision" of a search; useful to test whether a
/// constraint is consistent with the current model via [`Solver::solve`].
pub struct ConstraintAdder {
    constraint: Option<Box<dyn Constraint>>,
}

impl ConstraintAdder {
    pub fn new(constraint: Box<dyn Constraint>) -> ConstraintAdder {
        ConstraintAdder {
            constraint: Some(constraint),
        }
    }
}

impl DecisionBuilder for ConstraintAdder {
    fn next(&mut self, solver: &mut Solver) -> Result<Option<DecisionRef>, Failure> {
        if let Some(constraint) = self.constraint.take() {
            let _ = solver.add_constraint(constraint)?;
        }
        Ok(None)
    }

    fn debug_string(&self) -> String {
        "ConstraintAdder".to_owned()
    }
}

/// Installs a branch selector on the search that runs this builder.
pub struct ApplyBranchSelector {
    selector: BranchSelector,
}

impl ApplyBranchSelector {
    pub fn new(selector: BranchSelector) -> ApplyBranchSelector {
        ApplyBranchSelector { selector }
    }
}

impl DecisionBuilder for ApplyBranchSelector {
    fn next(&mut self, solver: &mut Solver) -> Result<Option<DecisionRef>, Failure> {
        solver.set_branch_selector(self.selector.clone());
        Ok(None)
    }

    fn debug_string(&self) -> String {
        "Apply(BranchSelector)".to_owned()
    }
}

/// Chains decision builders: each is exhausted before the next one is consulted.
pub struct Compose {
    builders: Vec<Box<dyn DecisionBuilder>>,
}

impl Compose {
    pub fn new(builders: Vec<Box<dyn DecisionBuilder>>) -> Compose {
        Compose { builders }
    }
}

impl DecisionBuilder for Compose {
    fn next(&mut self, solver: &mut Solver) -> Result<Option<DecisionRef>, Failure> {
        for builder in &mut self.builders {
            if let Some(decision) = builder.next(solver)? {
                return Ok(Some(decision));
            }
        }
        Ok(None)
    }

    fn debug_string(&self) -> String {
        "Compose".to_owned()
    }
}
