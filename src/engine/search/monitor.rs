use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use log::info;

use crate::engine::constraints::ConstraintId;
use crate::engine::demon::DemonId;
use crate::engine::search::decision::DecisionRef;
use crate::engine::solver::Solver;
use crate::engine::variables::VarId;

/// Observer of the search. All hooks default to no-ops; hooks fire in installation order at
/// well-defined points of the driver (see the search loop in [`Solver::next_solution`]).
///
/// A monitor that wants to stop or restart the running search sets the corresponding flag
/// through [`Solver::finish_current_search`] / [`Solver::restart_current_search`]; the driver
/// polls the flags after every hook group.
pub trait SearchMonitor {
    /// Beginning of the top-level search.
    fn enter_search(&mut self, solver: &mut Solver) {
        let _ = solver;
    }

    /// Restart of the search (the search tree was wiped back to its root).
    fn restart_search(&mut self, solver: &mut Solver) {
        let _ = solver;
    }

    /// End of the search.
    fn exit_search(&mut self, solver: &mut Solver) {
        let _ = solver;
    }

    /// Before asking the decision builder for the next decision.
    fn begin_next_decision(&mut self, solver: &mut Solver) {
        let _ = solver;
    }

    /// After the decision builder produced `decision` (`None` at a leaf).
    fn end_next_decision(&mut self, solver: &mut Solver, decision: Option<&DecisionRef>) {
        let _ = (solver, decision);
    }

    /// Before applying `decision` (left branch).
    fn apply_decision(&mut self, solver: &mut Solver, decision: &DecisionRef) {
        let _ = (solver, decision);
    }

    /// Before refuting `decision` (right branch).
    fn refute_decision(&mut self, solver: &mut Solver, decision: &DecisionRef) {
        let _ = (solver, decision);
    }

    /// Just after a branch was taken; `applied` distinguishes the two.
    fn after_decision(&mut self, solver: &mut Solver, decision: &DecisionRef, applied: bool) {
        let _ = (solver, decision, applied);
    }

    /// Just when a failure starts unwinding.
    fn begin_fail(&mut self, solver: &mut Solver) {
        let _ = solver;
    }

    /// After the backtrack triggered by the failure.
    fn end_fail(&mut self, solver: &mut Solver) {
        let _ = solver;
    }

    /// Before the initial propagation of the model.
    fn begin_initial_propagation(&mut self, solver: &mut Solver) {
        let _ = solver;
    }

    /// After the initial propagation of the model succeeded.
    fn end_initial_propagation(&mut self, solver: &mut Solver) {
        let _ = solver;
    }

    /// Whether the solution at the current leaf is acceptable. Every monitor is consulted
    /// even after one rejects.
    fn accept_solution(&mut self, solver: &mut Solver) -> bool {
        let _ = solver;
        true
    }

    /// Called on an accepted solution; returning true asks a `solve`-driven search to
    /// continue past it.
    fn at_solution(&mut self, solver: &mut Solver) -> bool {
        let _ = solver;
        false
    }

    /// The search space is exhausted.
    fn no_more_solutions(&mut self, solver: &mut Solver) {
        let _ = solver;
    }

    /// Periodic hook for cooperative interruption (time limits and the like).
    fn periodic_check(&mut self, solver: &mut Solver) {
        let _ = solver;
    }
}

pub type MonitorRef = Rc<RefCell<dyn SearchMonitor>>;

/// A monitor that additionally observes propagation: demon runs, constraint initial
/// propagation, and every variable modification. Sharing the [`SearchMonitor`] interface
/// lets a single tracer observe both kinds of events.
///
/// The propagation hooks carry data only: they fire from inside the propagation plumbing,
/// where the engine is split into disjoint borrows.
pub trait PropagationMonitor: SearchMonitor {
    fn register_demon(&mut self, demon: DemonId) {
        let _ = demon;
    }

    fn begin_demon_run(&mut self, demon: DemonId) {
        let _ = demon;
    }

    fn end_demon_run(&mut self, demon: DemonId) {
        let _ = demon;
    }

    fn begin_constraint_initial_propagation(&mut self, constraint: ConstraintId) {
        let _ = constraint;
    }

    fn end_constraint_initial_propagation(&mut self, constraint: ConstraintId) {
        let _ = constraint;
    }

    fn begin_nested_constraint_initial_propagation(
        &mut self,
        parent: ConstraintId,
        nested: ConstraintId,
    ) {
        let _ = (parent, nested);
    }

    fn end_nested_constraint_initial_propagation(
        &mut self,
        parent: ConstraintId,
        nested: ConstraintId,
    ) {
        let _ = (parent, nested);
    }

    fn on_set_min(&mut self, var: VarId, new_min: i64) {
        let _ = (var, new_min);
    }

    fn on_set_max(&mut self, var: VarId, new_max: i64) {
        let _ = (var, new_max);
    }

    fn on_set_value(&mut self, var: VarId, value: i64) {
        let _ = (var, value);
    }

    fn on_remove_value(&mut self, var: VarId, value: i64) {
        let _ = (var, value);
    }

    fn on_set_values(&mut self, var: VarId, values: &[i64]) {
        let _ = (var, values);
    }

    fn on_remove_values(&mut self, var: VarId, values: &[i64]) {
        let _ = (var, values);
    }
}

pub type PropagationMonitorRef = Rc<RefCell<dyn PropagationMonitor>>;

macro_rules! trace_dispatch {
    ($(fn $name:ident(&self $(, $arg:ident: $ty:ty)*);)*) => {
        $(
            pub(crate) fn $name(&self $(, $arg: $ty)*) {
                for monitor in self.monitors.borrow().iter() {
                    monitor.borrow_mut().$name($($arg),*);
                }
            }
        )*
    };
}

/// Fan-out of propagation events to the installed propagation monitors.
///
/// Lives behind interior mutability so that the propagation contexts can carry a shared
/// reference next to the mutable borrows of the rest of the engine.
#[derive(Default)]
pub(crate) struct PropagationTrace {
    monitors: RefCell<Vec<PropagationMonitorRef>>,
}

impl std::fmt::Debug for PropagationTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropagationTrace")
            .field("monitors", &self.monitors.borrow().len())
            .finish()
    }
}

impl PropagationTrace {
    pub(crate) fn install(&self, monitor: PropagationMonitorRef) {
        self.monitors.borrow_mut().push(monitor);
    }

    trace_dispatch! {
        fn register_demon(&self, demon: DemonId);
        fn begin_demon_run(&self, demon: DemonId);
        fn end_demon_run(&self, demon: DemonId);
        fn begin_constraint_initial_propagation(&self, constraint: ConstraintId);
        fn end_constraint_initial_propagation(&self, constraint: ConstraintId);
        fn begin_nested_constraint_initial_propagation(&self, parent: ConstraintId, nested: ConstraintId);
        fn end_nested_constraint_initial_propagation(&self, parent: ConstraintId, nested: ConstraintId);
        fn on_set_min(&self, var: VarId, new_min: i64);
        fn on_set_max(&self, var: VarId, new_max: i64);
        fn on_set_value(&self, var: VarId, value: i64);
        fn on_remove_value(&self, var: VarId, value: i64);
        fn on_set_values(&self, var: VarId, values: &[i64]);
        fn on_remove_values(&self, var: VarId, values: &[i64]);
    }
}

const TRACE_PREFIX: &str = "######## ";

/// Logs every search event through `log`, mirroring the effect of the legacy search trace.
/// Installed last so it observes the effects of all other monitors.
#[derive(Debug, Default)]
pub struct SearchTrace;

impl SearchMonitor for SearchTrace {
    fn enter_search(&mut self, _: &mut Solver) {
        info!("{TRACE_PREFIX}EnterSearch");
    }

    fn restart_search(&mut self, _: &mut Solver) {
        info!("{TRACE_PREFIX}RestartSearch");
    }

    fn exit_search(&mut self, _: &mut Solver) {
        info!("{TRACE_PREFIX}ExitSearch");
    }

    fn apply_decision(&mut self, solver: &mut Solver, decision: &DecisionRef) {
        info!(
            "{TRACE_PREFIX}ApplyDecision({}) at depth {}",
            decision.debug_string(),
            solver.search_depth()
        );
    }

    fn refute_decision(&mut self, solver: &mut Solver, decision: &DecisionRef) {
        info!(
            "{TRACE_PREFIX}RefuteDecision({}) at depth {}",
            decision.debug_string(),
            solver.search_depth()
        );
    }

    fn begin_fail(&mut self, solver: &mut Solver) {
        info!("{TRACE_PREFIX}BeginFail({})", solver.statistics().fails());
    }

    fn begin_initial_propagation(&mut self, _: &mut Solver) {
        info!("{TRACE_PREFIX}BeginInitialPropagation");
    }

    fn end_initial_propagation(&mut self, _: &mut Solver) {
        info!("{TRACE_PREFIX}EndInitialPropagation");
    }

    fn accept_solution(&mut self, solver: &mut Solver) -> bool {
        info!(
            "{TRACE_PREFIX}AcceptSolution at depth {}",
            solver.search_depth()
        );
        true
    }

    fn no_more_solutions(&mut self, _: &mut Solver) {
        info!("{TRACE_PREFIX}NoMoreSolutions");
    }
}

/// Logs every propagation event through `log`. Installed when propagation tracing is
/// enabled; it is the engine's print trace.
#[derive(Debug, Default)]
pub struct PropagationLogger;

impl SearchMonitor for PropagationLogger {}

impl PropagationMonitor for PropagationLogger {
    fn register_demon(&mut self, demon: DemonId) {
        debug!("{TRACE_PREFIX}RegisterDemon({demon:?})");
    }

    fn begin_demon_run(&mut self, demon: DemonId) {
        debug!("{TRACE_PREFIX}BeginDemonRun({demon:?})");
    }

    fn end_demon_run(&mut self, demon: DemonId) {
        debug!("{TRACE_PREFIX}EndDemonRun({demon:?})");
    }

    fn begin_constraint_initial_propagation(&mut self, constraint: ConstraintId) {
        debug!("{TRACE_PREFIX}BeginConstraintInitialPropagation({constraint:?})");
    }

    fn end_constraint_initial_propagation(&mut self, constraint: ConstraintId) {
        debug!("{TRACE_PREFIX}EndConstraintInitialPropagation({constraint:?})");
    }

    fn on_set_min(&mut self, var: VarId, new_min: i64) {
        debug!("{TRACE_PREFIX}SetMin({var:?}, {new_min})");
    }

    fn on_set_max(&mut self, var: VarId, new_max: i64) {
        debug!("{TRACE_PREFIX}SetMax({var:?}, {new_max})");
    }

    fn on_set_value(&mut self, var: VarId, value: i64) {
        debug!("{TRACE_PREFIX}SetValue({var:?}, {value})");
    }

    fn on_remove_value(&mut self, var: VarId, value: i64) {
        debug!("{TRACE_PREFIX}RemoveValue({var:?}, {value})");
    }

    fn on_set_values(&mut self, var: VarId, values: &[i64]) {
        debug!("{TRACE_PREFIX}SetValues({var:?}, {values:?})");
    }

    fn on_remove_values(&mut self, var: VarId, values: &[i64]) {
        debug!("{TRACE_PREFIX}RemoveValues({var:?}, {values:?})");
    }
}
