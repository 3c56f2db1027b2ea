//! End-to-end scenarios driving the engine through its public API: search, backtracking,
//! propagation scheduling, nested search, and the cooperative stop mechanisms.

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

use acorn_solver::branching::ApplyBranchSelector;
use acorn_solver::branching::AssignVarValue;
use acorn_solver::branching::Compose;
use acorn_solver::branching::InputOrderMin;
use acorn_solver::Assignment;
use acorn_solver::BranchSelector;
use acorn_solver::Constraint;
use acorn_solver::DecisionBuilder;
use acorn_solver::DecisionModification;
use acorn_solver::DecisionRef;
use acorn_solver::Demon;
use acorn_solver::DemonId;
use acorn_solver::DemonPriority;
use acorn_solver::Failure;
use acorn_solver::MonitorRef;
use acorn_solver::PostContext;
use acorn_solver::PropagationContext;
use acorn_solver::PropagationStatus;
use acorn_solver::RunContext;
use acorn_solver::SearchMonitor;
use acorn_solver::Solver;
use acorn_solver::SolverParameters;
use acorn_solver::SolverState;
use acorn_solver::TrailCompression;
use acorn_solver::VarId;

/// `x1 + … + xn == target`, checked only once every variable is bound. Deliberately weak:
/// it forces the search to enumerate and fail, which exercises backtracking.
struct SumEqualsCheck {
    vars: Vec<VarId>,
    target: i64,
}

impl SumEqualsCheck {
    fn check(&self, context: &mut PropagationContext<'_>) -> PropagationStatus {
        if self.vars.iter().all(|&var| context.is_bound(var)) {
            let sum: i64 = self.vars.iter().map(|&var| context.value(var)).sum();
            if sum != self.target {
                return Err(Failure);
            }
        }
        Ok(())
    }
}

impl Constraint for SumEqualsCheck {
    fn post(&mut self, context: &mut PostContext<'_>) {
        let demon = context.make_constraint_demon(DemonPriority::Normal);
        for &var in &self.vars {
            context.when_bound(var, demon);
        }
    }

    fn initial_propagate(&mut self, context: &mut PropagationContext<'_>) -> PropagationStatus {
        self.check(context)
    }

    fn propagate(&mut self, context: &mut PropagationContext<'_>) -> PropagationStatus {
        self.check(context)
    }

    fn debug_string(&self) -> String {
        format!("SumEqualsCheck(target = {})", self.target)
    }
}

/// `var >= value`, enforced once during the initial propagation.
struct RequireMin {
    var: VarId,
    value: i64,
}

impl Constraint for RequireMin {
    fn post(&mut self, _: &mut PostContext<'_>) {}

    fn initial_propagate(&mut self, context: &mut PropagationContext<'_>) -> PropagationStatus {
        context.set_min(self.var, self.value)
    }
}

/// `var <= value`, enforced once during the initial propagation.
struct RequireMax {
    var: VarId,
    value: i64,
}

impl Constraint for RequireMax {
    fn post(&mut self, _: &mut PostContext<'_>) {}

    fn initial_propagate(&mut self, context: &mut PropagationContext<'_>) -> PropagationStatus {
        context.set_max(self.var, self.value)
    }
}

struct CountingDemon {
    runs: Rc<Cell<u64>>,
}

impl Demon for CountingDemon {
    fn run(&mut self, _: &mut RunContext<'_>) -> PropagationStatus {
        self.runs.set(self.runs.get() + 1);
        Ok(())
    }
}

/// Subscribes a counting demon to the range events of one variable.
struct WatchRange {
    var: VarId,
    runs: Rc<Cell<u64>>,
}

impl Constraint for WatchRange {
    fn post(&mut self, context: &mut PostContext<'_>) {
        let demon = context.register_demon(Box::new(CountingDemon {
            runs: Rc::clone(&self.runs),
        }));
        context.when_range(self.var, demon);
    }

    fn initial_propagate(&mut self, _: &mut PropagationContext<'_>) -> PropagationStatus {
        Ok(())
    }
}

fn bool_sum_model() -> (Solver, VarId, VarId) {
    let mut solver = Solver::default();
    let x = solver.new_bool_var();
    let y = solver.new_bool_var();
    solver
        .add_constraint(Box::new(SumEqualsCheck {
            vars: vec![x, y],
            target: 1,
        }))
        .expect("registered outside search");
    (solver, x, y)
}

// Scenario: trivial SAT over two booleans with x + y == 1. Both solutions are enumerated in
// assign-min order, the third query exhausts the tree.
#[test]
fn two_booleans_summing_to_one_have_two_solutions() {
    let (mut solver, x, y) = bool_sum_model();
    solver.new_search(Box::new(InputOrderMin::new(vec![x, y])), Vec::new());

    assert!(solver.next_solution());
    assert_eq!(solver.value(x), 0);
    assert_eq!(solver.value(y), 1);

    assert!(solver.next_solution());
    assert_eq!(solver.value(x), 1);
    assert_eq!(solver.value(y), 0);

    assert!(!solver.next_solution());
    assert_eq!(solver.state(), SolverState::NoMoreSolutions);

    // Exact counts under the reference schedule with a check-on-bound constraint: the
    // second leaf of each descent fails once, and both solutions descend through y.
    assert_eq!(solver.statistics().decisions(), 3);
    assert_eq!(solver.statistics().branches(), 6);
    assert_eq!(solver.statistics().fails(), 2);
    assert_eq!(solver.solutions(), 2);

    solver.end_search();
    assert_eq!(solver.state(), SolverState::OutsideSearch);
}

// Scenario: contradictory bounds are detected during the initial propagation, before any
// branching.
#[test]
fn contradictory_bounds_are_infeasible_at_the_root() {
    let mut solver = Solver::default();
    let x = solver.new_int_var(0, 5);
    solver
        .add_constraint(Box::new(RequireMin { var: x, value: 3 }))
        .expect("registered outside search");
    solver
        .add_constraint(Box::new(RequireMax { var: x, value: 2 }))
        .expect("registered outside search");

    solver.new_search(Box::new(InputOrderMin::new(vec![x])), Vec::new());
    assert!(!solver.next_solution());
    assert_eq!(solver.state(), SolverState::ProblemInfeasible);
    assert_eq!(solver.statistics().branches(), 0);
    solver.end_search();
}

// Scenario: push_state/pop_state round-trips the observable state exactly.
#[test]
fn pop_state_restores_bounds_and_holes() {
    let mut solver = Solver::default();
    let x = solver.new_int_var(0, 10);

    solver.push_state();
    solver.set_min(x, 5).expect("non-empty domain");
    solver.set_max(x, 7).expect("non-empty domain");
    solver.remove_value(x, 6).expect("non-empty domain");
    assert!(!solver.contains(x, 6));

    solver.pop_state();
    assert_eq!(solver.min(x), 0);
    assert_eq!(solver.max(x), 10);
    assert!(solver.contains(x, 6));
}

// Scenario: a demon subscribed to a variable runs exactly once per propagation wave, no
// matter how many updates the variable fires while the queue is frozen.
#[test]
fn frozen_queue_deduplicates_demon_runs() {
    let mut solver = Solver::default();
    let x = solver.new_int_var(0, 10);
    let runs = Rc::new(Cell::new(0));
    solver
        .add_constraint(Box::new(WatchRange {
            var: x,
            runs: Rc::clone(&runs),
        }))
        .expect("registered outside search");

    // An empty builder makes the root itself the solution; the demon is now posted.
    solver.new_search(Box::new(InputOrderMin::new(vec![])), Vec::new());
    assert!(solver.next_solution());
    assert_eq!(runs.get(), 0);

    solver.freeze_queue();
    solver.set_min(x, 1).expect("non-empty domain");
    solver.set_min(x, 2).expect("non-empty domain");
    solver.set_min(x, 3).expect("non-empty domain");
    solver.unfreeze_queue().expect("consistent");
    assert_eq!(runs.get(), 1);

    // A fresh wave lets the demon run again.
    solver.set_min(x, 4).expect("non-empty domain");
    assert_eq!(runs.get(), 2);

    solver.end_search();
}

/// Assigns `var` to `value` as soon as it is unbound; leaf otherwise.
struct FixVar {
    var: VarId,
    value: i64,
}

impl DecisionBuilder for FixVar {
    fn next(&mut self, solver: &mut Solver) -> Result<Option<DecisionRef>, Failure> {
        if solver.is_bound(self.var) {
            Ok(None)
        } else {
            Ok(Some(Rc::new(AssignVarValue::new(self.var, self.value))))
        }
    }
}

/// Runs a nested search from inside the outer search and records what it observed.
struct NestedProbe {
    var: VarId,
    restore: bool,
    observed: Rc<RefCell<Option<(bool, i64, i64)>>>,
}

impl DecisionBuilder for NestedProbe {
    fn next(&mut self, solver: &mut Solver) -> Result<Option<DecisionRef>, Failure> {
        if self.observed.borrow().is_none() {
            let found = solver.nested_solve(
                Box::new(FixVar {
                    var: self.var,
                    value: 5,
                }),
                self.restore,
                Vec::new(),
            );
            *self.observed.borrow_mut() =
                Some((found, solver.min(self.var), solver.max(self.var)));
        }
        Ok(None)
    }
}

// Scenario: a nested search with restore erases every side effect it had on the outer
// search, even though it found a solution.
#[test]
fn nested_solve_with_restore_is_a_no_op_on_the_outer_state() {
    let mut solver = Solver::default();
    let x = solver.new_int_var(0, 9);
    let observed = Rc::new(RefCell::new(None));
    solver.new_search(
        Box::new(NestedProbe {
            var: x,
            restore: true,
            observed: Rc::clone(&observed),
        }),
        Vec::new(),
    );
    assert!(solver.next_solution());

    let (found, min, max) = observed.borrow().expect("the probe ran");
    assert!(found);
    assert_eq!(min, 0);
    assert_eq!(max, 9);
    solver.end_search();
}

// Scenario: without restore, the nested search's assignments survive into the outer search.
#[test]
fn nested_solve_without_restore_keeps_the_assignment() {
    let mut solver = Solver::default();
    let x = solver.new_int_var(0, 9);
    let observed = Rc::new(RefCell::new(None));
    solver.new_search(
        Box::new(NestedProbe {
            var: x,
            restore: false,
            observed: Rc::clone(&observed),
        }),
        Vec::new(),
    );
    assert!(solver.next_solution());

    let (found, min, max) = observed.borrow().expect("the probe ran");
    assert!(found);
    assert_eq!(min, 5);
    assert_eq!(max, 5);
    solver.end_search();
}

/// Nested builder that registers a backtrack action before fixing its variable.
struct ActionAndFix {
    var: VarId,
    fired: Rc<Cell<bool>>,
    registered: bool,
}

impl DecisionBuilder for ActionAndFix {
    fn next(&mut self, solver: &mut Solver) -> Result<Option<DecisionRef>, Failure> {
        if !self.registered {
            self.registered = true;
            let fired = Rc::clone(&self.fired);
            solver.add_backtrack_action(Box::new(move |_| fired.set(true)), true);
        }
        if solver.is_bound(self.var) {
            Ok(None)
        } else {
            Ok(Some(Rc::new(AssignVarValue::new(self.var, 5))))
        }
    }
}

struct NestedActionProbe {
    var: VarId,
    fired: Rc<Cell<bool>>,
    done: bool,
}

impl DecisionBuilder for NestedActionProbe {
    fn next(&mut self, solver: &mut Solver) -> Result<Option<DecisionRef>, Failure> {
        if !self.done {
            self.done = true;
            let found = solver.nested_solve(
                Box::new(ActionAndFix {
                    var: self.var,
                    fired: Rc::clone(&self.fired),
                    registered: false,
                }),
                false,
                Vec::new(),
            );
            assert!(found);
            // The action marker was promoted, not run: it outlives the nested search.
            assert!(!self.fired.get());
        }
        Ok(None)
    }
}

// Scenario: closing a nested search without restore promotes its reversible actions to the
// outer search, which runs them when it unwinds.
#[test]
fn promoted_backtrack_actions_run_when_the_outer_search_unwinds() {
    let mut solver = Solver::default();
    let x = solver.new_int_var(0, 9);
    let fired = Rc::new(Cell::new(false));
    solver.new_search(
        Box::new(NestedActionProbe {
            var: x,
            fired: Rc::clone(&fired),
            done: false,
        }),
        Vec::new(),
    );
    assert!(solver.next_solution());
    assert!(!fired.get());

    solver.end_search();
    assert!(fired.get());
}

#[derive(Default)]
struct FinishImmediately;

impl SearchMonitor for FinishImmediately {
    fn periodic_check(&mut self, solver: &mut Solver) {
        solver.finish_current_search();
    }
}

// Scenario: a monitor requesting finish at its first periodic check stops the search before
// any branching happens.
#[test]
fn finish_requested_at_first_periodic_check_stops_before_branching() {
    let (mut solver, x, y) = bool_sum_model();
    let monitor: MonitorRef = Rc::new(RefCell::new(FinishImmediately));
    solver.new_search(Box::new(InputOrderMin::new(vec![x, y])), vec![monitor]);

    assert!(!solver.next_solution());
    assert_eq!(solver.state(), SolverState::NoMoreSolutions);
    assert_eq!(solver.statistics().branches(), 0);
    assert_eq!(solver.statistics().decisions(), 0);
    solver.end_search();
    assert_eq!(solver.state(), SolverState::OutsideSearch);
}

struct RestartOnce {
    restarted: bool,
}

impl SearchMonitor for RestartOnce {
    fn periodic_check(&mut self, solver: &mut Solver) {
        if !self.restarted {
            self.restarted = true;
            solver.restart_current_search();
        }
    }
}

// Scenario: a restart request wipes the tree back to the root; the search then completes
// normally.
#[test]
fn restart_request_replays_the_search_from_the_root() {
    let (mut solver, x, y) = bool_sum_model();
    let monitor: MonitorRef = Rc::new(RefCell::new(RestartOnce { restarted: false }));
    solver.new_search(Box::new(InputOrderMin::new(vec![x, y])), vec![monitor]);

    assert!(solver.next_solution());
    assert_eq!(solver.value(x), 0);
    assert_eq!(solver.value(y), 1);
    assert_eq!(solver.statistics().restarts(), 1);
    solver.end_search();
}

// Scenario: the forced-failure flag makes every solve fail at the root without branching.
#[test]
fn no_solve_flag_fails_at_the_root() {
    let mut flags = acorn_solver::ConfigFlags::default();
    flags.no_solve = true;
    let mut solver = Solver::with_flags("no_solve", SolverParameters::default(), flags);
    let x = solver.new_int_var(0, 5);

    assert!(!solver.solve(Box::new(InputOrderMin::new(vec![x])), Vec::new()));
    assert_eq!(solver.statistics().branches(), 0);
    assert_eq!(solver.statistics().decisions(), 0);
}

fn exhaustive_sum_search(compression: TrailCompression) -> (i64, i64, i64, i64) {
    let parameters = SolverParameters {
        trail_compression: compression,
        // Tiny blocks force the packed path even on this small model.
        trail_block_size: 16,
        ..Default::default()
    };
    let mut solver = Solver::new("compression", parameters);
    let vars: Vec<_> = (0..4).map(|_| solver.new_int_var(0, 3)).collect();
    solver
        .add_constraint(Box::new(SumEqualsCheck {
            vars: vars.clone(),
            target: 6,
        }))
        .expect("registered outside search");

    solver.new_search(Box::new(InputOrderMin::new(vars)), Vec::new());
    let mut solutions = 0;
    while solver.next_solution() {
        solutions += 1;
    }
    solver.end_search();
    (
        solutions,
        solver.statistics().branches(),
        solver.statistics().fails(),
        solver.statistics().decisions(),
    )
}

// Scenario: trail compression must be invisible to the search.
#[test]
fn trail_compression_does_not_change_the_search() {
    let plain = exhaustive_sum_search(TrailCompression::None);
    let packed = exhaustive_sum_search(TrailCompression::Generic);
    assert_eq!(plain, packed);
    // 44 ways to write 6 as an ordered sum of four values in [0, 3].
    assert_eq!(plain.0, 44);
}

// Scenario: nested search requires an active outer search.
#[test]
#[should_panic(expected = "nested_solve() requires an active search")]
fn nested_solve_outside_a_search_is_rejected() {
    let mut solver = Solver::default();
    let x = solver.new_int_var(0, 5);
    let _ = solver.nested_solve(Box::new(FixVar { var: x, value: 1 }), true, Vec::new());
}

// Scenario: a one-shot consistency check propagates an assignment and restores everything.
#[test]
fn check_assignment_propagates_and_restores() {
    let mut solver = Solver::default();
    let x = solver.new_int_var(0, 5);
    solver
        .add_constraint(Box::new(RequireMin { var: x, value: 3 }))
        .expect("registered outside search");

    let mut good = Assignment::new();
    good.set_value(x, 4);
    assert!(solver.check_assignment(&good));
    assert_eq!(solver.min(x), 0);
    assert_eq!(solver.max(x), 5);

    let mut bad = Assignment::new();
    bad.set_value(x, 2);
    assert!(!solver.check_assignment(&bad));
    assert_eq!(solver.state(), SolverState::ProblemInfeasible);
}

// Scenario: a branch selector that switches branches explores the refuted value first.
#[test]
fn switch_branches_selector_reverses_every_decision() {
    let mut solver = Solver::default();
    let x = solver.new_int_var(0, 1);
    let selector: BranchSelector = Rc::new(RefCell::new(|_: &mut Solver| {
        DecisionModification::SwitchBranches
    }));
    let builder = Compose::new(vec![
        Box::new(ApplyBranchSelector::new(selector)),
        Box::new(InputOrderMin::new(vec![x])),
    ]);

    solver.new_search(Box::new(builder), Vec::new());
    assert!(solver.next_solution());
    assert_eq!(solver.value(x), 1);

    assert!(solver.next_solution());
    assert_eq!(solver.value(x), 0);

    assert!(!solver.next_solution());
    solver.end_search();
}

/// Records the wave-start bounds its demon observes, then the refreshed ones.
struct RecordOldBounds {
    var: VarId,
    seen: Rc<Cell<(i64, i64, i64, i64)>>,
}

impl Constraint for RecordOldBounds {
    fn post(&mut self, context: &mut PostContext<'_>) {
        let demon = context.make_constraint_demon(DemonPriority::Normal);
        context.when_range(self.var, demon);
    }

    fn initial_propagate(&mut self, _: &mut PropagationContext<'_>) -> PropagationStatus {
        Ok(())
    }

    fn propagate(&mut self, context: &mut PropagationContext<'_>) -> PropagationStatus {
        self.seen.set((
            context.old_min(self.var),
            context.old_max(self.var),
            context.min(self.var),
            context.max(self.var),
        ));
        Ok(())
    }
}

// Scenario: during a propagation wave a demon sees the bounds from the start of the wave;
// after quiescence the old bounds have caught up.
#[test]
fn demons_observe_wave_start_bounds() {
    let mut solver = Solver::default();
    let x = solver.new_int_var(0, 10);
    let seen = Rc::new(Cell::new((-1, -1, -1, -1)));
    solver
        .add_constraint(Box::new(RecordOldBounds {
            var: x,
            seen: Rc::clone(&seen),
        }))
        .expect("registered outside search");

    solver.new_search(Box::new(InputOrderMin::new(vec![])), Vec::new());
    assert!(solver.next_solution());

    solver.freeze_queue();
    solver.set_min(x, 3).expect("non-empty domain");
    solver.set_max(x, 8).expect("non-empty domain");
    solver.unfreeze_queue().expect("consistent");

    assert_eq!(seen.get(), (0, 10, 3, 8));
    assert_eq!(solver.old_min(x), 3);
    assert_eq!(solver.old_max(x), 8);
    solver.end_search();
}

/// Counts its runs and inhibits its own demon after the first one.
struct CountAndInhibit {
    var: VarId,
    demon: Option<DemonId>,
    runs: Rc<Cell<u64>>,
}

impl Constraint for CountAndInhibit {
    fn post(&mut self, context: &mut PostContext<'_>) {
        let demon = context.make_constraint_demon(DemonPriority::Normal);
        self.demon = Some(demon);
        context.when_range(self.var, demon);
    }

    fn initial_propagate(&mut self, _: &mut PropagationContext<'_>) -> PropagationStatus {
        Ok(())
    }

    fn propagate(&mut self, context: &mut PropagationContext<'_>) -> PropagationStatus {
        self.runs.set(self.runs.get() + 1);
        context.inhibit(self.demon.expect("posted"));
        Ok(())
    }
}

// Scenario: inhibition silences a demon until the state it was saved under is rewound.
#[test]
fn inhibition_is_reversible() {
    let mut solver = Solver::default();
    let x = solver.new_int_var(0, 10);
    let runs = Rc::new(Cell::new(0));
    solver
        .add_constraint(Box::new(CountAndInhibit {
            var: x,
            demon: None,
            runs: Rc::clone(&runs),
        }))
        .expect("registered outside search");

    solver.new_search(Box::new(InputOrderMin::new(vec![])), Vec::new());
    assert!(solver.next_solution());

    solver.push_state();
    solver.set_min(x, 1).expect("non-empty domain");
    assert_eq!(runs.get(), 1);

    // Inhibited: further updates do not wake the demon.
    solver.set_min(x, 2).expect("non-empty domain");
    assert_eq!(runs.get(), 1);

    // Popping the state desinhibits along with everything else.
    solver.pop_state();
    solver.set_min(x, 3).expect("non-empty domain");
    assert_eq!(runs.get(), 2);

    solver.end_search();
}
