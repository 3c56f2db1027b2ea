use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::mem;
use std::path::Path;
use std::rc::Rc;

use log::error;
use log::info;
use log::trace;
use log::warn;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::basic_types::Failure;
use crate::basic_types::PropagationStatus;
use crate::basic_types::Random;
use crate::containers::Arena;
use crate::containers::Handle;
use crate::engine::constraints::Constraint;
use crate::engine::constraints::ConstraintId;
use crate::engine::constraints::ConstraintStore;
use crate::engine::constraints::FalseConstraint;
use crate::engine::demon::Demon;
use crate::engine::demon::DemonId;
use crate::engine::demon::DemonPriority;
use crate::engine::demon::DemonStore;
use crate::engine::flags::ConfigFlags;
use crate::engine::parameters::ProfileLevel;
use crate::engine::parameters::SolverParameters;
use crate::engine::parameters::TraceLevel;
use crate::engine::propagation::PostContext;
use crate::engine::propagation::PropagationContext;
use crate::engine::propagation::RunContext;
use crate::engine::queue::DemonQueue;
use crate::engine::queue::FailAction;
use crate::engine::search::decision::BranchSelector;
use crate::engine::search::decision::DecisionBuilder;
use crate::engine::search::decision::DecisionModification;
use crate::engine::search::decision::DecisionRef;
use crate::engine::search::decision::ReverseDecision;
use crate::engine::search::monitor::MonitorRef;
use crate::engine::search::monitor::PropagationLogger;
use crate::engine::search::monitor::PropagationMonitor;
use crate::engine::search::monitor::PropagationTrace;
use crate::engine::search::monitor::SearchTrace;
use crate::engine::search::profiler::DemonProfiler;
use crate::engine::search::Branch;
use crate::engine::search::MarkerPayload;
use crate::engine::search::Search;
use crate::engine::search::SentinelCode;
use crate::engine::search::StateMarker;
use crate::engine::statistics::SolverStatistics;
use crate::engine::trail::RevBool;
use crate::engine::trail::RevI64;
use crate::engine::trail::RevInt;
use crate::engine::trail::RevU64;
use crate::engine::trail::Trail;
use crate::engine::variable_names::VariableNames;
use crate::engine::variables::DomainStore;
use crate::engine::variables::VarId;
use crate::engine::variables::VarUpdateDemon;

/// The state of the engine relative to the search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverState {
    /// Before the search or after the search has terminated.
    OutsideSearch,
    /// Executing the initial propagation of the model.
    InRootNode,
    /// Exploring the search tree.
    InSearch,
    /// After a solution was found, at the solution leaf.
    AtSolution,
    /// After the search tree was exhausted.
    NoMoreSolutions,
    /// The initial propagation failed: the model has no solution.
    ProblemInfeasible,
}

/// A partial assignment of values to variables, applied in one shot by
/// [`Solver::check_assignment`].
#[derive(Clone, Debug, Default)]
pub struct Assignment {
    values: Vec<(VarId, i64)>,
}

impl Assignment {
    pub fn new() -> Assignment {
        Assignment::default()
    }

    pub fn set_value(&mut self, var: VarId, value: i64) {
        self.values.push((var, value));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(VarId, i64)> {
        self.values.iter()
    }
}

macro_rules! notify_monitors {
    ($solver:expr, $method:ident($($arg:expr),*)) => {{
        let depth = $solver.searches.len() - 1;
        let count = $solver.searches[depth].monitors.len();
        for index in 0..count {
            let monitor = Rc::clone(&$solver.searches[depth].monitors[index]);
            monitor.borrow_mut().$method($solver $(, $arg)*);
        }
    }};
}

/// The process-wide root object of the engine: it owns every variable, demon, constraint,
/// the reversible trail, the propagation queue, and the stack of active searches.
///
/// A solver runs on exactly one thread; propagation and search are synchronous. The fail
/// escape is the tagged-result discipline: expected failures travel as
/// `Err(`[`Failure`]`)` up to the innermost search scope, which cleans up the queue and
/// backtracks.
pub struct Solver {
    name: String,
    parameters: SolverParameters,
    flags: ConfigFlags,
    trail: Trail,
    domains: DomainStore,
    demons: DemonStore,
    queue: DemonQueue,
    constraints: ConstraintStore,
    /// Constraints posted before the search, in posting order.
    constraints_list: Vec<ConstraintId>,
    /// Constraints posted during the root node, with the index of the posting parent.
    additional_constraints: Vec<(ConstraintId, usize)>,
    constraint_index: usize,
    additional_constraint_index: usize,
    cast_information: HashMap<VarId, ConstraintId>,
    searches: Vec<Search>,
    state: SolverState,
    stats: SolverStatistics,
    random: SmallRng,
    fail_stamp: u64,
    fail_intercept: Option<Box<dyn FnMut(&mut Solver)>>,
    fail_hooks: Vec<Box<dyn FnMut(&mut Solver)>>,
    propagation_trace: PropagationTrace,
    demon_profiler: Option<Rc<RefCell<DemonProfiler>>>,
    propagation_logger: Option<Rc<RefCell<PropagationLogger>>>,
    variable_names: VariableNames,
}

impl Default for Solver {
    fn default() -> Solver {
        Solver::new("Solver", SolverParameters::default())
    }
}

impl std::fmt::Debug for Solver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("branches", &self.stats.branches())
            .field("fails", &self.stats.fails())
            .field("decisions", &self.stats.decisions())
            .finish()
    }
}

// Construction.
impl Solver {
    pub fn new(name: impl Into<String>, parameters: SolverParameters) -> Solver {
        Solver::with_flags(name, parameters, ConfigFlags::default())
    }

    pub fn with_flags(
        name: impl Into<String>,
        parameters: SolverParameters,
        flags: ConfigFlags,
    ) -> Solver {
        let trail = Trail::new(&parameters);
        let variable_names = VariableNames::new(
            parameters.store_names,
            parameters.name_all_variables || flags.name_variables,
        );
        let mut solver = Solver {
            name: name.into(),
            trail,
            domains: DomainStore::default(),
            demons: Arena::default(),
            queue: DemonQueue::default(),
            constraints: Arena::default(),
            constraints_list: Vec::new(),
            additional_constraints: Vec::new(),
            constraint_index: 0,
            additional_constraint_index: 0,
            cast_information: HashMap::new(),
            searches: vec![Search::dummy(), Search::new()],
            state: SolverState::OutsideSearch,
            stats: SolverStatistics::default(),
            random: SmallRng::seed_from_u64(42),
            fail_stamp: 1,
            fail_intercept: None,
            fail_hooks: Vec::new(),
            propagation_trace: PropagationTrace::default(),
            demon_profiler: None,
            propagation_logger: None,
            variable_names,
            parameters,
            flags,
        };
        solver.push_sentinel(SentinelCode::SolverCtor);
        if solver.is_profiling_enabled() {
            let profiler = Rc::new(RefCell::new(DemonProfiler::new()));
            solver.propagation_trace.install(profiler.clone());
            solver.demon_profiler = Some(profiler);
        }
        if solver.instruments_demons() {
            let logger = Rc::new(RefCell::new(PropagationLogger));
            solver.propagation_trace.install(logger.clone());
            solver.propagation_logger = Some(logger);
        }
        solver
    }

    fn is_profiling_enabled(&self) -> bool {
        self.parameters.profile_level != ProfileLevel::None || self.flags.profile_file.is_some()
    }

    fn instruments_demons(&self) -> bool {
        self.parameters.trace_level != TraceLevel::None || self.flags.trace_propagation
    }

    pub fn model_name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &SolverParameters {
        &self.parameters
    }

    pub fn statistics(&self) -> &SolverStatistics {
        &self.stats
    }

    /// Logs the search counters in `name=value` form at info level.
    pub fn log_statistics(&self) {
        self.stats.log(&self.name);
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn random(&mut self) -> &mut impl Random {
        &mut self.random
    }

    /// The stamp of the current propagation wave.
    pub fn stamp(&self) -> u64 {
        self.queue.stamp()
    }

    /// Monotonic counter bumped on every backtrack.
    pub fn fail_stamp(&self) -> u64 {
        self.fail_stamp
    }

    /// The number of solutions accepted by the top-level search.
    pub fn solutions(&self) -> i64 {
        self.searches[1].solution_counter
    }

    /// 0 outside search, 1 in the top-level search, +1 per nested search.
    pub fn solve_depth(&self) -> usize {
        if matches!(self.state, SolverState::OutsideSearch) {
            0
        } else {
            self.searches.len() - 1
        }
    }

    pub fn search_depth(&self) -> i32 {
        self.active_search().search_depth
    }

    pub fn search_left_depth(&self) -> i32 {
        self.active_search().left_search_depth
    }

    fn active_search(&self) -> &Search {
        self.searches.last().expect("the search stack is never empty")
    }

    fn active_search_mut(&mut self) -> &mut Search {
        self.searches
            .last_mut()
            .expect("the search stack is never empty")
    }

    fn check_alloc_state(&self) {
        assert!(
            !matches!(self.state, SolverState::AtSolution),
            "allocating at a solution leaf"
        );
    }

    // A variable's update demon is permanent while constraint demons posted during a search
    // are rewound; interleaving the two would break the LIFO demon rollback.
    fn check_var_creation_state(&self) {
        assert!(
            !matches!(
                self.state,
                SolverState::InSearch | SolverState::InRootNode
            ),
            "variables must be created outside of search"
        );
    }
}

// Variables.
impl Solver {
    /// Creates an integer variable with domain `[min, max]`. Variables live as long as the
    /// engine and must be created outside of search.
    pub fn new_int_var(&mut self, min: i64, max: i64) -> VarId {
        self.check_alloc_state();
        self.check_var_creation_state();
        let var = VarId::from_index(self.domains.num_vars());
        let update_demon = self.register_demon(Box::new(VarUpdateDemon::new(var)));
        let created = self.domains.grow_int(&mut self.trail, min, max, update_demon);
        debug_assert_eq!(var, created);
        created
    }

    pub fn new_named_int_var(&mut self, min: i64, max: i64, name: &str) -> VarId {
        let var = self.new_int_var(min, max);
        self.variable_names.set_name(var, name);
        var
    }

    /// Creates a boolean variable (domain `{0, 1}`). Variables live as long as the engine
    /// and must be created outside of search.
    pub fn new_bool_var(&mut self) -> VarId {
        self.check_alloc_state();
        self.check_var_creation_state();
        let var = VarId::from_index(self.domains.num_vars());
        let update_demon = self.register_demon(Box::new(VarUpdateDemon::new(var)));
        let created = self.domains.grow_bool(update_demon);
        debug_assert_eq!(var, created);
        created
    }

    pub fn new_named_bool_var(&mut self, name: &str) -> VarId {
        let var = self.new_bool_var();
        self.variable_names.set_name(var, name);
        var
    }

    pub fn set_variable_name(&mut self, var: VarId, name: &str) {
        self.variable_names.set_name(var, name);
    }

    pub fn has_variable_name(&self, var: VarId) -> bool {
        self.variable_names.has_name(var)
    }

    pub fn variable_name(&mut self, var: VarId) -> String {
        self.variable_names.name(var)
    }

    pub fn min(&self, var: VarId) -> i64 {
        self.domains.min(&self.trail, var)
    }

    pub fn max(&self, var: VarId) -> i64 {
        self.domains.max(&self.trail, var)
    }

    pub fn is_bound(&self, var: VarId) -> bool {
        self.domains.is_bound(&self.trail, var)
    }

    /// The single value of a bound variable.
    pub fn value(&self, var: VarId) -> i64 {
        debug_assert!(self.is_bound(var), "value() called on an unbound variable");
        self.min(var)
    }

    pub fn contains(&self, var: VarId, value: i64) -> bool {
        self.domains.contains(&self.trail, var, value)
    }

    pub fn old_min(&self, var: VarId) -> i64 {
        self.domains.old_min(&self.trail, var)
    }

    pub fn old_max(&self, var: VarId) -> i64 {
        self.domains.old_max(&self.trail, var)
    }

    pub fn set_min(&mut self, var: VarId, value: i64) -> PropagationStatus {
        self.mutate(|context| context.set_min(var, value))
    }

    pub fn set_max(&mut self, var: VarId, value: i64) -> PropagationStatus {
        self.mutate(|context| context.set_max(var, value))
    }

    pub fn set_range(&mut self, var: VarId, min: i64, max: i64) -> PropagationStatus {
        self.mutate(|context| context.set_range(var, min, max))
    }

    pub fn set_value(&mut self, var: VarId, value: i64) -> PropagationStatus {
        self.mutate(|context| context.set_value(var, value))
    }

    pub fn remove_value(&mut self, var: VarId, value: i64) -> PropagationStatus {
        self.mutate(|context| context.remove_value(var, value))
    }

    pub fn remove_interval(&mut self, var: VarId, min: i64, max: i64) -> PropagationStatus {
        self.mutate(|context| context.remove_interval(var, min, max))
    }

    pub fn set_values(&mut self, var: VarId, values: &[i64]) -> PropagationStatus {
        self.mutate(|context| context.set_values(var, values))
    }

    pub fn remove_values(&mut self, var: VarId, values: &[i64]) -> PropagationStatus {
        self.mutate(|context| context.remove_values(var, values))
    }

    /// Runs one mutation and, when the queue is not frozen, the propagation fixed point it
    /// triggers.
    fn mutate(
        &mut self,
        operation: impl FnOnce(&mut PropagationContext<'_>) -> PropagationStatus,
    ) -> PropagationStatus {
        let mut status = {
            let mut context = PropagationContext {
                trail: &mut self.trail,
                domains: &mut self.domains,
                queue: &mut self.queue,
                trace: &self.propagation_trace,
            };
            operation(&mut context)
        };
        if status.is_ok() {
            status = self.process_if_unfrozen();
        }
        self.heal_if_unprotected(status)
    }

    /// Inside a search the driver cleans up the queue when it catches the failure; outside,
    /// nothing would, so the cleanup happens right here.
    fn heal_if_unprotected(&mut self, status: PropagationStatus) -> PropagationStatus {
        if status.is_err() && !self.active_search().fail_scope_active {
            self.after_failure();
        }
        status
    }
}

// Reversible state for constraint implementers.
impl Solver {
    pub fn new_rev_int(&mut self, value: i32) -> RevInt {
        self.trail.new_int(value)
    }

    pub fn rev_int(&self, cell: RevInt) -> i32 {
        self.trail.int(cell)
    }

    pub fn set_rev_int(&mut self, cell: RevInt, value: i32) {
        self.trail.save_and_set_int(cell, value);
    }

    pub fn new_rev_i64(&mut self, value: i64) -> RevI64 {
        self.trail.new_i64(value)
    }

    pub fn rev_i64(&self, cell: RevI64) -> i64 {
        self.trail.i64(cell)
    }

    pub fn set_rev_i64(&mut self, cell: RevI64, value: i64) {
        self.trail.save_and_set_i64(cell, value);
    }

    pub fn new_rev_u64(&mut self, value: u64) -> RevU64 {
        self.trail.new_u64(value)
    }

    pub fn rev_u64(&self, cell: RevU64) -> u64 {
        self.trail.u64(cell)
    }

    pub fn set_rev_u64(&mut self, cell: RevU64, value: u64) {
        self.trail.save_and_set_u64(cell, value);
    }

    pub fn new_rev_bool(&mut self, value: bool) -> RevBool {
        self.trail.new_bool(value)
    }

    pub fn rev_bool(&self, cell: RevBool) -> bool {
        self.trail.bool(cell)
    }

    pub fn set_rev_bool(&mut self, cell: RevBool, value: bool) {
        self.trail.save_and_set_bool(cell, value);
    }

    /// Hands `object` to the trail; it is dropped when the current scope is rewound.
    pub fn rev_alloc(&mut self, object: Box<dyn std::any::Any>) {
        self.check_alloc_state();
        self.trail.alloc_object(object);
    }
}

// Demons and the propagation queue.
impl Solver {
    pub(crate) fn register_demon(&mut self, demon: Box<dyn Demon>) -> DemonId {
        let priority = demon.priority();
        let id = self.demons.alloc(demon);
        let registered = self.queue.register(priority);
        debug_assert_eq!(id, registered);
        self.propagation_trace.register_demon(id);
        id
    }

    pub fn freeze_queue(&mut self) {
        self.queue.freeze();
    }

    pub fn unfreeze_queue(&mut self) -> PropagationStatus {
        if self.queue.unfreeze() {
            let status = self.process();
            self.heal_if_unprotected(status)
        } else {
            Ok(())
        }
    }

    /// Opens a new propagation wave without freezing; demons that already ran become
    /// eligible again.
    pub fn increase_stamp(&mut self) {
        self.queue.increase_stamp();
    }

    /// Schedules `demon` and runs the fixed point unless the queue is frozen or already
    /// draining.
    pub fn enqueue_demon(&mut self, demon: DemonId) -> PropagationStatus {
        if self.queue.try_enqueue(demon) {
            let status = self.process_if_unfrozen();
            return self.heal_if_unprotected(status);
        }
        Ok(())
    }

    pub fn set_queue_action_on_fail(&mut self, action: FailAction) {
        self.queue.set_action_on_fail(action);
    }

    pub fn clear_queue_action_on_fail(&mut self) {
        self.queue.clear_action_on_fail();
    }

    fn process_if_unfrozen(&mut self) -> PropagationStatus {
        if self.queue.is_frozen() {
            Ok(())
        } else {
            self.process()
        }
    }

    /// Runs demons to quiescence: drain NORMAL, run one VAR, repeat; then one DELAYED;
    /// repeat while anything is pending. Reentrancy-guarded.
    fn process(&mut self) -> PropagationStatus {
        if self.queue.in_process {
            return Ok(());
        }
        self.queue.in_process = true;
        while !self.queue.all_empty() {
            while self.queue.has_pending(DemonPriority::Var)
                || self.queue.has_pending(DemonPriority::Normal)
            {
                while self.queue.has_pending(DemonPriority::Normal) {
                    self.process_one_demon(DemonPriority::Normal)?;
                }
                self.process_one_demon(DemonPriority::Var)?;
            }
            self.process_one_demon(DemonPriority::Delayed)?;
        }
        self.queue.in_process = false;
        Ok(())
    }

    fn process_one_demon(&mut self, priority: DemonPriority) -> PropagationStatus {
        let Some(demon) = self.queue.pop(priority) else {
            return Ok(());
        };
        debug_assert_eq!(self.queue.demon_priority(demon), priority);
        // Lowering the stamp lets the demon re-enqueue within this wave if its variables
        // change again after it ran.
        let reenter_stamp = self.queue.stamp() - 1;
        self.queue.set_demon_stamp(demon, reenter_stamp);
        self.propagation_trace.begin_demon_run(demon);
        self.stats.demon_runs[priority.index()] += 1;
        let status = {
            let mut context = RunContext {
                constraints: &mut self.constraints,
                context: PropagationContext {
                    trail: &mut self.trail,
                    domains: &mut self.domains,
                    queue: &mut self.queue,
                    trace: &self.propagation_trace,
                },
            };
            self.demons[demon].run(&mut context)
        };
        status?;
        self.propagation_trace.end_demon_run(demon);
        Ok(())
    }

    /// Cleans up the propagation machinery after a caught failure: flushes the queues,
    /// resets the guards, and runs the queue's fail action.
    fn after_failure(&mut self) {
        self.queue.flush_after_failure();
        if let Some(action) = self.queue.take_action_on_fail() {
            action(self);
        }
    }
}

// Constraints.
impl Solver {
    /// Registers `constraint` with the engine. Outside search it joins the model and is
    /// posted during the initial propagation; during search it is posted and propagated
    /// immediately, which may fail.
    pub fn add_constraint(
        &mut self,
        constraint: Box<dyn Constraint>,
    ) -> Result<ConstraintId, Failure> {
        self.check_alloc_state();
        let id = self.constraints.alloc(constraint);
        match self.state {
            SolverState::InSearch => {
                self.queue.to_add.push(id);
                self.process_posted_constraints()?;
            }
            SolverState::InRootNode => {
                let parent = if self.constraint_index < self.constraints_list.len() {
                    self.constraint_index
                } else {
                    self.additional_constraints[self.additional_constraint_index].1
                };
                self.additional_constraints.push((id, parent));
            }
            _ => {
                if self.flags.show_constraints {
                    info!("{}", self.constraints[id].debug_string());
                }
                self.constraints_list.push(id);
            }
        }
        Ok(id)
    }

    /// Registers a constraint standing for `target == <expression>` and records it in the
    /// cast index so the expression behind an anonymous variable can be found.
    pub fn add_cast_constraint(
        &mut self,
        constraint: Box<dyn Constraint>,
        target: VarId,
    ) -> Result<ConstraintId, Failure> {
        let in_search = matches!(self.state, SolverState::InSearch);
        let id = self.add_constraint(constraint)?;
        if !in_search {
            let _ = self.cast_information.insert(target, id);
        }
        Ok(id)
    }

    pub fn cast_constraint(&self, target: VarId) -> Option<ConstraintId> {
        self.cast_information.get(&target).copied()
    }

    pub fn is_cast_constraint(&self, constraint: ConstraintId) -> bool {
        self.cast_information.values().any(|&id| id == constraint)
    }

    pub fn constraint_debug_string(&self, constraint: ConstraintId) -> String {
        self.constraints[constraint].debug_string()
    }

    /// Posts and propagates the constraints queued while propagation was already running.
    /// The list may grow while it is iterated.
    fn process_posted_constraints(&mut self) -> PropagationStatus {
        if self.queue.in_add {
            return Ok(());
        }
        self.queue.in_add = true;
        let mut index = 0;
        while index < self.queue.to_add.len() {
            let id = self.queue.to_add[index];
            self.post_and_propagate(id)?;
            index += 1;
        }
        self.queue.in_add = false;
        self.queue.to_add.clear();
        Ok(())
    }

    /// Freeze, post, initial propagate, unfreeze: all narrowing happens inside the freeze
    /// window so the queue drains once at the end.
    fn post_and_propagate(&mut self, id: ConstraintId) -> PropagationStatus {
        self.freeze_queue();
        self.post_constraint(id);
        self.initial_propagate_constraint(id)?;
        self.unfreeze_queue()
    }

    fn post_constraint(&mut self, id: ConstraintId) {
        let mut context = PostContext {
            demons: &mut self.demons,
            queue: &mut self.queue,
            domains: &mut self.domains,
            trail: &mut self.trail,
            trace: &self.propagation_trace,
            constraint: id,
        };
        self.constraints[id].post(&mut context);
    }

    fn initial_propagate_constraint(&mut self, id: ConstraintId) -> PropagationStatus {
        let mut context = PropagationContext {
            trail: &mut self.trail,
            domains: &mut self.domains,
            queue: &mut self.queue,
            trace: &self.propagation_trace,
        };
        self.constraints[id].initial_propagate(&mut context)
    }

    /// Initial propagation of the whole model: every pre-posted constraint, then the
    /// constraints they posted in turn.
    fn process_constraints(&mut self) -> PropagationStatus {
        if let Some(path) = self.flags.export_file.clone() {
            self.export_model(&path);
        }
        if self.flags.no_solve {
            info!("forcing early failure");
            return Err(self.fail());
        }

        self.additional_constraints.clear();
        self.additional_constraint_index = 0;
        let constraints_size = self.constraints_list.len();
        self.constraint_index = 0;
        while self.constraint_index < constraints_size {
            let id = self.constraints_list[self.constraint_index];
            self.propagation_trace.begin_constraint_initial_propagation(id);
            self.post_and_propagate(id)?;
            self.propagation_trace.end_constraint_initial_propagation(id);
            self.constraint_index += 1;
        }
        assert_eq!(self.constraints_list.len(), constraints_size);

        self.additional_constraint_index = 0;
        while self.additional_constraint_index < self.additional_constraints.len() {
            let (nested, parent_index) =
                self.additional_constraints[self.additional_constraint_index];
            let parent = self.constraints_list[parent_index];
            self.propagation_trace
                .begin_nested_constraint_initial_propagation(parent, nested);
            self.post_and_propagate(nested)?;
            self.propagation_trace
                .end_nested_constraint_initial_propagation(parent, nested);
            self.additional_constraint_index += 1;
        }
        Ok(())
    }

    fn export_model(&self, path: &Path) {
        let mut listing = String::new();
        for &id in &self.constraints_list {
            let _ = writeln!(listing, "{}", self.constraints[id].debug_string());
        }
        if let Err(error) = std::fs::write(path, listing) {
            warn!("cannot export model to {}: {error}", path.display());
        }
    }
}

// State markers.
impl Solver {
    fn push_marker(&mut self, payload: MarkerPayload, capture: bool) {
        let position = capture.then(|| self.trail.position());
        self.active_search_mut()
            .marker_stack
            .push(StateMarker { position, payload });
        self.queue.increase_stamp();
    }

    fn pop_marker(&mut self) -> MarkerPayload {
        let marker = self
            .active_search_mut()
            .marker_stack
            .pop()
            .expect("pop_state() on an empty marker stack");
        if let Some(position) = marker.position {
            self.trail
                .rewind_to(&position, &mut self.domains, &mut self.queue, &mut self.demons);
        }
        self.queue.increase_stamp();
        marker.payload
    }

    /// Pushes a user checkpoint.
    pub fn push_state(&mut self) {
        self.push_marker(MarkerPayload::Simple, true);
    }

    /// Pops back to the matching [`Solver::push_state`], restoring all reversible state.
    pub fn pop_state(&mut self) {
        let payload = self.pop_marker();
        assert!(
            matches!(payload, MarkerPayload::Simple),
            "pop_state() popped a non-simple marker"
        );
    }

    /// Registers `action` to run when the current scope is rewound. With `fast` the trail
    /// snapshot is skipped: the marker only carries the action.
    pub fn add_backtrack_action(&mut self, action: Box<dyn FnOnce(&mut Solver)>, fast: bool) {
        self.push_marker(MarkerPayload::Action(action), !fast);
    }

    fn push_sentinel(&mut self, code: SentinelCode) {
        self.push_marker(MarkerPayload::Sentinel(code), true);
        let search = self.active_search_mut();
        if code != SentinelCode::SolverCtor {
            search.sentinel_pushed += 1;
        }
        let pushed = search.sentinel_pushed;
        assert!(
            code == SentinelCode::SolverCtor
                || (code == SentinelCode::InitialSearch && pushed == 1)
                || (code == SentinelCode::RootNode && pushed == 2),
            "sentinel discipline violated: {code:?} with {pushed} sentinels pushed"
        );
    }

    /// Pops markers until the most recent unexplored left branch (returned as the decision
    /// whose right branch is to be explored) or the scope sentinel (search exhausted).
    fn backtrack_one_level(&mut self) -> Option<DecisionRef> {
        let mut right_branch = None;
        let mut no_more_solutions = false;
        loop {
            match self.pop_marker() {
                MarkerPayload::Sentinel(code) => {
                    let solve_depth = self.solve_depth();
                    assert!(
                        (code == SentinelCode::RootNode && solve_depth == 1)
                            || (code == SentinelCode::InitialSearch && solve_depth > 1),
                        "wrong sentinel found while backtracking: {code:?} at solve depth {solve_depth}"
                    );
                    self.active_search_mut().sentinel_pushed -= 1;
                    no_more_solutions = true;
                    break;
                }
                MarkerPayload::Simple => {
                    error!("simple markers should not be encountered during search");
                }
                MarkerPayload::ChoicePoint {
                    decision,
                    branch: Branch::Left,
                    depth,
                    left_depth,
                } => {
                    let search = self.active_search_mut();
                    search.search_depth = depth;
                    search.left_search_depth = left_depth;
                    right_branch = Some(decision);
                    break;
                }
                MarkerPayload::ChoicePoint {
                    branch: Branch::Right,
                    ..
                } => {}
                MarkerPayload::Action(action) => action(self),
            }
        }
        notify_monitors!(self, end_fail());
        self.run_fail_hooks();
        self.fail_stamp += 1;
        if no_more_solutions {
            notify_monitors!(self, no_more_solutions());
            None
        } else {
            right_branch
        }
    }

    /// Pops markers until the sentinel carrying `code`, tearing down the scope it closes.
    fn backtrack_to_sentinel(&mut self, code: SentinelCode) {
        let mut end_loop = self.active_search().sentinel_pushed == 0;
        while !end_loop {
            match self.pop_marker() {
                MarkerPayload::Sentinel(found) => {
                    let search = self.active_search_mut();
                    search.sentinel_pushed -= 1;
                    assert!(search.sentinel_pushed >= 0);
                    search.search_depth = 0;
                    search.left_search_depth = 0;
                    if found == code {
                        end_loop = true;
                    }
                }
                MarkerPayload::Action(action) => action(self),
                MarkerPayload::Simple | MarkerPayload::ChoicePoint { .. } => {}
            }
        }
        self.fail_stamp += 1;
    }

    /// Closes a nested search without restoring: action markers are promoted onto the
    /// parent search so their side effects outlive the nested search; everything else is
    /// dropped without rewinding the trail.
    fn jump_to_sentinel_when_nested(&mut self) {
        assert!(
            self.solve_depth() > 1,
            "jump_to_sentinel called from the top level"
        );
        let nested = self.searches.len() - 1;
        let parent = nested - 1;
        let mut found = false;
        while let Some(marker) = self.searches[nested].marker_stack.pop() {
            match marker.payload {
                MarkerPayload::Action(_) => self.searches[parent].marker_stack.push(marker),
                MarkerPayload::Sentinel(_) => {
                    assert!(
                        self.searches[nested].marker_stack.is_empty(),
                        "sentinel found too early"
                    );
                    found = true;
                }
                MarkerPayload::Simple | MarkerPayload::ChoicePoint { .. } => {}
            }
        }
        self.searches[nested].search_depth = 0;
        self.searches[nested].left_search_depth = 0;
        assert!(found, "sentinel not found");
    }
}

// Failures.
impl Solver {
    /// Signals an inconsistency. The returned [`Failure`] must be propagated with `?` to
    /// the innermost search scope. Called with no search active, it posts a permanent
    /// false constraint so the next propagation fails deterministically.
    pub fn fail(&mut self) -> Failure {
        if let Some(mut intercept) = self.fail_intercept.take() {
            intercept(self);
            self.fail_intercept = Some(intercept);
            return Failure;
        }
        trace!("fail");
        if !self.active_search().fail_scope_active {
            warn!("fail() called outside of search");
            let constraint = Box::new(FalseConstraint::new("failure outside of search"));
            let _ = self.add_constraint(constraint);
        }
        Failure
    }

    /// Installs a hook that runs before a failure unwinds; used for cost-driven cuts.
    pub fn set_fail_intercept(&mut self, intercept: Box<dyn FnMut(&mut Solver)>) {
        self.fail_intercept = Some(intercept);
    }

    pub fn clear_fail_intercept(&mut self) {
        self.fail_intercept = None;
    }

    /// Registers a hook run on every backtrack caused by a failure.
    pub fn add_fail_hook(&mut self, hook: Box<dyn FnMut(&mut Solver)>) {
        self.fail_hooks.push(hook);
    }

    fn run_fail_hooks(&mut self) {
        if self.fail_hooks.is_empty() {
            return;
        }
        let mut hooks = mem::take(&mut self.fail_hooks);
        for hook in hooks.iter_mut() {
            hook(self);
        }
        hooks.append(&mut self.fail_hooks);
        self.fail_hooks = hooks;
    }

    /// Bookkeeping at the point a failure is caught: counters, the begin-fail hook, and the
    /// queue cleanup.
    fn catch_failure(&mut self) {
        self.stats.fails += 1;
        notify_monitors!(self, begin_fail());
        self.after_failure();
    }

    fn check_fail(&mut self) -> PropagationStatus {
        let search = self.active_search();
        if search.should_finish || search.should_restart {
            return Err(self.fail());
        }
        Ok(())
    }

    /// Asks the innermost search to stop after the current node.
    pub fn finish_current_search(&mut self) {
        self.active_search_mut().should_finish = true;
    }

    /// Asks the innermost search to restart from its root.
    pub fn restart_current_search(&mut self) {
        self.active_search_mut().should_restart = true;
    }
}

// Monitor notifications that poll the control flags.
impl Solver {
    fn notify_begin_next_decision(&mut self) -> PropagationStatus {
        notify_monitors!(self, begin_next_decision());
        notify_monitors!(self, periodic_check());
        self.check_fail()
    }

    fn notify_end_next_decision(&mut self, decision: Option<&DecisionRef>) -> PropagationStatus {
        notify_monitors!(self, end_next_decision(decision));
        self.check_fail()
    }

    fn notify_apply_decision(&mut self, decision: &DecisionRef) -> PropagationStatus {
        notify_monitors!(self, apply_decision(decision));
        self.check_fail()
    }

    fn notify_refute_decision(&mut self, decision: &DecisionRef) -> PropagationStatus {
        notify_monitors!(self, refute_decision(decision));
        self.check_fail()
    }

    fn notify_after_decision(
        &mut self,
        decision: &DecisionRef,
        applied: bool,
    ) -> PropagationStatus {
        notify_monitors!(self, after_decision(decision, applied));
        self.check_fail()
    }

    fn notify_accept_solution(&mut self) -> bool {
        let depth = self.searches.len() - 1;
        let count = self.searches[depth].monitors.len();
        let mut valid = true;
        for index in 0..count {
            let monitor = Rc::clone(&self.searches[depth].monitors[index]);
            if !monitor.borrow_mut().accept_solution(self) {
                // Every monitor deserves a chance to look at the solution.
                valid = false;
            }
        }
        valid
    }

    fn notify_at_solution(&mut self) -> bool {
        let depth = self.searches.len() - 1;
        let count = self.searches[depth].monitors.len();
        let mut should_continue = false;
        for index in 0..count {
            let monitor = Rc::clone(&self.searches[depth].monitors[index]);
            if monitor.borrow_mut().at_solution(self) {
                should_continue = true;
            }
        }
        should_continue
    }
}

// Search driver.
impl Solver {
    /// Installs a monitor on the innermost search.
    pub fn install_monitor(&mut self, monitor: MonitorRef) {
        self.active_search_mut().monitors.push(monitor);
    }

    /// Installs a monitor that observes both search and propagation events.
    pub fn install_propagation_monitor<M: PropagationMonitor + 'static>(
        &mut self,
        monitor: Rc<RefCell<M>>,
    ) {
        self.install_monitor(monitor.clone());
        self.propagation_trace.install(monitor);
    }

    /// Installs a per-search hook that may rewrite the branching of every decision. The
    /// uninstall action is depth-guarded because nested searches are destroyed on
    /// backtrack.
    pub fn set_branch_selector(&mut self, selector: BranchSelector) {
        let solve_depth = self.solve_depth();
        self.add_backtrack_action(
            Box::new(move |solver: &mut Solver| {
                if solver.solve_depth() == solve_depth {
                    solver.active_search_mut().selector = None;
                }
            }),
            false,
        );
        self.active_search_mut().selector = Some(selector);
    }

    fn modify_decision(&mut self) -> DecisionModification {
        let selector = self.active_search().selector.clone();
        match selector {
            Some(selector) => (selector.borrow_mut())(self),
            None => DecisionModification::NoChange,
        }
    }

    fn currently_in_solve(&self) -> bool {
        debug_assert!(self.solve_depth() > 0);
        self.active_search().created_by_solve
    }

    /// Opens a new top-level search.
    pub fn new_search(
        &mut self,
        decision_builder: Box<dyn DecisionBuilder>,
        monitors: Vec<MonitorRef>,
    ) {
        assert!(
            !matches!(
                self.state,
                SolverState::InSearch | SolverState::InRootNode
            ),
            "use nested_solve() inside a search"
        );
        debug_assert_eq!(2, self.searches.len());
        self.searches[1].created_by_solve = false;
        self.backtrack_to_sentinel(SentinelCode::InitialSearch);
        self.state = SolverState::OutsideSearch;
        self.install_search(decision_builder, monitors);
    }

    fn install_search(
        &mut self,
        mut decision_builder: Box<dyn DecisionBuilder>,
        monitors: Vec<MonitorRef>,
    ) {
        if let Some(profiler) = self.demon_profiler.clone() {
            self.install_monitor(profiler);
        }
        for monitor in monitors {
            self.install_monitor(monitor);
        }
        for monitor in decision_builder.append_monitors(self) {
            self.install_monitor(monitor);
        }
        // The trace is installed last so it observes all other monitors' effects.
        if let Some(logger) = self.propagation_logger.clone() {
            self.install_monitor(logger);
        } else if self.flags.trace_search {
            self.install_monitor(Rc::new(RefCell::new(SearchTrace)));
        }

        // The solution counter is reset when entering search, not when leaving, so the
        // information persists outside of the search.
        self.active_search_mut().solution_counter = 0;
        notify_monitors!(self, enter_search());

        self.push_sentinel(SentinelCode::InitialSearch);
        self.active_search_mut().decision_builder = Some(decision_builder);
    }

    /// Searches for the next solution. Returns true when one was found; the engine is then
    /// `AtSolution` and variable values can be read off. Returns false on exhaustion or
    /// root infeasibility.
    pub fn next_solution(&mut self) -> bool {
        let solve_depth = self.solve_depth();
        let top_level = solve_depth <= 1;

        if solve_depth == 0 && self.active_search().decision_builder.is_none() {
            warn!("next_solution() called without a new_search() before");
            return false;
        }

        let mut right_branch: Option<DecisionRef> = None;
        if top_level {
            match self.state {
                SolverState::ProblemInfeasible | SolverState::NoMoreSolutions => return false,
                SolverState::AtSolution => match self.backtrack_one_level() {
                    Some(decision) => {
                        right_branch = Some(decision);
                        self.state = SolverState::InSearch;
                    }
                    None => {
                        self.state = SolverState::NoMoreSolutions;
                        return false;
                    }
                },
                SolverState::OutsideSearch => {
                    self.state = SolverState::InRootNode;
                    self.active_search_mut().fail_scope_active = true;
                    notify_monitors!(self, begin_initial_propagation());
                    match self.root_node_propagation() {
                        Ok(()) => {
                            self.push_sentinel(SentinelCode::RootNode);
                            self.state = SolverState::InSearch;
                        }
                        Err(Failure) => {
                            self.catch_failure();
                            self.backtrack_to_sentinel(SentinelCode::InitialSearch);
                            self.state = SolverState::ProblemInfeasible;
                            self.active_search_mut().fail_scope_active = false;
                            return false;
                        }
                    }
                }
                // Usually after a restart_search().
                SolverState::InSearch => {}
                SolverState::InRootNode => {
                    panic!("next_solution() called from within the root node")
                }
            }
        }

        let mut result = false;
        loop {
            self.active_search_mut().fail_scope_active = true;
            match self.search_iteration(right_branch.take()) {
                Ok(()) => {
                    result = true;
                    break;
                }
                Err(Failure) => {
                    self.catch_failure();
                    let index = self.searches.len() - 1;
                    if self.searches[index].should_finish {
                        let code = if top_level {
                            SentinelCode::RootNode
                        } else {
                            SentinelCode::InitialSearch
                        };
                        self.backtrack_to_sentinel(code);
                        self.searches[index].should_finish = false;
                        self.searches[index].should_restart = false;
                        break;
                    } else if self.searches[index].should_restart {
                        let code = if top_level {
                            SentinelCode::RootNode
                        } else {
                            SentinelCode::InitialSearch
                        };
                        self.backtrack_to_sentinel(code);
                        self.searches[index].should_finish = false;
                        self.searches[index].should_restart = false;
                        self.push_sentinel(code);
                        self.stats.restarts += 1;
                        notify_monitors!(self, restart_search());
                    } else if let Some(decision) = self.backtrack_one_level() {
                        right_branch = Some(decision);
                    } else {
                        break;
                    }
                }
            }
        }
        self.active_search_mut().fail_scope_active = false;
        if top_level {
            self.state = if result {
                SolverState::AtSolution
            } else {
                SolverState::NoMoreSolutions
            };
        }
        result
    }

    fn root_node_propagation(&mut self) -> PropagationStatus {
        self.process_constraints()?;
        notify_monitors!(self, end_initial_propagation());
        Ok(())
    }

    /// One pass of the main loop: refute the pending right branch, descend through
    /// decisions until a leaf, and try to accept the solution there. Every non-solution
    /// outcome unwinds as a failure.
    fn search_iteration(&mut self, right_branch: Option<DecisionRef>) -> PropagationStatus {
        if let Some(decision) = right_branch {
            let search = self.active_search();
            let depth = search.search_depth;
            let left_depth = search.left_search_depth;
            self.push_marker(
                MarkerPayload::ChoicePoint {
                    decision: Rc::clone(&decision),
                    branch: Branch::Right,
                    depth,
                    left_depth,
                },
                true,
            );
            self.notify_refute_decision(&decision)?;
            self.stats.branches += 1;
            decision.refute(self)?;
            self.notify_after_decision(&decision, false)?;
            self.active_search_mut().right_move();
        }

        loop {
            self.notify_begin_next_decision()?;
            let decision = self.builder_next()?;
            self.notify_end_next_decision(decision.as_ref())?;
            let Some(decision) = decision else { break };

            let mut decision = decision;
            let mut modification = self.modify_decision();
            if modification == DecisionModification::SwitchBranches {
                decision = Rc::new(ReverseDecision::new(decision));
                modification = DecisionModification::NoChange;
            }
            match modification {
                DecisionModification::NoChange => {
                    self.stats.decisions += 1;
                    let search = self.active_search();
                    let depth = search.search_depth;
                    let left_depth = search.left_search_depth;
                    self.push_marker(
                        MarkerPayload::ChoicePoint {
                            decision: Rc::clone(&decision),
                            branch: Branch::Left,
                            depth,
                            left_depth,
                        },
                        true,
                    );
                    self.notify_apply_decision(&decision)?;
                    self.stats.branches += 1;
                    decision.apply(self)?;
                    self.notify_after_decision(&decision, true)?;
                    self.active_search_mut().left_move();
                }
                DecisionModification::KeepLeft => {
                    self.notify_apply_decision(&decision)?;
                    decision.apply(self)?;
                    self.notify_after_decision(&decision, true)?;
                }
                DecisionModification::KeepRight => {
                    self.notify_refute_decision(&decision)?;
                    decision.refute(self)?;
                    self.notify_after_decision(&decision, false)?;
                }
                DecisionModification::KillBoth => return Err(self.fail()),
                DecisionModification::SwitchBranches => unreachable!("rewritten above"),
            }
        }

        if self.notify_accept_solution() {
            self.active_search_mut().solution_counter += 1;
            if !self.notify_at_solution() || !self.currently_in_solve() {
                Ok(())
            } else {
                Err(self.fail())
            }
        } else {
            Err(self.fail())
        }
    }

    fn builder_next(&mut self) -> Result<Option<DecisionRef>, Failure> {
        let index = self.searches.len() - 1;
        let mut builder = self.searches[index]
            .decision_builder
            .take()
            .expect("a decision builder is installed during search");
        let result = builder.next(self);
        self.searches[index].decision_builder = Some(builder);
        result
    }

    /// Closes the top-level search and returns the engine to `OutsideSearch`.
    pub fn end_search(&mut self) {
        assert_eq!(2, self.searches.len(), "end_search() with nested searches open");
        self.backtrack_to_sentinel(SentinelCode::InitialSearch);
        notify_monitors!(self, exit_search());
        if let Some(path) = self.flags.profile_file.clone() {
            if let Some(profiler) = &self.demon_profiler {
                info!("exporting demon profile to {}", path.display());
                profiler.borrow().export(&path);
            }
        }
        self.searches[1].clear();
        self.state = SolverState::OutsideSearch;
    }

    /// Wipes the current search back to its root and notifies the monitors.
    pub fn restart_search(&mut self) {
        let index = self.searches.len() - 1;
        assert_ne!(0, self.searches[index].sentinel_pushed);
        if self.solve_depth() == 1 {
            if self.searches[index].sentinel_pushed > 1 {
                self.backtrack_to_sentinel(SentinelCode::RootNode);
            }
            assert_eq!(1, self.searches[index].sentinel_pushed);
            self.push_sentinel(SentinelCode::RootNode);
            self.state = SolverState::InSearch;
        } else {
            assert!(matches!(self.state, SolverState::InSearch));
            if self.searches[index].sentinel_pushed > 0 {
                self.backtrack_to_sentinel(SentinelCode::InitialSearch);
            }
            assert_eq!(0, self.searches[index].sentinel_pushed);
            self.push_sentinel(SentinelCode::InitialSearch);
        }
        self.stats.restarts += 1;
        notify_monitors!(self, restart_search());
    }

    /// `new_search` + a single `next_solution` + `end_search`; returns whether a solution
    /// was found.
    pub fn solve(
        &mut self,
        decision_builder: Box<dyn DecisionBuilder>,
        monitors: Vec<MonitorRef>,
    ) -> bool {
        self.new_search(decision_builder, monitors);
        self.searches[1].created_by_solve = true;
        let _ = self.next_solution();
        let solution_found = self.searches[1].solution_counter > 0;
        self.end_search();
        solution_found
    }

    /// Runs a search nested inside the current decision. With `restore` every side effect
    /// of the nested search is erased on success; without it, reversible actions are
    /// promoted to the outer search and survive.
    pub fn nested_solve(
        &mut self,
        decision_builder: Box<dyn DecisionBuilder>,
        restore: bool,
        monitors: Vec<MonitorRef>,
    ) -> bool {
        assert!(
            matches!(
                self.state,
                SolverState::InSearch | SolverState::InRootNode
            ),
            "nested_solve() requires an active search"
        );
        self.searches.push(Search::new());
        self.active_search_mut().created_by_solve = true;
        self.install_search(decision_builder, monitors);

        let result = self.next_solution();
        if result {
            if restore {
                self.backtrack_to_sentinel(SentinelCode::InitialSearch);
            } else {
                self.jump_to_sentinel_when_nested();
            }
        }
        notify_monitors!(self, exit_search());
        let _ = self
            .searches
            .pop()
            .expect("the nested search is still on the stack");
        result
    }

    /// Solves a throwaway search whose only effect is adding `constraint`; returns whether
    /// the constraint is consistent with the current model.
    pub fn check_constraint(&mut self, constraint: Box<dyn Constraint>) -> bool {
        let adder = crate::branching::ConstraintAdder::new(constraint);
        self.solve(Box::new(adder), Vec::new())
    }

    /// One-shot check: applies `assignment` at the root, propagates, and restores. Returns
    /// whether the assignment is consistent with the model.
    pub fn check_assignment(&mut self, assignment: &Assignment) -> bool {
        assert!(
            !matches!(
                self.state,
                SolverState::InSearch | SolverState::InRootNode
            ),
            "use nested_solve() inside a search"
        );
        debug_assert_eq!(2, self.searches.len());
        self.searches[1].created_by_solve = false;
        self.backtrack_to_sentinel(SentinelCode::InitialSearch);
        self.state = SolverState::OutsideSearch;
        self.searches[1].solution_counter = 0;
        notify_monitors!(self, enter_search());
        self.push_sentinel(SentinelCode::InitialSearch);
        notify_monitors!(self, begin_initial_propagation());
        self.state = SolverState::InRootNode;
        self.searches[1].fail_scope_active = true;
        let result = self
            .apply_assignment(assignment)
            .and_then(|()| self.root_node_propagation());
        self.searches[1].fail_scope_active = false;
        match result {
            Ok(()) => {
                self.backtrack_to_sentinel(SentinelCode::InitialSearch);
                self.state = SolverState::OutsideSearch;
                true
            }
            Err(Failure) => {
                self.catch_failure();
                self.backtrack_to_sentinel(SentinelCode::InitialSearch);
                self.state = SolverState::ProblemInfeasible;
                false
            }
        }
    }

    fn apply_assignment(&mut self, assignment: &Assignment) -> PropagationStatus {
        for &(var, value) in assignment.iter() {
            self.set_value(var, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_state_restores_domains() {
        let mut solver = Solver::default();
        let x = solver.new_int_var(0, 10);

        solver.push_state();
        solver.set_min(x, 5).expect("non-empty domain");
        solver.set_max(x, 7).expect("non-empty domain");
        assert_eq!(solver.min(x), 5);
        assert_eq!(solver.max(x), 7);

        solver.pop_state();
        assert_eq!(solver.min(x), 0);
        assert_eq!(solver.max(x), 10);
    }

    #[test]
    fn fail_outside_search_posts_a_false_constraint() {
        let mut solver = Solver::default();
        let _ = solver.new_int_var(0, 1);
        let _ = solver.fail();

        // The next search fails at the root deterministically.
        let db = Box::new(crate::branching::InputOrderMin::new(vec![]));
        assert!(!solver.solve(db, Vec::new()));
        assert_eq!(solver.state(), SolverState::OutsideSearch);
    }

    #[test]
    fn wipeout_reports_failure_and_keeps_domain_intact() {
        let mut solver = Solver::default();
        let x = solver.new_int_var(0, 5);
        assert!(solver.set_min(x, 6).is_err());
        assert_eq!(solver.min(x), 0);
        assert_eq!(solver.max(x), 5);
    }

    #[test]
    fn remove_value_digs_holes_and_rounds_bounds() {
        let mut solver = Solver::default();
        let x = solver.new_int_var(0, 5);

        solver.remove_value(x, 3).expect("non-empty domain");
        assert!(!solver.contains(x, 3));
        assert!(solver.contains(x, 2));

        // Tightening onto the hole rounds past it.
        solver.set_min(x, 3).expect("non-empty domain");
        assert_eq!(solver.min(x), 4);
    }

    #[test]
    fn bool_vars_restore_through_the_hook_partition() {
        let mut solver = Solver::default();
        let b = solver.new_bool_var();

        solver.push_state();
        solver.set_value(b, 1).expect("non-empty domain");
        assert!(solver.is_bound(b));
        assert_eq!(solver.value(b), 1);

        solver.pop_state();
        assert!(!solver.is_bound(b));
        assert_eq!(solver.min(b), 0);
        assert_eq!(solver.max(b), 1);
    }

    #[test]
    fn rev_cells_restore_on_pop() {
        let mut solver = Solver::default();
        let counter = solver.new_rev_i64(0);

        solver.push_state();
        solver.set_rev_i64(counter, 42);
        assert_eq!(solver.rev_i64(counter), 42);

        solver.pop_state();
        assert_eq!(solver.rev_i64(counter), 0);
    }
}
