//! # acorn-solver
//!
//! The execution core of a finite-domain constraint programming solver: a reversible state
//! store (the trail), a three-priority propagation queue of demons, and a depth-first search
//! driver with choice points, monitors, and nested sub-searches.
//!
//! The engine owns every variable, demon, and constraint; concrete constraint and variable
//! libraries plug into the [`Constraint`]/[`Demon`] contract, and search strategies into the
//! [`Decision`]/[`DecisionBuilder`] contract.
//!
//! # Example
//!
//! ```rust
//! use acorn_solver::branching::InputOrderMin;
//! use acorn_solver::Solver;
//!
//! let mut solver = Solver::default();
//! let x = solver.new_int_var(0, 3);
//! let y = solver.new_int_var(0, 3);
//!
//! solver.new_search(Box::new(InputOrderMin::new(vec![x, y])), Vec::new());
//! assert!(solver.next_solution());
//! assert_eq!(solver.value(x), 0);
//! assert_eq!(solver.value(y), 0);
//! solver.end_search();
//! ```
//!
//! Failures (domain wipeouts, monitor-requested stops) travel as the error variant of
//! [`PropagationStatus`] up to the innermost search scope; the driver cleans up the queue
//! and backtracks the trail. See the module documentation of the individual parts for the
//! contracts between them.

pub(crate) mod basic_types;
pub mod branching;
pub(crate) mod containers;
pub(crate) mod engine;

pub use basic_types::Failure;
pub use basic_types::PropagationStatus;
pub use basic_types::Random;
pub use containers::Arena;
pub use containers::Handle;
pub use engine::constraints::Constraint;
pub use engine::constraints::ConstraintId;
pub use engine::constraints::FalseConstraint;
pub use engine::constraints::TrueConstraint;
pub use engine::demon::Demon;
pub use engine::demon::DemonId;
pub use engine::demon::DemonPriority;
pub use engine::flags::ConfigFlags;
pub use engine::flags::FlagError;
pub use engine::parameters::ProfileLevel;
pub use engine::parameters::SolverParameters;
pub use engine::parameters::TraceLevel;
pub use engine::parameters::TrailCompression;
pub use engine::propagation::PostContext;
pub use engine::propagation::PropagationContext;
pub use engine::propagation::RunContext;
pub use engine::queue::FailAction;
pub use engine::search::decision::BranchSelector;
pub use engine::search::decision::Decision;
pub use engine::search::decision::DecisionBuilder;
pub use engine::search::decision::DecisionModification;
pub use engine::search::decision::DecisionRef;
pub use engine::search::limit::SearchLimit;
pub use engine::search::monitor::MonitorRef;
pub use engine::search::monitor::PropagationLogger;
pub use engine::search::monitor::PropagationMonitor;
pub use engine::search::monitor::PropagationMonitorRef;
pub use engine::search::monitor::SearchMonitor;
pub use engine::search::monitor::SearchTrace;
pub use engine::search::profiler::DemonProfiler;
pub use engine::solver::Assignment;
pub use engine::solver::Solver;
pub use engine::solver::SolverState;
pub use engine::statistics::SolverStatistics;
pub use engine::trail::RevBool;
pub use engine::trail::RevI64;
pub use engine::trail::RevInt;
pub use engine::trail::RevU64;
pub use engine::variables::DomainEventKind;
pub use engine::variables::VarId;
