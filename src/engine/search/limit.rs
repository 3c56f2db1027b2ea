use std::time::Duration;
use std::time::Instant;

use log::debug;

use crate::engine::search::monitor::SearchMonitor;
use crate::engine::solver::Solver;

/// Monitor that stops the current search once a budget is exceeded.
///
/// All budgets are cooperative: they are checked in `periodic_check`, which the driver fires
/// before every decision, so precision is bounded by the longest uninterrupted demon run.
#[derive(Clone, Debug, Default)]
pub struct SearchLimit {
    time: Option<Duration>,
    branches: Option<i64>,
    failures: Option<i64>,
    solutions: Option<i64>,
    deadline: Option<Instant>,
    branches_at_entry: i64,
    failures_at_entry: i64,
}

impl SearchLimit {
    pub fn new() -> SearchLimit {
        SearchLimit::default()
    }

    pub fn with_time(mut self, time: Duration) -> SearchLimit {
        self.time = Some(time);
        self
    }

    pub fn with_branches(mut self, branches: i64) -> SearchLimit {
        self.branches = Some(branches);
        self
    }

    pub fn with_failures(mut self, failures: i64) -> SearchLimit {
        self.failures = Some(failures);
        self
    }

    pub fn with_solutions(mut self, solutions: i64) -> SearchLimit {
        self.solutions = Some(solutions);
        self
    }

    fn crossed(&self, solver: &Solver) -> bool {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        if let Some(branches) = self.branches {
            if solver.statistics().branches() - self.branches_at_entry >= branches {
                return true;
            }
        }
        if let Some(failures) = self.failures {
            if solver.statistics().fails() - self.failures_at_entry >= failures {
                return true;
            }
        }
        if let Some(solutions) = self.solutions {
            if solver.solutions() >= solutions {
                return true;
            }
        }
        false
    }

    fn arm(&mut self, solver: &Solver) {
        self.deadline = self.time.map(|time| Instant::now() + time);
        self.branches_at_entry = solver.statistics().branches();
        self.failures_at_entry = solver.statistics().fails();
    }
}

impl SearchMonitor for SearchLimit {
    fn enter_search(&mut self, solver: &mut Solver) {
        self.arm(solver);
    }

    fn restart_search(&mut self, solver: &mut Solver) {
        // A restart does not refresh the budget; only the counters keep their entry offsets.
        let _ = solver;
    }

    fn periodic_check(&mut self, solver: &mut Solver) {
        if self.crossed(solver) {
            debug!("search limit crossed, finishing current search");
            solver.finish_current_search();
        }
    }
}
