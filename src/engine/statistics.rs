use log::info;

use crate::engine::demon::DemonPriority;

/// A set of counters updated during the search.
///
/// Branches count every taken branch (left and right); decisions count only choice points.
/// Demon runs are kept per priority, which makes the NORMAL/VAR/DELAYED split visible when
/// tuning propagator priorities.
#[derive(Clone, Copy, Debug, Default)]
pub struct SolverStatistics {
    pub(crate) branches: i64,
    pub(crate) fails: i64,
    pub(crate) decisions: i64,
    pub(crate) restarts: i64,
    pub(crate) demon_runs: [i64; DemonPriority::COUNT],
}

impl SolverStatistics {
    pub fn branches(&self) -> i64 {
        self.branches
    }

    pub fn fails(&self) -> i64 {
        self.fails
    }

    pub fn decisions(&self) -> i64 {
        self.decisions
    }

    pub fn restarts(&self) -> i64 {
        self.restarts
    }

    pub fn demon_runs(&self, priority: DemonPriority) -> i64 {
        self.demon_runs[priority.index()]
    }

    /// Logs the counters in `name=value` form at info level.
    pub fn log(&self, prefix: &str) {
        info!("{prefix} branches={}", self.branches);
        info!("{prefix} fails={}", self.fails);
        info!("{prefix} decisions={}", self.decisions);
        info!("{prefix} restarts={}", self.restarts);
        info!(
            "{prefix} demonRunsNormal={}",
            self.demon_runs[DemonPriority::Normal.index()]
        );
        info!(
            "{prefix} demonRunsVar={}",
            self.demon_runs[DemonPriority::Var.index()]
        );
        info!(
            "{prefix} demonRunsDelayed={}",
            self.demon_runs[DemonPriority::Delayed.index()]
        );
    }
}
