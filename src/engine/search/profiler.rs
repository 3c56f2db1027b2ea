use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use std::time::Instant;

use log::warn;

use crate::engine::demon::DemonId;
use crate::engine::search::monitor::PropagationMonitor;
use crate::engine::search::monitor::SearchMonitor;
use crate::engine::solver::Solver;

#[derive(Clone, Copy, Debug, Default)]
struct DemonProfile {
    runs: u64,
    total_time: Duration,
}

/// Propagation monitor accumulating per-demon run counts and wall time.
///
/// Built by the engine when profiling is enabled and installed before any user monitor; the
/// overview is written to the configured profile file when the search ends.
#[derive(Debug, Default)]
pub struct DemonProfiler {
    profiles: HashMap<DemonId, DemonProfile>,
    run_started: Option<(DemonId, Instant)>,
}

impl DemonProfiler {
    pub fn new() -> DemonProfiler {
        DemonProfiler::default()
    }

    pub fn runs(&self, demon: DemonId) -> u64 {
        self.profiles.get(&demon).map_or(0, |profile| profile.runs)
    }

    /// Writes the profiling overview, one line per demon, sorted by total time.
    pub fn export(&self, path: &Path) {
        let mut entries: Vec<_> = self.profiles.iter().collect();
        entries.sort_by(|a, b| b.1.total_time.cmp(&a.1.total_time));

        let mut report = String::new();
        let _ = writeln!(report, "demon profile ({} demons)", entries.len());
        for (demon, profile) in entries {
            let _ = writeln!(
                report,
                "{demon:?}: runs={} time={:?}",
                profile.runs, profile.total_time
            );
        }
        if let Err(error) = std::fs::write(path, report) {
            warn!("cannot write demon profile to {}: {error}", path.display());
        }
    }
}

impl SearchMonitor for DemonProfiler {
    fn exit_search(&mut self, solver: &mut Solver) {
        let _ = solver;
        self.run_started = None;
    }
}

impl PropagationMonitor for DemonProfiler {
    fn begin_demon_run(&mut self, demon: DemonId) {
        self.run_started = Some((demon, Instant::now()));
    }

    fn end_demon_run(&mut self, demon: DemonId) {
        let profile = self.profiles.entry(demon).or_default();
        profile.runs += 1;
        if let Some((started_demon, start)) = self.run_started.take() {
            if started_demon == demon {
                profile.total_time += start.elapsed();
            }
        }
    }
}
