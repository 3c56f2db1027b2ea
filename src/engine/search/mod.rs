pub(crate) mod decision;
pub(crate) mod limit;
pub(crate) mod monitor;
pub(crate) mod profiler;

use std::fmt;

use self::decision::BranchSelector;
use self::decision::DecisionBuilder;
use self::decision::DecisionRef;
use self::monitor::MonitorRef;
use crate::engine::solver::Solver;
use crate::engine::trail::TrailPosition;

/// Magic codes identifying which search scope a sentinel closes. Popping a sentinel with an
/// unexpected code is a fatal sentinel-discipline violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub(crate) enum SentinelCode {
    InitialSearch = 10_000_000,
    RootNode = 20_000_000,
    SolverCtor = 40_000_000,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Branch {
    Left,
    Right,
}

/// Payload of a state marker on a search's marker stack.
pub(crate) enum MarkerPayload {
    /// User checkpoint pushed through `push_state`.
    Simple,
    /// Scope boundary terminating backtracks.
    Sentinel(SentinelCode),
    /// One node of the search tree. `depth`/`left_depth` are the search depths at push time,
    /// restored when the marker is popped on the way to the right branch.
    ChoicePoint {
        decision: DecisionRef,
        branch: Branch,
        depth: i32,
        left_depth: i32,
    },
    /// Callable run when the marker is popped on backtrack. Markers pushed with the fast
    /// flag skip the trail snapshot, making side-effect-free actions cheap.
    Action(Box<dyn FnOnce(&mut Solver)>),
}

impl fmt::Debug for MarkerPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerPayload::Simple => write!(f, "Simple"),
            MarkerPayload::Sentinel(code) => write!(f, "Sentinel({code:?})"),
            MarkerPayload::ChoicePoint { branch, depth, .. } => {
                write!(f, "ChoicePoint({branch:?}, depth {depth})")
            }
            MarkerPayload::Action(_) => write!(f, "Action"),
        }
    }
}

/// A snapshot of the trail partition sizes plus a tagged payload.
#[derive(Debug)]
pub(crate) struct StateMarker {
    /// `None` for reversible actions pushed with the fast flag.
    pub(crate) position: Option<TrailPosition>,
    pub(crate) payload: MarkerPayload,
}

/// One (possibly nested) search: its marker stack, monitors, decision builder, and control
/// flags. The driver logic lives on [`Solver`]; this is the state it drives.
pub(crate) struct Search {
    pub(crate) marker_stack: Vec<StateMarker>,
    pub(crate) monitors: Vec<MonitorRef>,
    pub(crate) decision_builder: Option<Box<dyn DecisionBuilder>>,
    pub(crate) created_by_solve: bool,
    pub(crate) selector: Option<BranchSelector>,
    pub(crate) search_depth: i32,
    pub(crate) left_search_depth: i32,
    pub(crate) should_restart: bool,
    pub(crate) should_finish: bool,
    pub(crate) sentinel_pushed: i32,
    pub(crate) solution_counter: i64,
    /// Whether a fail-escape scope is currently able to catch a [`crate::Failure`]; the
    /// analogue of the longjmp buffer being armed.
    pub(crate) fail_scope_active: bool,
}

impl fmt::Debug for Search {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Search")
            .field("markers", &self.marker_stack.len())
            .field("monitors", &self.monitors.len())
            .field("search_depth", &self.search_depth)
            .field("sentinel_pushed", &self.sentinel_pushed)
            .finish()
    }
}

impl Search {
    pub(crate) fn new() -> Search {
        Search::with_depth(0)
    }

    /// The sentinel search sitting below the top-level search; its depth counters are
    /// initialised to -1 so it is distinguishable from a real search.
    pub(crate) fn dummy() -> Search {
        Search::with_depth(-1)
    }

    fn with_depth(depth: i32) -> Search {
        Search {
            marker_stack: Vec::new(),
            monitors: Vec::new(),
            decision_builder: None,
            created_by_solve: false,
            selector: None,
            search_depth: depth,
            left_search_depth: depth,
            should_restart: false,
            should_finish: false,
            sentinel_pushed: 0,
            solution_counter: 0,
            fail_scope_active: false,
        }
    }

    pub(crate) fn left_move(&mut self) {
        self.search_depth += 1;
        self.left_search_depth += 1;
    }

    pub(crate) fn right_move(&mut self) {
        self.search_depth += 1;
    }

    /// Resets the per-search installation state; used when a search ends.
    pub(crate) fn clear(&mut self) {
        self.monitors.clear();
        self.search_depth = 0;
        self.left_search_depth = 0;
        self.selector = None;
    }
}
