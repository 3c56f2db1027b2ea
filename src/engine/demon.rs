use crate::basic_types::PropagationStatus;
use crate::containers::Arena;
use crate::containers::Handle;
use crate::engine::propagation::RunContext;

/// Identifies a demon registered with the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DemonId {
    id: u32,
}

impl Handle for DemonId {
    fn from_index(index: usize) -> Self {
        DemonId { id: index as u32 }
    }

    fn index(self) -> usize {
        self.id as usize
    }
}

/// The scheduling class of a demon.
///
/// NORMAL demons are drained before anything else; VAR demons run one at a time so that the
/// NORMAL demons they spawn can interleave; DELAYED demons only run once everything else is
/// quiescent. This is what lets cheap bound reasoning converge before expensive propagators
/// get a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DemonPriority {
    Delayed,
    Var,
    Normal,
}

impl DemonPriority {
    pub(crate) const COUNT: usize = 3;

    pub(crate) fn index(self) -> usize {
        match self {
            DemonPriority::Delayed => 0,
            DemonPriority::Var => 1,
            DemonPriority::Normal => 2,
        }
    }
}

/// The stamp value of an inhibited demon: it compares greater-or-equal to every queue stamp,
/// so the stamp gate never lets it back onto a queue until it is desinhibited.
pub(crate) const INHIBITED_STAMP: u64 = u64::MAX;

/// Storage of the demon objects, indexed by [`DemonId`]. Scheduling metadata lives in the
/// queue so that a demon can be borrowed out of this store while it runs.
pub(crate) type DemonStore = Arena<DemonId, Box<dyn Demon>>;

/// A passive reactor scheduled to run when a variable it subscribed to changes.
///
/// Demons are owned by the engine; constraints subscribe them to variable change categories
/// during [`crate::Constraint::post`]. A demon carries the stamp of the propagation wave in
/// which it was last enqueued, which guarantees it is scheduled at most once per wave.
pub trait Demon {
    /// React to the subscribed changes. Runs to completion before any other demon is
    /// scheduled.
    fn run(&mut self, context: &mut RunContext<'_>) -> PropagationStatus;

    /// The priority queue this demon is scheduled on. Fixed for the demon's lifetime.
    fn priority(&self) -> DemonPriority {
        DemonPriority::Normal
    }

    fn debug_string(&self) -> String {
        "Demon".to_owned()
    }
}
