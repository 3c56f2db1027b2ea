use std::collections::VecDeque;
use std::fmt;

use crate::containers::Arena;
use crate::engine::constraints::ConstraintId;
use crate::engine::demon::DemonId;
use crate::engine::demon::DemonPriority;
use crate::engine::solver::Solver;

/// An action run once when the queue is cleaned up after a failure.
pub type FailAction = Box<dyn FnOnce(&mut Solver)>;

#[derive(Clone, Copy, Debug)]
pub(crate) struct DemonMeta {
    pub(crate) priority: DemonPriority,
    /// The wave stamp at which the demon was last enqueued; `INHIBITED_STAMP` while inhibited.
    pub(crate) stamp: u64,
}

/// The scheduling half of the propagation engine: three single-priority FIFOs of demon ids,
/// the wave stamp used for deduplication, and the freeze/guard bookkeeping.
///
/// The queue never runs demons itself; the solver owns the demon objects and drives the
/// fixed-point loop, consulting this structure for what to run next.
pub(crate) struct DemonQueue {
    queues: [VecDeque<DemonId>; DemonPriority::COUNT],
    meta: Arena<DemonId, DemonMeta>,
    stamp: u64,
    /// The number of nested freeze levels. The queue is frozen iff `freeze_level > 0`.
    freeze_level: u32,
    pub(crate) in_process: bool,
    pub(crate) in_add: bool,
    /// Constraints posted while propagation was already draining; the list may grow while it
    /// is being iterated.
    pub(crate) to_add: Vec<ConstraintId>,
    action_on_fail: Option<FailAction>,
}

impl fmt::Debug for DemonQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemonQueue")
            .field("stamp", &self.stamp)
            .field("freeze_level", &self.freeze_level)
            .field("in_process", &self.in_process)
            .field("in_add", &self.in_add)
            .field("queues", &self.queues)
            .finish()
    }
}

impl Default for DemonQueue {
    fn default() -> DemonQueue {
        DemonQueue {
            queues: Default::default(),
            meta: Arena::new(),
            stamp: 1,
            freeze_level: 0,
            in_process: false,
            in_add: false,
            to_add: Vec::new(),
            action_on_fail: None,
        }
    }
}

impl DemonQueue {
    /// Registers scheduling metadata for a freshly created demon. The returned id must match
    /// the id under which the solver stores the demon object.
    pub(crate) fn register(&mut self, priority: DemonPriority) -> DemonId {
        self.meta.alloc(DemonMeta { priority, stamp: 0 })
    }

    pub(crate) fn stamp(&self) -> u64 {
        self.stamp
    }

    pub(crate) fn increase_stamp(&mut self) {
        self.stamp += 1;
    }

    pub(crate) fn freeze(&mut self) {
        self.freeze_level += 1;
        // A freeze opens a new propagation wave: demons that already ran must be able to
        // re-enqueue once the queue thaws.
        self.stamp += 1;
    }

    /// Balances a [`DemonQueue::freeze`]; returns true when the queue thawed completely and
    /// the caller must run the fixed point.
    pub(crate) fn unfreeze(&mut self) -> bool {
        debug_assert!(self.freeze_level > 0, "unbalanced unfreeze");
        self.freeze_level -= 1;
        self.freeze_level == 0
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.freeze_level > 0
    }

    /// Stamp-gated enqueue: returns true when the demon was appended to its FIFO, false when
    /// it was already scheduled in this wave (or is inhibited).
    pub(crate) fn try_enqueue(&mut self, demon: DemonId) -> bool {
        let meta = &mut self.meta[demon];
        if meta.stamp < self.stamp {
            meta.stamp = self.stamp;
            self.queues[meta.priority.index()].push_back(demon);
            true
        } else {
            false
        }
    }

    pub(crate) fn pop(&mut self, priority: DemonPriority) -> Option<DemonId> {
        self.queues[priority.index()].pop_front()
    }

    pub(crate) fn has_pending(&self, priority: DemonPriority) -> bool {
        !self.queues[priority.index()].is_empty()
    }

    pub(crate) fn all_empty(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
    }

    pub(crate) fn demon_priority(&self, demon: DemonId) -> DemonPriority {
        self.meta[demon].priority
    }

    pub(crate) fn demon_stamp(&self, demon: DemonId) -> u64 {
        self.meta[demon].stamp
    }

    /// Plain stamp write, used when a demon is taken off a queue to run (allowing it to
    /// re-enqueue within the same wave) and by inhibition. Not logged; inhibition logs the
    /// old value through the trail before calling this.
    pub(crate) fn set_demon_stamp(&mut self, demon: DemonId, stamp: u64) {
        self.meta[demon].stamp = stamp;
    }

    /// Trail hook: restores a demon stamp saved by inhibit/desinhibit.
    pub(crate) fn restore_stamp(&mut self, demon: DemonId, stamp: u64) {
        self.meta[demon].stamp = stamp;
    }

    /// Trail hook: drops the metadata of the most recently registered demon.
    pub(crate) fn unregister_last(&mut self, demon: DemonId) {
        use crate::containers::Handle;
        debug_assert_eq!(self.meta.len() - 1, demon.index());
        let _ = self.meta.pop_last();
    }

    pub(crate) fn set_action_on_fail(&mut self, action: FailAction) {
        self.action_on_fail = Some(action);
    }

    pub(crate) fn clear_action_on_fail(&mut self) {
        self.action_on_fail = None;
    }

    pub(crate) fn take_action_on_fail(&mut self) -> Option<FailAction> {
        self.action_on_fail.take()
    }

    /// Flushes every queued demon and resets the guards. The fail action is taken and run by
    /// the solver, which owns the context it needs.
    pub(crate) fn flush_after_failure(&mut self) {
        for queue in &mut self.queues {
            queue.clear();
        }
        self.freeze_level = 0;
        self.in_process = false;
        self.in_add = false;
        self.to_add.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_gate_deduplicates_within_a_wave() {
        let mut queue = DemonQueue::default();
        let demon = queue.register(DemonPriority::Normal);

        assert!(queue.try_enqueue(demon));
        assert!(!queue.try_enqueue(demon));

        assert_eq!(queue.pop(DemonPriority::Normal), Some(demon));
        assert!(queue.all_empty());

        // A new wave lets the demon back in.
        queue.increase_stamp();
        assert!(queue.try_enqueue(demon));
    }

    #[test]
    fn freeze_opens_a_new_wave() {
        let mut queue = DemonQueue::default();
        let demon = queue.register(DemonPriority::Delayed);

        assert!(queue.try_enqueue(demon));
        queue.freeze();
        assert!(queue.try_enqueue(demon));
        // Fully thawed: the caller is now responsible for running the fixed point.
        assert!(queue.unfreeze());

        // Both enqueues landed on the same FIFO; they refer to the same demon.
        assert_eq!(queue.pop(DemonPriority::Delayed), Some(demon));
        assert_eq!(queue.pop(DemonPriority::Delayed), Some(demon));
    }

    #[test]
    fn flush_after_failure_clears_all_queues_and_guards() {
        let mut queue = DemonQueue::default();
        let a = queue.register(DemonPriority::Normal);
        let b = queue.register(DemonPriority::Var);
        let _ = queue.try_enqueue(a);
        let _ = queue.try_enqueue(b);
        queue.freeze();
        queue.in_process = true;

        queue.flush_after_failure();
        assert!(queue.all_empty());
        assert!(!queue.is_frozen());
        assert!(!queue.in_process);
    }
}
