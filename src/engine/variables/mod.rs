use enumset::EnumSet;
use enumset::EnumSetType;

use crate::basic_types::PropagationStatus;
use crate::containers::Arena;
use crate::containers::Handle;
use crate::engine::demon::Demon;
use crate::engine::demon::DemonId;
use crate::engine::demon::DemonPriority;
use crate::engine::propagation::RunContext;
use crate::engine::trail::RevI64;
use crate::engine::trail::RevU64;
use crate::engine::trail::Trail;

/// Identifies a variable owned by a [`crate::Solver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId {
    id: u32,
}

impl Handle for VarId {
    fn from_index(index: usize) -> Self {
        VarId { id: index as u32 }
    }

    fn index(self) -> usize {
        self.id as usize
    }
}

/// The change categories a demon can subscribe to on a variable.
///
/// `Bound` fires when the domain collapses to a single value, `Range` when a bound moves, and
/// `Domain` on any tightening including inner value removal. A change that fires a narrow
/// category also fires every wider category that includes it.
#[derive(Debug, EnumSetType)]
pub enum DomainEventKind {
    Bound,
    Range,
    Domain,
}

fn category_index(event: DomainEventKind) -> usize {
    match event {
        DomainEventKind::Bound => 0,
        DomainEventKind::Range => 1,
        DomainEventKind::Domain => 2,
    }
}

/// Lazily allocated bitset recording inner value removals of an integer variable.
///
/// The words are reversible `u64` cells, so removals roll back with the trail; the bitset
/// allocation itself is permanent, which is indistinguishable from an all-present bitset
/// after backtracking past the first removal.
#[derive(Clone, Debug)]
pub(crate) struct Holes {
    offset: i64,
    words: Vec<RevU64>,
}

impl Holes {
    fn new(trail: &mut Trail, initial_min: i64, initial_max: i64) -> Holes {
        let width = (initial_max - initial_min + 1) as usize;
        let words = (0..width.div_ceil(64))
            .map(|_| trail.new_u64(u64::MAX))
            .collect();
        Holes {
            offset: initial_min,
            words,
        }
    }

    fn bit(&self, value: i64) -> (usize, u64) {
        let index = (value - self.offset) as usize;
        (index / 64, 1u64 << (index % 64))
    }

    pub(crate) fn contains(&self, trail: &Trail, value: i64) -> bool {
        let (word, mask) = self.bit(value);
        trail.u64(self.words[word]) & mask != 0
    }

    /// Clears the bit for `value`; returns false when it was already absent.
    pub(crate) fn remove(&self, trail: &mut Trail, value: i64) -> bool {
        let (word, mask) = self.bit(value);
        let current = trail.u64(self.words[word]);
        if current & mask == 0 {
            return false;
        }
        trail.save_and_set_u64(self.words[word], current & !mask);
        true
    }

    /// First present value in `[from, limit]`, scanning upward.
    fn next_present_above(&self, trail: &Trail, from: i64, limit: i64) -> Option<i64> {
        let mut value = from;
        while value <= limit {
            if self.contains(trail, value) {
                return Some(value);
            }
            value += 1;
        }
        None
    }

    /// First present value in `[limit, from]`, scanning downward.
    fn next_present_below(&self, trail: &Trail, from: i64, limit: i64) -> Option<i64> {
        let mut value = from;
        while value >= limit {
            if self.contains(trail, value) {
                return Some(value);
            }
            value -= 1;
        }
        None
    }
}

#[derive(Debug)]
pub(crate) enum DomainKind {
    Int {
        min: RevI64,
        max: RevI64,
        initial_min: i64,
        initial_max: i64,
        holes: Option<Holes>,
    },
    Bool {
        /// `None` while unbound. Restored to `None` through the trail's boolean-variable
        /// hook partition, not through a primitive cell.
        value: Option<bool>,
    },
}

#[derive(Debug)]
pub(crate) struct VarData {
    pub(crate) domain: DomainKind,
    /// Bounds at the start of the current propagation wave. Plain fields: they are refreshed
    /// by the update demon, never restored on backtrack, and clamped on read.
    pub(crate) old_min: i64,
    pub(crate) old_max: i64,
    /// Internal demon at VAR priority that refreshes `old_min`/`old_max`.
    pub(crate) update_demon: DemonId,
    subscribers: [Vec<DemonId>; 3],
}

/// Storage of all variables of the engine, indexed by [`VarId`].
///
/// Reversible state (bounds, hole bitsets) lives in the trail's cell arenas; this store holds
/// the handles, the subscriber lists, and the wave-scoped old bounds.
#[derive(Debug, Default)]
pub struct DomainStore {
    vars: Arena<VarId, VarData>,
}

impl DomainStore {
    pub(crate) fn grow_int(
        &mut self,
        trail: &mut Trail,
        min: i64,
        max: i64,
        update_demon: DemonId,
    ) -> VarId {
        assert!(min <= max, "cannot create an empty domain");
        let min_cell = trail.new_i64(min);
        let max_cell = trail.new_i64(max);
        self.vars.alloc(VarData {
            domain: DomainKind::Int {
                min: min_cell,
                max: max_cell,
                initial_min: min,
                initial_max: max,
                holes: None,
            },
            old_min: min,
            old_max: max,
            update_demon,
            subscribers: Default::default(),
        })
    }

    pub(crate) fn grow_bool(&mut self, update_demon: DemonId) -> VarId {
        self.vars.alloc(VarData {
            domain: DomainKind::Bool { value: None },
            old_min: 0,
            old_max: 1,
            update_demon,
            subscribers: Default::default(),
        })
    }

    pub(crate) fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub(crate) fn data(&self, var: VarId) -> &VarData {
        &self.vars[var]
    }

    pub(crate) fn data_mut(&mut self, var: VarId) -> &mut VarData {
        &mut self.vars[var]
    }

    pub(crate) fn min(&self, trail: &Trail, var: VarId) -> i64 {
        match &self.vars[var].domain {
            DomainKind::Int { min, .. } => trail.i64(*min),
            DomainKind::Bool { value } => match value {
                Some(b) => *b as i64,
                None => 0,
            },
        }
    }

    pub(crate) fn max(&self, trail: &Trail, var: VarId) -> i64 {
        match &self.vars[var].domain {
            DomainKind::Int { max, .. } => trail.i64(*max),
            DomainKind::Bool { value } => match value {
                Some(b) => *b as i64,
                None => 1,
            },
        }
    }

    pub(crate) fn is_bound(&self, trail: &Trail, var: VarId) -> bool {
        self.min(trail, var) == self.max(trail, var)
    }

    pub(crate) fn contains(&self, trail: &Trail, var: VarId, value: i64) -> bool {
        match &self.vars[var].domain {
            DomainKind::Int { min, max, holes, .. } => {
                let inside = trail.i64(*min) <= value && value <= trail.i64(*max);
                match holes {
                    Some(holes) if inside => holes.contains(trail, value),
                    _ => inside,
                }
            }
            DomainKind::Bool { value: current } => match current {
                Some(b) => value == *b as i64,
                None => value == 0 || value == 1,
            },
        }
    }

    /// Bounds at the start of the current propagation wave. Stale snapshots left behind by a
    /// backtrack are clamped so that `old_min <= min <= max <= old_max` always holds.
    pub(crate) fn old_min(&self, trail: &Trail, var: VarId) -> i64 {
        self.vars[var].old_min.min(self.min(trail, var))
    }

    pub(crate) fn old_max(&self, trail: &Trail, var: VarId) -> i64 {
        self.vars[var].old_max.max(self.max(trail, var))
    }

    /// Subscribes `demon` to the given change categories of `var`. Each actual insertion is
    /// logged so that rewinding past the posting point unsubscribes again.
    pub(crate) fn subscribe(
        &mut self,
        trail: &mut Trail,
        var: VarId,
        events: EnumSet<DomainEventKind>,
        demon: DemonId,
    ) {
        for event in events {
            let list = &mut self.vars[var].subscribers[category_index(event)];
            if !list.contains(&demon) {
                list.push(demon);
                trail.save_subscription(var, event, demon);
            }
        }
    }

    /// Trail hook: undoes the most recent subscription of `demon` on `var`.
    pub(crate) fn unsubscribe_last(&mut self, var: VarId, event: DomainEventKind, demon: DemonId) {
        let list = &mut self.vars[var].subscribers[category_index(event)];
        let popped = list.pop();
        debug_assert_eq!(popped, Some(demon));
    }

    pub(crate) fn subscribers(&self, var: VarId, event: DomainEventKind) -> &[DemonId] {
        &self.vars[var].subscribers[category_index(event)]
    }

    /// Trail hook: a boolean variable saved through [`Trail::save_bool_var`] becomes unbound
    /// again.
    pub(crate) fn restore_bool_var(&mut self, var: VarId) {
        match &mut self.vars[var].domain {
            DomainKind::Bool { value } => *value = None,
            DomainKind::Int { .. } => {
                unreachable!("integer variable on the boolean restore partition")
            }
        }
    }

    pub(crate) fn ensure_holes(&mut self, trail: &mut Trail, var: VarId) {
        if let DomainKind::Int {
            initial_min,
            initial_max,
            holes,
            ..
        } = &mut self.vars[var].domain
        {
            if holes.is_none() {
                *holes = Some(Holes::new(trail, *initial_min, *initial_max));
            }
        }
    }

    /// Rounds `value` up to the nearest value still present in `var`'s domain, staying at or
    /// below `limit`.
    pub(crate) fn round_up(&self, trail: &Trail, var: VarId, value: i64, limit: i64) -> Option<i64> {
        match &self.vars[var].domain {
            DomainKind::Int {
                holes: Some(holes), ..
            } => holes.next_present_above(trail, value, limit),
            _ => (value <= limit).then_some(value),
        }
    }

    /// Rounds `value` down to the nearest value still present in `var`'s domain, staying at
    /// or above `limit`.
    pub(crate) fn round_down(&self, trail: &Trail, var: VarId, value: i64, limit: i64) -> Option<i64> {
        match &self.vars[var].domain {
            DomainKind::Int {
                holes: Some(holes), ..
            } => holes.next_present_below(trail, value, limit),
            _ => (value >= limit).then_some(value),
        }
    }
}

/// Internal demon attached to every variable. It runs at VAR priority, after the NORMAL
/// demons triggered by the variable's changes have drained, and moves the wave-start bounds
/// forward to the current bounds.
#[derive(Debug)]
pub(crate) struct VarUpdateDemon {
    var: VarId,
}

impl VarUpdateDemon {
    pub(crate) fn new(var: VarId) -> VarUpdateDemon {
        VarUpdateDemon { var }
    }
}

impl Demon for VarUpdateDemon {
    fn run(&mut self, context: &mut RunContext<'_>) -> PropagationStatus {
        context.refresh_old_bounds(self.var);
        Ok(())
    }

    fn priority(&self) -> DemonPriority {
        DemonPriority::Var
    }

    fn debug_string(&self) -> String {
        format!("VarUpdateDemon({:?})", self.var)
    }
}
