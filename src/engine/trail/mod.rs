pub(crate) mod packed_store;
pub(crate) mod packer;

use std::any::Any;

use self::packed_store::PackedStore;
use self::packer::Entry;
use self::packer::TrailPacker;
use self::packer::TrailValue;
use crate::containers::Handle;
use crate::engine::demon::DemonId;
use crate::engine::demon::DemonStore;
use crate::engine::parameters::SolverParameters;
use crate::engine::queue::DemonQueue;
use crate::engine::variables::DomainEventKind;
use crate::engine::variables::DomainStore;
use crate::engine::variables::VarId;

macro_rules! rev_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name {
            id: u32,
        }

        impl Handle for $name {
            fn from_index(index: usize) -> Self {
                Self { id: index as u32 }
            }

            fn index(self) -> usize {
                self.id as usize
            }
        }
    };
}

rev_handle!(
    /// Handle to a reversible `i32` cell owned by the trail.
    RevInt
);
rev_handle!(
    /// Handle to a reversible `i64` cell owned by the trail.
    RevI64
);
rev_handle!(
    /// Handle to a reversible `u64` cell owned by the trail.
    RevU64
);
rev_handle!(
    /// Handle to a reversible `bool` cell owned by the trail.
    RevBool
);

/// One typed arena of reversible cells together with its block-packed mutation log.
///
/// This is the arena-index rendition of the original address/value trail: a cell is identified
/// by its index, and the log records `(cell, old_value)` pairs that are replayed in LIFO order
/// on rewind.
#[derive(Debug)]
struct RevArena<T: TrailValue> {
    values: Vec<T>,
    log: PackedStore<T>,
}

impl<T: TrailValue> RevArena<T> {
    fn new(block_size: usize, packer: TrailPacker) -> RevArena<T> {
        RevArena {
            values: Vec::new(),
            log: PackedStore::new(block_size, packer),
        }
    }

    fn new_cell(&mut self, value: T) -> u32 {
        self.values.push(value);
        (self.values.len() - 1) as u32
    }

    fn get(&self, cell: u32) -> T {
        self.values[cell as usize]
    }

    fn save_and_set(&mut self, cell: u32, value: T) {
        let old = self.values[cell as usize];
        if old == value {
            return;
        }
        self.log.push(Entry { cell, old });
        self.values[cell as usize] = value;
    }

    fn rewind(&mut self, target: usize) {
        while self.log.size() > target {
            let entry = self
                .log
                .pop()
                .expect("log size exceeds target, so an entry remains");
            self.values[entry.cell as usize] = entry.old;
        }
    }
}

/// Snapshot of the size of every trail partition, captured by state markers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TrailPosition {
    ints: usize,
    int64s: usize,
    uint64s: usize,
    bools: usize,
    bool_vars: usize,
    demon_stamps: usize,
    subscriptions: usize,
    demons_created: usize,
    objects: usize,
}

/// The reversible-state store: typed cell arenas with append-only mutation logs, plus the
/// special partitions that need a restore hook or own memory until rewind.
///
/// Primitive partitions (`i32`, `i64`, `u64`) are block-packed; the boolean partition is a
/// plain vector since boolean saves are rare and cheap. Rewind never fails.
pub(crate) struct Trail {
    ints: RevArena<i32>,
    int64s: RevArena<i64>,
    uint64s: RevArena<u64>,
    bool_values: Vec<bool>,
    bool_log: Vec<(u32, bool)>,
    /// Boolean variables whose domain is restored through the variable store's hook.
    bool_vars: Vec<VarId>,
    /// Demon stamps saved by inhibit/desinhibit, restored into the queue's registry.
    demon_stamps: Vec<(DemonId, u64)>,
    /// Demon subscriptions made while posting constraints; undone on rewind so a search can
    /// be torn down and the model re-posted cleanly.
    subscriptions: Vec<(VarId, DomainEventKind, DemonId)>,
    /// Demons registered while posting constraints; dropped on rewind, in LIFO order.
    demons_created: Vec<DemonId>,
    /// Memory owned until the registering scope is rewound.
    objects: Vec<Box<dyn Any>>,
}

impl std::fmt::Debug for Trail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let position = self.position();
        f.debug_struct("Trail").field("position", &position).finish()
    }
}

impl Trail {
    pub(crate) fn new(parameters: &SolverParameters) -> Trail {
        let packer = TrailPacker::for_compression(parameters.trail_compression);
        let block_size = parameters.trail_block_size;
        Trail {
            ints: RevArena::new(block_size, packer),
            int64s: RevArena::new(block_size, packer),
            uint64s: RevArena::new(block_size, packer),
            bool_values: Vec::new(),
            bool_log: Vec::new(),
            bool_vars: Vec::new(),
            demon_stamps: Vec::new(),
            subscriptions: Vec::new(),
            demons_created: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub(crate) fn new_int(&mut self, value: i32) -> RevInt {
        RevInt::from_index(self.ints.new_cell(value) as usize)
    }

    pub(crate) fn int(&self, cell: RevInt) -> i32 {
        self.ints.get(cell.index() as u32)
    }

    pub(crate) fn save_and_set_int(&mut self, cell: RevInt, value: i32) {
        self.ints.save_and_set(cell.index() as u32, value);
    }

    pub(crate) fn new_i64(&mut self, value: i64) -> RevI64 {
        RevI64::from_index(self.int64s.new_cell(value) as usize)
    }

    pub(crate) fn i64(&self, cell: RevI64) -> i64 {
        self.int64s.get(cell.index() as u32)
    }

    pub(crate) fn save_and_set_i64(&mut self, cell: RevI64, value: i64) {
        self.int64s.save_and_set(cell.index() as u32, value);
    }

    pub(crate) fn new_u64(&mut self, value: u64) -> RevU64 {
        RevU64::from_index(self.uint64s.new_cell(value) as usize)
    }

    pub(crate) fn u64(&self, cell: RevU64) -> u64 {
        self.uint64s.get(cell.index() as u32)
    }

    pub(crate) fn save_and_set_u64(&mut self, cell: RevU64, value: u64) {
        self.uint64s.save_and_set(cell.index() as u32, value);
    }

    pub(crate) fn new_bool(&mut self, value: bool) -> RevBool {
        self.bool_values.push(value);
        RevBool::from_index(self.bool_values.len() - 1)
    }

    pub(crate) fn bool(&self, cell: RevBool) -> bool {
        self.bool_values[cell.index()]
    }

    pub(crate) fn save_and_set_bool(&mut self, cell: RevBool, value: bool) {
        let old = self.bool_values[cell.index()];
        if old == value {
            return;
        }
        self.bool_log.push((cell.index() as u32, old));
        self.bool_values[cell.index()] = value;
    }

    /// Record that `var` is a boolean variable which must be restored through the variable
    /// store's type-specific hook when the current scope is rewound.
    pub(crate) fn save_bool_var(&mut self, var: VarId) {
        self.bool_vars.push(var);
    }

    pub(crate) fn save_demon_stamp(&mut self, demon: DemonId, old_stamp: u64) {
        self.demon_stamps.push((demon, old_stamp));
    }

    pub(crate) fn save_subscription(&mut self, var: VarId, event: DomainEventKind, demon: DemonId) {
        self.subscriptions.push((var, event, demon));
    }

    pub(crate) fn save_demon_created(&mut self, demon: DemonId) {
        self.demons_created.push(demon);
    }

    /// Take ownership of `object`; it is dropped when the registering scope is rewound.
    pub(crate) fn alloc_object(&mut self, object: Box<dyn Any>) {
        self.objects.push(object);
    }

    pub(crate) fn position(&self) -> TrailPosition {
        TrailPosition {
            ints: self.ints.log.size(),
            int64s: self.int64s.log.size(),
            uint64s: self.uint64s.log.size(),
            bools: self.bool_log.len(),
            bool_vars: self.bool_vars.len(),
            demon_stamps: self.demon_stamps.len(),
            subscriptions: self.subscriptions.len(),
            demons_created: self.demons_created.len(),
            objects: self.objects.len(),
        }
    }

    /// Restore every partition to the sizes captured in `position`, replaying the logged old
    /// values in LIFO order, then release all memory registered after the snapshot.
    pub(crate) fn rewind_to(
        &mut self,
        position: &TrailPosition,
        domains: &mut DomainStore,
        queue: &mut DemonQueue,
        demons: &mut DemonStore,
    ) {
        self.ints.rewind(position.ints);
        self.int64s.rewind(position.int64s);
        self.uint64s.rewind(position.uint64s);

        while self.bool_log.len() > position.bools {
            let (cell, old) = self.bool_log.pop().expect("length checked above");
            self.bool_values[cell as usize] = old;
        }

        while self.bool_vars.len() > position.bool_vars {
            let var = self.bool_vars.pop().expect("length checked above");
            domains.restore_bool_var(var);
        }

        while self.demon_stamps.len() > position.demon_stamps {
            let (demon, old_stamp) = self.demon_stamps.pop().expect("length checked above");
            queue.restore_stamp(demon, old_stamp);
        }

        while self.subscriptions.len() > position.subscriptions {
            let (var, event, demon) = self.subscriptions.pop().expect("length checked above");
            domains.unsubscribe_last(var, event, demon);
        }

        while self.demons_created.len() > position.demons_created {
            let demon = self.demons_created.pop().expect("length checked above");
            queue.unregister_last(demon);
            let _ = demons.pop_last();
        }

        self.objects.truncate(position.objects);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::engine::parameters::TrailCompression;

    fn small_trail(compression: TrailCompression) -> Trail {
        let parameters = SolverParameters {
            trail_block_size: 8,
            trail_compression: compression,
            ..Default::default()
        };
        Trail::new(&parameters)
    }

    #[test]
    fn rewind_restores_primitive_cells_in_lifo_order() {
        for compression in [TrailCompression::None, TrailCompression::Generic] {
            let mut trail = small_trail(compression);
            let mut domains = DomainStore::default();
            let mut queue = DemonQueue::default();
            let mut demons = DemonStore::default();

            let x = trail.new_i64(3);
            let y = trail.new_int(-7);
            let position = trail.position();

            for step in 0..50 {
                trail.save_and_set_i64(x, step);
                trail.save_and_set_int(y, step as i32);
            }
            assert_eq!(trail.i64(x), 49);

            trail.rewind_to(&position, &mut domains, &mut queue, &mut demons);
            assert_eq!(trail.i64(x), 3);
            assert_eq!(trail.int(y), -7);
            assert_eq!(trail.position(), position);
        }
    }

    #[test]
    fn equal_value_writes_are_not_logged() {
        let mut trail = small_trail(TrailCompression::None);
        let cell = trail.new_u64(11);
        let position = trail.position();

        trail.save_and_set_u64(cell, 11);
        assert_eq!(trail.position(), position);
    }

    #[test]
    fn owned_objects_are_released_on_rewind() {
        let mut trail = small_trail(TrailCompression::None);
        let mut domains = DomainStore::default();
        let mut queue = DemonQueue::default();
        let mut demons = DemonStore::default();

        let token = Rc::new(());
        let position = trail.position();
        trail.alloc_object(Box::new(Rc::clone(&token)));
        assert_eq!(Rc::strong_count(&token), 2);

        trail.rewind_to(&position, &mut domains, &mut queue, &mut demons);
        assert_eq!(Rc::strong_count(&token), 1);
    }

    #[test]
    fn bool_cells_restore_through_plain_log() {
        let mut trail = small_trail(TrailCompression::None);
        let mut domains = DomainStore::default();
        let mut queue = DemonQueue::default();
        let mut demons = DemonStore::default();

        let flag = trail.new_bool(false);
        let position = trail.position();
        trail.save_and_set_bool(flag, true);
        assert!(trail.bool(flag));

        trail.rewind_to(&position, &mut domains, &mut queue, &mut demons);
        assert!(!trail.bool(flag));
    }
}
