use std::ops::Deref;
use std::ops::DerefMut;

use enumset::enum_set;
use enumset::EnumSet;

use crate::basic_types::Failure;
use crate::basic_types::PropagationStatus;
#[cfg(doc)]
use crate::engine::constraints::Constraint;
use crate::engine::constraints::ConstraintDemon;
use crate::engine::constraints::ConstraintId;
use crate::engine::constraints::ConstraintStore;
use crate::engine::demon::Demon;
use crate::engine::demon::DemonId;
use crate::engine::demon::DemonPriority;
use crate::engine::demon::DemonStore;
use crate::engine::demon::INHIBITED_STAMP;
use crate::engine::queue::DemonQueue;
use crate::engine::search::monitor::PropagationTrace;
use crate::engine::trail::RevI64;
use crate::engine::trail::Trail;
use crate::engine::variables::DomainEventKind;
use crate::engine::variables::DomainKind;
use crate::engine::variables::DomainStore;
use crate::engine::variables::VarId;

/// The view of the engine handed to demons and constraints during propagation.
///
/// It spans the reversible state (trail and domains) and the scheduling state (queue and
/// trace) but deliberately excludes the demon and constraint stores, so that a boxed demon
/// can be borrowed out of its store while running against the rest of the engine.
///
/// Every mutation logs the overwritten state to the trail before writing and enqueues the
/// demons subscribed to the change categories it triggers. A mutation that would empty a
/// domain reports [`Failure`] and leaves the domain untouched.
pub struct PropagationContext<'a> {
    pub(crate) trail: &'a mut Trail,
    pub(crate) domains: &'a mut DomainStore,
    pub(crate) queue: &'a mut DemonQueue,
    pub(crate) trace: &'a PropagationTrace,
}

impl PropagationContext<'_> {
    pub fn min(&self, var: VarId) -> i64 {
        self.domains.min(self.trail, var)
    }

    pub fn max(&self, var: VarId) -> i64 {
        self.domains.max(self.trail, var)
    }

    pub fn is_bound(&self, var: VarId) -> bool {
        self.domains.is_bound(self.trail, var)
    }

    /// The single value of a bound variable.
    pub fn value(&self, var: VarId) -> i64 {
        debug_assert!(self.is_bound(var), "value() called on an unbound variable");
        self.min(var)
    }

    pub fn contains(&self, var: VarId, value: i64) -> bool {
        self.domains.contains(self.trail, var, value)
    }

    /// Lower bound at the start of the current propagation wave.
    pub fn old_min(&self, var: VarId) -> i64 {
        self.domains.old_min(self.trail, var)
    }

    /// Upper bound at the start of the current propagation wave.
    pub fn old_max(&self, var: VarId) -> i64 {
        self.domains.old_max(self.trail, var)
    }

    pub fn stamp(&self) -> u64 {
        self.queue.stamp()
    }

    pub fn set_min(&mut self, var: VarId, value: i64) -> PropagationStatus {
        let min = self.min(var);
        let max = self.max(var);
        if value <= min {
            return Ok(());
        }
        if value > max {
            return Err(Failure);
        }
        let (min_cell, _) = match &self.domains.data(var).domain {
            DomainKind::Int { min, max, .. } => (*min, *max),
            DomainKind::Bool { .. } => return self.assign_bool(var, true),
        };
        let new_min = self
            .domains
            .round_up(self.trail, var, value, max)
            .ok_or(Failure)?;
        self.trace.on_set_min(var, new_min);
        self.trail.save_and_set_i64(min_cell, new_min);
        let became_bound = new_min == max;
        self.touch(var, range_events(became_bound));
        Ok(())
    }

    pub fn set_max(&mut self, var: VarId, value: i64) -> PropagationStatus {
        let min = self.min(var);
        let max = self.max(var);
        if value >= max {
            return Ok(());
        }
        if value < min {
            return Err(Failure);
        }
        let (_, max_cell) = match &self.domains.data(var).domain {
            DomainKind::Int { min, max, .. } => (*min, *max),
            DomainKind::Bool { .. } => return self.assign_bool(var, false),
        };
        let new_max = self
            .domains
            .round_down(self.trail, var, value, min)
            .ok_or(Failure)?;
        self.trace.on_set_max(var, new_max);
        self.trail.save_and_set_i64(max_cell, new_max);
        let became_bound = new_max == min;
        self.touch(var, range_events(became_bound));
        Ok(())
    }

    pub fn set_range(&mut self, var: VarId, min: i64, max: i64) -> PropagationStatus {
        if min > max {
            return Err(Failure);
        }
        self.set_min(var, min)?;
        self.set_max(var, max)
    }

    pub fn set_value(&mut self, var: VarId, value: i64) -> PropagationStatus {
        self.set_range(var, value, value)
    }

    pub fn remove_value(&mut self, var: VarId, value: i64) -> PropagationStatus {
        let min = self.min(var);
        let max = self.max(var);
        if value < min || value > max {
            return Ok(());
        }
        if min == max {
            // Removing the only remaining value.
            return Err(Failure);
        }
        if value == min {
            return self.set_min(var, value + 1);
        }
        if value == max {
            return self.set_max(var, value - 1);
        }
        self.domains.ensure_holes(self.trail, var);
        let removed = match &self.domains.data(var).domain {
            DomainKind::Int {
                holes: Some(holes), ..
            } => holes.remove(self.trail, value),
            // An unbound boolean has no interior value; the bound cases returned above.
            _ => unreachable!("interior removal on a variable without a hole bitset"),
        };
        if removed {
            self.trace.on_remove_value(var, value);
            self.touch(var, enum_set!(DomainEventKind::Domain));
        }
        Ok(())
    }

    pub fn remove_interval(&mut self, var: VarId, min: i64, max: i64) -> PropagationStatus {
        if min > max {
            return Ok(());
        }
        let current_min = self.min(var);
        let current_max = self.max(var);
        if min <= current_min {
            if max >= current_max {
                return Err(Failure);
            }
            if max >= current_min {
                return self.set_min(var, max + 1);
            }
            return Ok(());
        }
        if max >= current_max {
            if min <= current_max {
                return self.set_max(var, min - 1);
            }
            return Ok(());
        }
        for value in min..=max {
            self.remove_value(var, value)?;
        }
        Ok(())
    }

    /// Restricts the domain of `var` to the listed values.
    pub fn set_values(&mut self, var: VarId, values: &[i64]) -> PropagationStatus {
        self.trace.on_set_values(var, values);
        let min = self.min(var);
        let max = self.max(var);
        for value in min..=max {
            if !values.contains(&value) {
                self.remove_value(var, value)?;
            }
        }
        Ok(())
    }

    pub fn remove_values(&mut self, var: VarId, values: &[i64]) -> PropagationStatus {
        self.trace.on_remove_values(var, values);
        for &value in values {
            self.remove_value(var, value)?;
        }
        Ok(())
    }

    /// Schedules `demon` for the current propagation wave. A demon already scheduled in this
    /// wave, or an inhibited demon, is left alone.
    pub fn enqueue(&mut self, demon: DemonId) {
        let _ = self.queue.try_enqueue(demon);
    }

    /// Stops `demon` from reacting to any event until it is desinhibited. Reversible.
    pub fn inhibit(&mut self, demon: DemonId) {
        let stamp = self.queue.demon_stamp(demon);
        if stamp < INHIBITED_STAMP {
            self.trail.save_demon_stamp(demon, stamp);
            self.queue.set_demon_stamp(demon, INHIBITED_STAMP);
        }
    }

    /// Reverses an [`PropagationContext::inhibit`].
    pub fn desinhibit(&mut self, demon: DemonId) {
        let stamp = self.queue.demon_stamp(demon);
        if stamp == INHIBITED_STAMP {
            self.trail.save_demon_stamp(demon, stamp);
            let reactivated = self.queue.stamp() - 1;
            self.queue.set_demon_stamp(demon, reactivated);
        }
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

    pub(crate) fn refresh_old_bounds(&mut self, var: VarId) {
        let min = self.domains.min(self.trail, var);
        let max = self.domains.max(self.trail, var);
        let data = self.domains.data_mut(var);
        data.old_min = min;
        data.old_max = max;
    }

    fn assign_bool(&mut self, var: VarId, value: bool) -> PropagationStatus {
        let current = match &self.domains.data(var).domain {
            DomainKind::Bool { value } => *value,
            DomainKind::Int { .. } => unreachable!("assign_bool on an integer variable"),
        };
        match current {
            Some(b) if b == value => Ok(()),
            Some(_) => Err(Failure),
            None => {
                self.trace.on_set_value(var, value as i64);
                self.trail.save_bool_var(var);
                match &mut self.domains.data_mut(var).domain {
                    DomainKind::Bool { value: slot } => *slot = Some(value),
                    DomainKind::Int { .. } => unreachable!(),
                }
                self.touch(var, range_events(true));
                Ok(())
            }
        }
    }

    /// Enqueues the variable's update demon and every demon subscribed to one of the
    /// triggered categories. The stamp gate makes repeat notifications within one wave free.
    fn touch(&mut self, var: VarId, events: EnumSet<DomainEventKind>) {
        let update = self.domains.data(var).update_demon;
        let _ = self.queue.try_enqueue(update);
        for event in events {
            for &demon in self.domains.subscribers(var, event) {
                let _ = self.queue.try_enqueue(demon);
            }
        }
    }
}

fn range_events(became_bound: bool) -> EnumSet<DomainEventKind> {
    let mut events = DomainEventKind::Range | DomainEventKind::Domain;
    if became_bound {
        events |= DomainEventKind::Bound;
    }
    events
}

/// The view handed to a running demon: the propagation context plus the constraint store, so
/// a demon can call back into the constraint it belongs to.
pub struct RunContext<'a> {
    pub(crate) constraints: &'a mut ConstraintStore,
    pub(crate) context: PropagationContext<'a>,
}

impl<'a> Deref for RunContext<'a> {
    type Target = PropagationContext<'a>;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

impl<'a> DerefMut for RunContext<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.context
    }
}

impl RunContext<'_> {
    /// Runs the main reaction of `constraint` against the current domains.
    pub fn propagate_constraint(&mut self, constraint: ConstraintId) -> PropagationStatus {
        self.constraints[constraint].propagate(&mut self.context)
    }
}

/// The view handed to [`Constraint::post`]: enough to create demons, subscribe them to
/// variables, and allocate reversible state — but no domain mutation, since posting never
/// narrows.
pub struct PostContext<'a> {
    pub(crate) demons: &'a mut DemonStore,
    pub(crate) queue: &'a mut DemonQueue,
    pub(crate) domains: &'a mut DomainStore,
    pub(crate) trail: &'a mut Trail,
    pub(crate) trace: &'a PropagationTrace,
    pub(crate) constraint: ConstraintId,
}

impl PostContext<'_> {
    pub fn min(&self, var: VarId) -> i64 {
        self.domains.min(self.trail, var)
    }

    pub fn max(&self, var: VarId) -> i64 {
        self.domains.max(self.trail, var)
    }

    pub fn is_bound(&self, var: VarId) -> bool {
        self.domains.is_bound(self.trail, var)
    }

    /// Registers a demon with the engine and returns its id. The demon's priority is read
    /// once at registration. The registration is undone when the posting scope is rewound.
    pub fn register_demon(&mut self, demon: Box<dyn Demon>) -> DemonId {
        let priority = demon.priority();
        let id = self.demons.alloc(demon);
        let registered = self.queue.register(priority);
        debug_assert_eq!(id, registered);
        self.trail.save_demon_created(id);
        self.trace.register_demon(id);
        id
    }

    /// Registers the generic demon that calls [`Constraint::propagate`] on the constraint
    /// being posted.
    pub fn make_constraint_demon(&mut self, priority: DemonPriority) -> DemonId {
        let demon = ConstraintDemon::new(self.constraint, priority);
        self.register_demon(Box::new(demon))
    }

    /// Subscribes `demon` to run when `var` becomes bound.
    pub fn when_bound(&mut self, var: VarId, demon: DemonId) {
        self.domains
            .subscribe(self.trail, var, enum_set!(DomainEventKind::Bound), demon);
    }

    /// Subscribes `demon` to run when a bound of `var` moves.
    pub fn when_range(&mut self, var: VarId, demon: DemonId) {
        self.domains
            .subscribe(self.trail, var, enum_set!(DomainEventKind::Range), demon);
    }

    /// Subscribes `demon` to run on any tightening of `var`'s domain.
    pub fn when_domain(&mut self, var: VarId, demon: DemonId) {
        self.domains
            .subscribe(self.trail, var, enum_set!(DomainEventKind::Domain), demon);
    }

    pub fn subscribe(&mut self, var: VarId, events: EnumSet<DomainEventKind>, demon: DemonId) {
        self.domains.subscribe(self.trail, var, events, demon);
    }

    pub fn new_rev_i64(&mut self, value: i64) -> RevI64 {
        self.trail.new_i64(value)
    }
}
