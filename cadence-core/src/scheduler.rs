//! Cooperative scheduler
//!
//! Runs every due [`Unit`] in time order on a single thread and keeps a
//! sliding-window estimate of how much of the CPU that work takes.
//!
//! Units live in a fixed arena with an intrusive, index-linked queue sorted
//! by next execution time. Insertion walks the queue (O(n)), popping the head
//! is O(1), and a unit is always placed after every queued unit with the same
//! execution time, so equal-time units run in submission order.
//!
//! Nothing here preempts: a unit that blocks stalls every unit due after it.
//!
//! A unit that leaves the queue (a finished one-shot or a halted unit) stays
//! parked in its slot with its statistics until it is removed, resubmitted
//! or its slot is reclaimed by a [`Scheduler::submit`] that finds no free
//! slot. Every [`UnitId`] carries the generation of its slot, so an id that
//! outlived its unit never addresses the unit that replaced it.
//!
//! # Example
//!
//! ```ignore
//! let mut scheduler: Scheduler<'_, _, 8> = Scheduler::new(clock);
//! scheduler.submit(Unit::periodic(&mut blink, 500))?;
//! loop {
//!     scheduler.tick_now();
//! }
//! ```

use cadence_hal::{Clock, Millis};

use crate::unit::Unit;

/// Length of the load measurement window
pub const LOAD_WINDOW_MS: Millis = 5000;

/// Width of one load accounting slot
pub const LOAD_SLOT_MS: Millis = 200;

/// Number of slots in the load window
pub const LOAD_SLOTS: usize = (LOAD_WINDOW_MS / LOAD_SLOT_MS) as usize;

/// Handle to a unit owned by a [`Scheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnitId {
    index: usize,
    generation: u32,
}

impl UnitId {
    /// Arena slot index
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Reasons [`Scheduler::submit`] hands a unit back
#[derive(Debug)]
pub enum SubmitError<'a> {
    /// Every arena slot is taken
    Full(Unit<'a>),
    /// The unit had a pending halt; the flag has been cleared and the unit
    /// was not scheduled
    Halted(Unit<'a>),
}

impl<'a> SubmitError<'a> {
    /// Take the rejected unit back
    pub fn into_unit(self) -> Unit<'a> {
        match self {
            SubmitError::Full(unit) | SubmitError::Halted(unit) => unit,
        }
    }
}

struct Slot<'a> {
    unit: Unit<'a>,
    queued: bool,
}

/// Time-ordered cooperative scheduler holding up to `N` units
pub struct Scheduler<'a, C, const N: usize> {
    clock: C,
    slots: [Option<Slot<'a>>; N],
    /// Bumped whenever a slot loses its unit
    generations: [u32; N],
    /// Queue links, parallel to `slots`
    next: [Option<usize>; N],
    head: Option<usize>,
    /// Accumulated execution time per load slot (µs)
    load_slots: [u64; LOAD_SLOTS],
    last_load_slot: usize,
}

impl<'a, C: Clock, const N: usize> Scheduler<'a, C, N> {
    /// Create an empty scheduler
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            slots: core::array::from_fn(|_| None),
            generations: [0; N],
            next: [None; N],
            head: None,
            load_slots: [0; LOAD_SLOTS],
            last_load_slot: 0,
        }
    }

    /// The clock used for submission and duration measurement
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Hand a unit to the scheduler
    ///
    /// A unit planned in the past is moved to `now + interval`: missed
    /// cycles are dropped, never run in a burst. A unit without a start time
    /// is planned at `now + interval`. A unit with a pending halt is not
    /// scheduled; its halt flag is cleared and it is returned in
    /// [`SubmitError::Halted`].
    ///
    /// When every slot is taken, the slot of a parked unit is reclaimed,
    /// finished one-shots before halted units. The parked unit is dropped
    /// and its id goes stale. Only a queue holding `N` units makes this
    /// fail with [`SubmitError::Full`].
    pub fn submit(&mut self, mut unit: Unit<'a>) -> Result<UnitId, SubmitError<'a>> {
        Self::catch_up(self.clock.now_ms(), &mut unit);

        if unit.is_halting() {
            unit.clear_halt();
            return Err(SubmitError::Halted(unit));
        }

        let Some(index) = self.free_slot() else {
            warn!("scheduler full, rejecting unit");
            return Err(SubmitError::Full(unit));
        };

        if self.slots[index].take().is_some() {
            debug!("reclaiming slot {} of a parked unit", index);
            self.bump_generation(index);
        }

        self.slots[index] = Some(Slot {
            unit,
            queued: false,
        });
        self.insert(index);
        Ok(self.id(index))
    }

    /// Queue a parked unit again
    ///
    /// Applies the same rules as [`Scheduler::submit`]. Returns `false` if
    /// the unit had a pending halt (cleared, unit stays parked). A unit that
    /// is already queued is left where it is.
    pub fn resubmit(&mut self, id: UnitId) -> bool {
        let now = self.clock.now_ms();
        let slot = self.slot_mut(id);
        if slot.queued {
            return true;
        }

        Self::catch_up(now, &mut slot.unit);

        if slot.unit.is_halting() {
            slot.unit.clear_halt();
            return false;
        }

        self.insert(id.index);
        true
    }

    /// Request deactivation of a unit at its next dequeue
    pub fn halt(&mut self, id: UnitId) {
        self.slot_mut(id).unit.halt();
    }

    /// Change a unit's repeat interval for future executions
    pub fn set_interval(&mut self, id: UnitId, interval: Millis) {
        self.slot_mut(id).unit.set_interval(interval);
    }

    /// Look at a unit, queued or parked
    ///
    /// `None` once the unit was removed or its slot reclaimed.
    pub fn unit(&self, id: UnitId) -> Option<&Unit<'a>> {
        self.slot(id).map(|slot| &slot.unit)
    }

    /// Whether a unit is currently in the queue
    pub fn is_queued(&self, id: UnitId) -> bool {
        self.slot(id).is_some_and(|slot| slot.queued)
    }

    /// Take a unit out of the scheduler, freeing its slot
    pub fn remove(&mut self, id: UnitId) -> Option<Unit<'a>> {
        let queued = self.slot(id)?.queued;
        if queued {
            self.unlink(id.index);
        }
        self.next[id.index] = None;
        self.bump_generation(id.index);
        self.slots[id.index].take().map(|slot| slot.unit)
    }

    /// Queued units in execution order
    pub fn queued(&self) -> impl Iterator<Item = (UnitId, &Unit<'a>)> + '_ {
        core::iter::successors(self.head, move |&index| self.next[index]).filter_map(move |index| {
            self.slots[index]
                .as_ref()
                .map(|slot| (self.id(index), &slot.unit))
        })
    }

    /// Log timing and statistics of every queued unit
    pub fn log_units(&self) {
        for (id, unit) in self.queued() {
            let stats = unit.stats();
            debug!(
                "unit {}: next {} every {} ms, {} calls, avg delay {} ms, avg duration {} us",
                id.index(),
                unit.exec_at(),
                unit.interval(),
                stats.calls,
                stats.avg_delay_ms(),
                stats.avg_duration_us()
            );
        }
    }

    /// Run every unit due at `now`
    ///
    /// Returns once the queue is empty or its head is planned after `now`.
    /// Periodic units are re-queued at `now + interval`, so none runs twice
    /// in one call.
    pub fn tick(&mut self, now: Millis) {
        while let Some(index) = self.pop(now) {
            let Some(slot) = self.slots[index].as_mut() else {
                continue;
            };

            if slot.unit.is_halting() {
                slot.unit.clear_halt();
                debug!("unit {} halted", index);
                continue;
            }

            slot.unit.start(now, &self.clock);
            let duration_us = slot.unit.stats().last_duration_us;
            let periodic = slot.unit.interval() > 0;

            self.account(duration_us);

            if periodic {
                self.insert(index);
            }
        }
    }

    /// [`Scheduler::tick`] at the clock's current time
    pub fn tick_now(&mut self) {
        let now = self.clock.now_ms();
        self.tick(now);
    }

    /// CPU load over the last window, in percent
    ///
    /// Only [`Scheduler::tick`] ages the window; an idle scheduler keeps
    /// reporting the load of the last window it executed work in.
    pub fn load(&self) -> u8 {
        let busy_us: u64 = self.load_slots.iter().sum();
        let percent = busy_us * 100 / (LOAD_WINDOW_MS * 1000);
        percent.min(100) as u8
    }

    /// Number of queued units
    ///
    /// Walks the queue; only meaningful from the tick context.
    pub fn task_count(&self) -> usize {
        self.queued().count()
    }

    fn catch_up(now: Millis, unit: &mut Unit<'a>) {
        if unit.is_unplanned() {
            unit.set_exec_at(now + unit.interval());
        } else if unit.exec_at() < now {
            debug!("unit planned at {} is late, next run at {}", unit.exec_at(), now + unit.interval());
            unit.set_exec_at(now + unit.interval());
        }
    }

    fn id(&self, index: usize) -> UnitId {
        UnitId {
            index,
            generation: self.generations[index],
        }
    }

    fn bump_generation(&mut self, index: usize) {
        self.generations[index] = self.generations[index].wrapping_add(1);
    }

    /// An empty slot, else the slot of a parked unit
    fn free_slot(&self) -> Option<usize> {
        let parked = |one_shot: bool| {
            self.slots.iter().position(|slot| {
                slot.as_ref()
                    .is_some_and(|slot| !slot.queued && (slot.unit.interval() == 0) == one_shot)
            })
        };
        self.slots
            .iter()
            .position(Option::is_none)
            .or_else(|| parked(true))
            .or_else(|| parked(false))
    }

    fn slot(&self, id: UnitId) -> Option<&Slot<'a>> {
        let current = *self.generations.get(id.index)? == id.generation;
        self.slots[id.index].as_ref().filter(|_| current)
    }

    fn slot_mut(&mut self, id: UnitId) -> &mut Slot<'a> {
        let stale = self
            .generations
            .get(id.index)
            .is_some_and(|&generation| generation != id.generation);
        match self.slots.get_mut(id.index).and_then(Option::as_mut) {
            Some(_) if stale => panic!("unit {} is stale, its slot was reused", id.index),
            Some(slot) => slot,
            None => panic!("unit {} is not registered", id.index),
        }
    }

    fn exec_at(&self, index: usize) -> Millis {
        self.slots[index]
            .as_ref()
            .map_or(Millis::MAX, |slot| slot.unit.exec_at())
    }

    fn set_queued(&mut self, index: usize, queued: bool) {
        if let Some(slot) = self.slots[index].as_mut() {
            slot.queued = queued;
        }
    }

    /// Insert after every queued unit that is not later than this one
    fn insert(&mut self, index: usize) {
        let exec_at = self.exec_at(index);
        let head = self.head;

        match head {
            Some(head) if exec_at >= self.exec_at(head) => {
                let mut cursor = head;
                while let Some(next) = self.next[cursor] {
                    if exec_at < self.exec_at(next) {
                        break;
                    }
                    cursor = next;
                }
                self.next[index] = self.next[cursor];
                self.next[cursor] = Some(index);
            }
            head => {
                self.next[index] = head;
                self.head = Some(index);
            }
        }

        self.set_queued(index, true);
    }

    fn pop(&mut self, now: Millis) -> Option<usize> {
        let head = self.head?;
        if self.exec_at(head) > now {
            return None;
        }
        self.head = self.next[head].take();
        self.set_queued(head, false);
        Some(head)
    }

    fn unlink(&mut self, index: usize) {
        if self.head == Some(index) {
            self.head = self.next[index].take();
        } else {
            let mut cursor = self.head;
            while let Some(current) = cursor {
                if self.next[current] == Some(index) {
                    self.next[current] = self.next[index].take();
                    break;
                }
                cursor = self.next[current];
            }
        }
        self.set_queued(index, false);
    }

    fn account(&mut self, duration_us: u64) {
        let slot = ((self.clock.now_ms() % LOAD_WINDOW_MS) / LOAD_SLOT_MS) as usize;

        if slot == self.last_load_slot {
            self.load_slots[slot] += duration_us;
            return;
        }

        let mut stale = (self.last_load_slot + 1) % LOAD_SLOTS;
        while stale != slot {
            self.load_slots[stale] = 0;
            stale = (stale + 1) % LOAD_SLOTS;
        }
        self.load_slots[slot] = duration_us;
        self.last_load_slot = slot;
    }
}
