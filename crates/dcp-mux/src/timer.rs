//! Ordered timer queue
//!
//! Entries live in an arena keyed by [`TimerHandle`] and are indexed by
//! `(expiry, sequence)` while linked. The sequence number makes entries
//! with equal expiries fire in the order they were linked. An entry can
//! be detached (still allocated, not scheduled) and linked again later,
//! which lets an owner keep one handle per object for its whole life.
//!
//! [`TimerQueue::expire`] collects every due entry under the lock and runs
//! the handlers after releasing it, so handlers may freely call back into
//! the queue to reschedule.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

/// Handle to an allocated timer entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct Slot<T> {
    expires: Instant,
    seq: u64,
    linked: bool,
    data: T,
}

#[derive(Debug)]
struct Inner<T> {
    slots: HashMap<TimerHandle, Slot<T>>,
    order: BTreeMap<(Instant, u64), TimerHandle>,
    next_handle: u64,
    next_seq: u64,
}

impl<T> Inner<T> {
    fn link(&mut self, handle: TimerHandle, expires: Instant) -> bool {
        let seq = self.next_seq;
        let Some(slot) = self.slots.get_mut(&handle) else {
            return false;
        };
        if slot.linked {
            self.order.remove(&(slot.expires, slot.seq));
        }
        slot.expires = expires;
        slot.seq = seq;
        slot.linked = true;
        self.order.insert((expires, seq), handle);
        self.next_seq += 1;
        true
    }

    fn unlink(&mut self, handle: TimerHandle) -> bool {
        match self.slots.get_mut(&handle) {
            Some(slot) if slot.linked => {
                self.order.remove(&(slot.expires, slot.seq));
                slot.linked = false;
                true
            }
            _ => false,
        }
    }
}

/// Thread-safe queue of timed entries carrying `T`
#[derive(Debug)]
pub struct TimerQueue<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                order: BTreeMap::new(),
                next_handle: 0,
                next_seq: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().expect("timer queue lock poisoned")
    }

    /// Allocate an entry and schedule it
    pub fn add(&self, expires: Instant, data: T) -> TimerHandle {
        let mut inner = self.lock();
        let handle = Self::allocate(&mut inner, expires, data);
        inner.link(handle, expires);
        handle
    }

    /// Allocate a detached entry; schedule it later with [`insert`](Self::insert)
    pub fn alloc(&self, data: T) -> TimerHandle {
        let mut inner = self.lock();
        Self::allocate(&mut inner, Instant::now(), data)
    }

    fn allocate(inner: &mut Inner<T>, expires: Instant, data: T) -> TimerHandle {
        let handle = TimerHandle(inner.next_handle);
        inner.next_handle += 1;
        inner.slots.insert(
            handle,
            Slot {
                expires,
                seq: 0,
                linked: false,
                data,
            },
        );
        handle
    }

    /// Schedule a detached entry
    ///
    /// Returns false if the handle is unknown or already scheduled.
    pub fn insert(&self, handle: TimerHandle, expires: Instant) -> bool {
        let mut inner = self.lock();
        let detached = inner.slots.get(&handle).is_some_and(|slot| !slot.linked);
        detached && inner.link(handle, expires)
    }

    /// Schedule a detached entry behind every entry with the same expiry
    ///
    /// Ties are always broken by link order, so this is [`insert`](Self::insert)
    /// under the name callers use for periodic re-arming.
    pub fn append(&self, handle: TimerHandle, expires: Instant) -> bool {
        self.insert(handle, expires)
    }

    /// Detach an entry without freeing it
    pub fn unlink(&self, handle: TimerHandle) -> bool {
        self.lock().unlink(handle)
    }

    /// Unschedule and free an entry, returning its data
    pub fn cancel(&self, handle: TimerHandle) -> Option<T> {
        let mut inner = self.lock();
        inner.unlink(handle);
        inner.slots.remove(&handle).map(|slot| slot.data)
    }

    /// Move an entry to a new expiry, scheduling it if detached
    pub fn change(&self, handle: TimerHandle, expires: Instant) -> bool {
        self.lock().link(handle, expires)
    }

    /// Whether an entry's expiry has passed; `None` for unknown handles
    pub fn is_expired(&self, handle: TimerHandle) -> Option<bool> {
        let now = Instant::now();
        self.lock()
            .slots
            .get(&handle)
            .map(|slot| slot.expires <= now)
    }

    /// Whether an entry is currently scheduled
    pub fn is_linked(&self, handle: TimerHandle) -> bool {
        self.lock()
            .slots
            .get(&handle)
            .is_some_and(|slot| slot.linked)
    }

    /// Number of scheduled entries
    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    /// Whether no entry is scheduled
    pub fn is_empty(&self) -> bool {
        self.lock().order.is_empty()
    }

    /// Earliest scheduled expiry
    pub fn next_expiry(&self) -> Option<Instant> {
        self.lock().order.keys().next().map(|(expires, _)| *expires)
    }

    /// Time from `now` until the earliest expiry, zero if nothing is scheduled
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_expiry()
            .map(|expires| expires.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }
}

impl<T: Clone> TimerQueue<T> {
    /// Fire every entry due at `now`
    ///
    /// Due entries are detached (not freed) and handed to `handler` in
    /// expiry order once the lock is released. A handler re-arms an entry
    /// with [`insert`](Self::insert) or frees it with [`cancel`](Self::cancel).
    ///
    /// Returns the time until the next scheduled expiry after all handlers
    /// ran, or zero when nothing is left scheduled.
    pub fn expire<F>(&self, now: Instant, mut handler: F) -> Duration
    where
        F: FnMut(TimerHandle, T),
    {
        let due: Vec<(TimerHandle, T)> = {
            let mut inner = self.lock();
            let mut due = Vec::new();
            while let Some(entry) = inner.order.first_entry() {
                if entry.key().0 > now {
                    break;
                }
                let handle = entry.remove();
                if let Some(slot) = inner.slots.get_mut(&handle) {
                    slot.linked = false;
                    due.push((handle, slot.data.clone()));
                }
            }
            due
        };

        for (handle, data) in due {
            handler(handle, data);
        }

        self.remaining(now)
    }
}
