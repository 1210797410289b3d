//! Timer multiplexer: many logical timers sharing one driver thread.
//!
//! ## Algorithm
//!
//! Registrations are grouped into **buckets** keyed by absolute due time
//! (milliseconds since the multiplexer's epoch):
//!
//! ```text
//! BTreeMap<u64, Vec<Registration>>
//!          │            │
//!          │            └─ insertion order within a bucket
//!          └─ due times, ascending
//! ```
//!
//! A single driver thread plays the role of the underlying system timer: it
//! sleeps on a condition variable until the earliest bucket's due time, or
//! indefinitely when no bucket exists.  `start`/`change` wake it whenever an
//! insertion becomes the new earliest deadline, and `stop` wakes it when the
//! earliest bucket empties, so the wait is always re-armed for the earliest
//! remaining due time.
//!
//! ### Tick
//!
//! When the earliest due time passes, the driver pops **that bucket only**
//! (later overdue buckets get their own tick), releases the lock, and invokes
//! each callback in insertion order.  Each invocation is isolated with
//! `catch_unwind`: a panicking callback is logged and cannot prevent sibling
//! callbacks from running or leave the driver disarmed.  Recurring
//! registrations are then reinserted at `now + interval`, where `now` is
//! taken **after** the callbacks returned.  A slow consumer therefore delays
//! the next firing instead of producing a burst of back-to-back ticks, at the
//! cost of letting recurring timers drift under load.
//!
//! ### Cancellation
//!
//! `stop` is best-effort.  The bucket map is the source of truth: a
//! registration found there is removed and will never fire.  A registration
//! already dequeued for the current tick cannot have that firing suppressed,
//! but its id lands in a tombstone set checked at reinsertion time, so a
//! stopped recurring timer is never rearmed.  Unknown ids are a benign no-op
//! (`false`), because cancellation inherently races against firing.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use ahash::AHashSet;
use log::{debug, error, trace};
use parking_lot::{Condvar, Mutex, MutexGuard};

/// Handle to a live timer registration.
///
/// Ids are issued monotonically and never reused for the lifetime of the
/// multiplexer, so a stale handle can at worst name a registration that no
/// longer exists (a benign no-op for [`TimerMux::stop`] and
/// [`TimerMux::change`]), never a different caller's timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

type Callback = Box<dyn Fn() + Send>;

struct Registration {
    id: TimerId,
    callback: Callback,
    /// Recurring period.  `None` = one-shot.
    interval: Option<Duration>,
}

#[derive(Default)]
struct MuxState {
    /// Due time (ms since epoch) → registrations due at that time.
    buckets: BTreeMap<u64, Vec<Registration>>,
    /// Registrations with no due time at all (`start(_, None, None)`).
    /// They never fire until `change` gives them a deadline.
    parked: Vec<Registration>,
    /// Ids dequeued for the tick currently executing.
    in_flight: AHashSet<TimerId>,
    /// In-flight ids stopped during their own tick; skipped at reinsertion.
    tombstones: AHashSet<TimerId>,
    shutdown: bool,
}

impl MuxState {
    fn earliest(&self) -> Option<u64> {
        self.buckets.keys().next().copied()
    }

    fn insert(&mut self, due: u64, reg: Registration) {
        self.buckets.entry(due).or_default().push(reg);
    }

    /// Removes `id` from its bucket or the parked list.
    ///
    /// Returns the registration and whether the removal emptied the earliest
    /// bucket (the driver's wait deadline no longer exists in that case).
    fn take(&mut self, id: TimerId) -> Option<(Registration, bool)> {
        let earliest = self.earliest();
        let mut hit = None;
        for (&due, regs) in self.buckets.iter() {
            if let Some(i) = regs.iter().position(|r| r.id == id) {
                hit = Some((due, i));
                break;
            }
        }
        if let Some((due, i)) = hit {
            let regs = self.buckets.get_mut(&due)?;
            let reg = regs.remove(i);
            let emptied = regs.is_empty();
            if emptied {
                self.buckets.remove(&due);
            }
            return Some((reg, emptied && earliest == Some(due)));
        }
        let i = self.parked.iter().position(|r| r.id == id)?;
        Some((self.parked.remove(i), false))
    }
}

struct Inner {
    state: Mutex<MuxState>,
    /// Signalled whenever the earliest deadline may have moved, and on
    /// shutdown.
    rearm: Condvar,
    epoch: Instant,
    next_id: AtomicU64,
}

impl Inner {
    #[inline]
    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

#[inline]
fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

/// A timer multiplexer.
///
/// An arbitrary number of one-shot and recurring timers share one background
/// driver thread.  Registering, stopping, and changing timers are
/// constant-ish-time operations that never block beyond a short lock hold;
/// callbacks run on the driver thread with no lock held, so they may freely
/// call back into the multiplexer.
///
/// The driver thread is owned by this value: it is spawned by
/// [`TimerMux::new`] and joined when the multiplexer is dropped.
///
/// # Example
/// ```
/// use lungo::TimerMux;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let mux = TimerMux::new();
/// let fired = Arc::new(AtomicUsize::new(0));
/// let fired2 = Arc::clone(&fired);
///
/// let id = mux.start(
///     move || { fired2.fetch_add(1, Ordering::SeqCst); },
///     Some(Duration::from_millis(10)),
///     None, // one-shot
/// );
///
/// std::thread::sleep(Duration::from_millis(100));
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// assert!(!mux.stop(id), "already fired");
/// ```
pub struct TimerMux {
    inner: Arc<Inner>,
    driver: Option<JoinHandle<()>>,
}

impl TimerMux {
    /// Creates a multiplexer and spawns its driver thread.
    pub fn new() -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(MuxState::default()),
            rearm: Condvar::new(),
            epoch: Instant::now(),
            next_id: AtomicU64::new(0),
        });
        let driver = {
            let inner = Arc::clone(&inner);
            std::thread::Builder::new()
                .name("lungo-timer".into())
                .spawn(move || drive(inner))
                .expect("failed to spawn timer driver thread")
        };
        debug!("timer driver started");
        TimerMux {
            inner,
            driver: Some(driver),
        }
    }

    /// Registers a timer and returns its handle immediately.
    ///
    /// The first firing is due after `timeout`; with `timeout = None` it
    /// falls back to `interval`.  `interval = None` makes the timer one-shot.
    /// If both are `None` the registration is parked and will not fire until
    /// [`change`](TimerMux::change) gives it a due time.
    ///
    /// The callback runs on the driver thread, outside all internal locks.
    pub fn start<F>(&self, callback: F, timeout: Option<Duration>, interval: Option<Duration>) -> TimerId
    where
        F: Fn() + Send + 'static,
    {
        let id = TimerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let reg = Registration {
            id,
            callback: Box::new(callback),
            interval,
        };
        let mut state = self.inner.state.lock();
        match timeout.or(interval) {
            Some(due_in) => {
                let due = self.inner.now_millis() + millis(due_in);
                let earliest = state.earliest();
                state.insert(due, reg);
                if earliest.map_or(true, |e| due < e) {
                    // This insertion became the earliest deadline; re-arm the
                    // driver's wait.
                    self.inner.rearm.notify_one();
                }
                trace!("timer {id:?} armed in {due_in:?} (interval {interval:?})");
            }
            None => {
                state.parked.push(reg);
                trace!("timer {id:?} parked");
            }
        }
        id
    }

    /// Cancels a registration.
    ///
    /// Returns `false` if the id is unknown (already fired, already stopped,
    /// or never existed); that is not an error, because cancellation always
    /// races against firing.  A registration dequeued for the tick currently
    /// executing cannot have that firing suppressed, but it will not be
    /// rearmed afterwards (`true` is returned in that case).
    pub fn stop(&self, id: TimerId) -> bool {
        let mut state = self.inner.state.lock();
        if let Some((_, emptied_earliest)) = state.take(id) {
            if emptied_earliest {
                self.inner.rearm.notify_one();
            }
            trace!("timer {id:?} stopped");
            return true;
        }
        if state.in_flight.contains(&id) {
            state.tombstones.insert(id);
            trace!("timer {id:?} stopped mid-flight");
            return true;
        }
        false
    }

    /// Re-schedules a live registration, preserving its id and callback.
    ///
    /// Equivalent to a `stop` followed by re-insertion with the new timing.
    /// Returns `false` for unknown ids, including ids dequeued for the tick
    /// currently executing ([`stop`](TimerMux::stop) is the only primitive
    /// that reaches those).
    pub fn change(&self, id: TimerId, timeout: Option<Duration>, interval: Option<Duration>) -> bool {
        let mut state = self.inner.state.lock();
        let Some((mut reg, emptied_earliest)) = state.take(id) else {
            return false;
        };
        reg.interval = interval;
        match timeout.or(interval) {
            Some(due_in) => {
                let due = self.inner.now_millis() + millis(due_in);
                let earliest = state.earliest();
                state.insert(due, reg);
                if emptied_earliest || earliest.map_or(true, |e| due < e) {
                    self.inner.rearm.notify_one();
                }
                trace!("timer {id:?} changed to fire in {due_in:?} (interval {interval:?})");
            }
            None => {
                state.parked.push(reg);
                if emptied_earliest {
                    self.inner.rearm.notify_one();
                }
                trace!("timer {id:?} changed to parked");
            }
        }
        true
    }

    /// Number of live registrations, parked ones included.
    pub fn len(&self) -> usize {
        let state = self.inner.state.lock();
        state.buckets.values().map(Vec::len).sum::<usize>() + state.parked.len()
    }

    /// Returns `true` when no registrations are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TimerMux {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerMux {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
            self.inner.rearm.notify_one();
        }
        if let Some(driver) = self.driver.take() {
            let _ = driver.join();
        }
        debug!("timer driver shut down");
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

fn drive(inner: Arc<Inner>) {
    let mut state = inner.state.lock();
    loop {
        if state.shutdown {
            break;
        }
        let now = inner.now_millis();
        match state.earliest() {
            None => {
                // Nothing scheduled: disarm until a registration arrives.
                inner.rearm.wait(&mut state);
            }
            Some(due) if due > now => {
                // Armed for the earliest due time.  A rearm notification
                // wakes us early; the loop recomputes either way.
                inner.rearm.wait_for(&mut state, Duration::from_millis(due - now));
            }
            Some(due) => {
                // `due <= now` covers overdue deadlines too (e.g. a `change`
                // to a zero timeout while a tick was busy): the wait already
                // clamped to zero by falling through to an immediate tick.
                tick(&inner, &mut state, due);
            }
        }
    }
}

/// Fires every registration in the bucket for `due`, then rearms recurring
/// ones.  Runs on the driver thread with `state` held; the lock is released
/// for the duration of the callbacks.
fn tick(inner: &Inner, state: &mut MutexGuard<'_, MuxState>, due: u64) {
    let Some(regs) = state.buckets.remove(&due) else {
        return;
    };
    for reg in &regs {
        state.in_flight.insert(reg.id);
    }
    trace!("tick: firing {} registration(s)", regs.len());

    MutexGuard::unlocked(state, || {
        for reg in &regs {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| (reg.callback)())) {
                error!("timer {:?} callback panicked: {}", reg.id, panic_message(&*panic));
            }
        }
    });

    // Rearm from tick completion, not the original due time.
    let now = inner.now_millis();
    for reg in regs {
        if state.tombstones.contains(&reg.id) {
            trace!("timer {:?} dropped after mid-flight stop", reg.id);
            continue;
        }
        if let Some(interval) = reg.interval {
            // A sub-millisecond interval would reinsert into the bucket
            // being processed and spin the driver; hold it to the clock
            // resolution.
            state.insert(now + millis(interval).max(1), reg);
        }
    }
    state.in_flight.clear();
    state.tombstones.clear();
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
