use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::{CallsPerMinute, EvenpaceError};

/// Evenly spaced call-rate throttle.
///
/// Wraps an arbitrary operation and guarantees that no two invocations are
/// *released* less than `60 / rate` seconds apart, across every thread that
/// shares the instance. Callers that arrive early block until their slot
/// opens.
///
/// # Pacing model
///
/// 1. **Spacing floor:** `min_interval = 60 / calls_per_minute`
/// 2. **Admission:** under the lock, compare elapsed time since the last
///    release against the floor and sleep out the remainder
/// 3. **Release:** stamp the post-wait time as the new last release and drop
///    the lock
/// 4. **Delegation:** run the wrapped operation outside the lock and hand
///    its result back verbatim
///
/// The guarantee is on release cadence, not on non-overlap of execution: two
/// delegated calls may run concurrently in real time as long as their
/// release events were spaced. One caller's slow operation delays other
/// callers only by the fixed spacing interval, never by its own duration.
///
/// # Thread safety
///
/// Share one instance behind [`Arc`]; all bookkeeping sits in a single mutex
/// around the last release timestamp. The mutex is held only across the
/// read-compare-sleep-update step.
///
/// # Semantics & limitations
///
/// **No burst credit:**
/// - Only the most recent release time is remembered
/// - The first call after any idle period is released immediately
/// - Spacing then resumes strictly relative to that release
///
/// **Consumed slots are not refunded:**
/// - A delegated call that returns an error still occupied its slot
/// - Retry policy belongs to the caller, never the throttle
///
/// **Blocked callers cannot bail out:**
/// - The wait is a plain blocking sleep with no cancellation or timeout
/// - It costs no CPU but does occupy the calling thread for its duration
///
/// **No fairness guarantee:**
/// - When several callers are blocked, the next released is whichever
///   acquires the mutex
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::thread;
///
/// use evenpace::{CallsPerMinute, Throttle};
///
/// let throttle = Arc::new(Throttle::new(CallsPerMinute::try_from(120.0).unwrap()));
///
/// let handles: Vec<_> = (0..4)
///     .map(|i| {
///         let throttle = Arc::clone(&throttle);
///         // Releases are at least 500ms apart regardless of which thread
///         // wins each slot.
///         thread::spawn(move || throttle.guarded_call(|| i * 10))
///     })
///     .collect();
///
/// for handle in handles {
///     let _ = handle.join().unwrap();
/// }
/// ```
pub struct Throttle {
    min_interval: Duration,
    last_release: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Create a throttle enforcing `rate` across all callers that share it.
    ///
    /// The spacing floor is computed once here and never changes; a
    /// different rate means a different instance.
    pub fn new(rate: CallsPerMinute) -> Self {
        Self {
            min_interval: rate.min_interval(),
            last_release: Mutex::new(None),
        }
    } // end constructor

    /// Convenience constructor from a raw calls-per-minute value.
    ///
    /// Fails with [`EvenpaceError::InvalidConfiguration`] if `rate` is not a
    /// finite value greater than zero.
    pub fn per_minute(rate: f64) -> Result<Self, EvenpaceError> {
        Ok(Self::new(CallsPerMinute::try_from(rate)?))
    }

    /// The minimum spacing enforced between two consecutive release events.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until the next release slot opens, then run `op` and return its
    /// result verbatim.
    ///
    /// Whatever `op` produces is handed back untouched; an `Err` return
    /// propagates to the caller unchanged and the consumed slot is not
    /// refunded. Arguments are captured by the closure, so any
    /// argument/result shape goes through:
    ///
    /// ```no_run
    /// use evenpace::{CallsPerMinute, Throttle};
    ///
    /// fn add(a: i32, b: i32) -> i32 {
    ///     a + b
    /// }
    ///
    /// let throttle = Throttle::new(CallsPerMinute::try_from(10.0).unwrap());
    /// assert_eq!(throttle.guarded_call(|| add(3, 4)), 7);
    /// ```
    ///
    /// The wait happens while holding the instance lock, so no other caller
    /// can read a stale release timestamp; `op` itself runs after the lock
    /// is dropped.
    pub fn guarded_call<R>(&self, op: impl FnOnce() -> R) -> R {
        self.reserve_slot();
        op()
    } // end method guarded_call

    /// Build a reusable throttled handle around `op`.
    ///
    /// Consumes this `Arc`; clone it first if direct access to the throttle
    /// is still needed. The handle (and any clone of it) paces against this
    /// instance's release schedule. See [`Throttled`].
    pub fn wrap<F>(self: Arc<Self>, op: F) -> Throttled<F> {
        Throttled { throttle: self, op }
    }

    /// Wait out the spacing floor and stamp the release.
    ///
    /// The stamp is taken after the sleep, not before, so the next caller
    /// measures from the actual release moment.
    fn reserve_slot(&self) {
        let mut last_release = self.last_release.lock();

        if let Some(last) = *last_release {
            let remaining = self.min_interval.saturating_sub(last.elapsed());
            if !remaining.is_zero() {
                thread::sleep(remaining);
            }
        }

        *last_release = Some(Instant::now());
    } // end method reserve_slot
} // end of impl

/// An operation wrapped by a [`Throttle`], built once at setup time.
///
/// Every [`call`](Throttled::call) goes through the owning throttle's
/// release schedule. The handle is [`Clone`] when the operation is, so each
/// worker in a pool can hold its own copy while still sharing one schedule.
///
/// ```no_run
/// use std::sync::Arc;
///
/// use evenpace::{CallsPerMinute, Throttle};
///
/// let throttle = Arc::new(Throttle::new(CallsPerMinute::try_from(10.0).unwrap()));
/// let add = throttle.wrap(|(a, b): (i32, i32)| a + b);
///
/// assert_eq!(add.call((3, 4)), 7);
/// ```
pub struct Throttled<F> {
    throttle: Arc<Throttle>,
    op: F,
}

impl<F> Throttled<F> {
    /// Pass `args` through the throttle to the wrapped operation.
    ///
    /// Takes a single argument value; tuple up for more. The result (or
    /// failure) comes back verbatim, exactly as with
    /// [`Throttle::guarded_call`].
    pub fn call<A, R>(&self, args: A) -> R
    where
        F: Fn(A) -> R,
    {
        self.throttle.guarded_call(|| (self.op)(args))
    }

    /// The throttle whose schedule this handle shares.
    pub fn throttle(&self) -> &Arc<Throttle> {
        &self.throttle
    }
}

impl<F: Clone> Clone for Throttled<F> {
    fn clone(&self) -> Self {
        Self {
            throttle: Arc::clone(&self.throttle),
            op: self.op.clone(),
        }
    }
}
