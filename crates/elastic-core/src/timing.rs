//! Rate limiting and interpolation helpers
//!
//! `throttle` and `debounce` run on a [`Scheduler`]'s clock and timers so the
//! same code behaves identically in the browser and in the headless host.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::host::{Scheduler, TimerId};
use crate::Result;

/// Default rate-limit window (~60fps)
pub const FRAME_WINDOW: Duration = Duration::from_millis(16);

/// Calculate animation progress (0.0 to 1.0) from elapsed time and duration
#[inline]
pub fn progress(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    let ratio = elapsed.as_secs_f64() / duration.as_secs_f64();
    ratio.clamp(0.0, 1.0)
}

/// Linear interpolation between two values
#[inline]
pub fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

/// Leading-edge rate gate
///
/// Allows a call when at least `delay` has passed since the last allowed call.
/// The first call is always allowed.
#[derive(Debug, Clone)]
pub struct Throttle {
    delay: Duration,
    last_exec: Option<Duration>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_exec: None,
        }
    }

    /// Check the gate at time `now`, recording the call if it passes
    pub fn ready(&mut self, now: Duration) -> bool {
        let pass = match self.last_exec {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.delay,
        };
        if pass {
            self.last_exec = Some(now);
        }
        pass
    }
}

/// Wrap `f` so calls arriving within `delay` of the last executed call are dropped
///
/// Dropped calls return `None`. Once the scheduler is gone every call is dropped.
pub fn throttle<S, A, R>(
    scheduler: &Rc<S>,
    delay: Duration,
    mut f: impl FnMut(A) -> R,
) -> impl FnMut(A) -> Option<R>
where
    S: Scheduler + ?Sized,
{
    let scheduler: Weak<S> = Rc::downgrade(scheduler);
    let mut gate = Throttle::new(delay);
    move |arg| {
        let now = scheduler.upgrade()?.now();
        if gate.ready(now) {
            Some(f(arg))
        } else {
            None
        }
    }
}

/// Trailing-edge debounced callback; see [`debounce`]
pub struct Debounced<S: Scheduler + ?Sized, A> {
    scheduler: Weak<S>,
    delay: Duration,
    pending: Rc<Cell<Option<TimerId>>>,
    f: Rc<RefCell<dyn FnMut(A)>>,
}

/// Defer `f` until `delay` has elapsed without another call
///
/// Every call restarts the timer; the most recent argument wins.
pub fn debounce<S, A>(scheduler: &Rc<S>, delay: Duration, f: impl FnMut(A) + 'static) -> Debounced<S, A>
where
    S: Scheduler + ?Sized,
    A: 'static,
{
    Debounced {
        scheduler: Rc::downgrade(scheduler),
        delay,
        pending: Rc::new(Cell::new(None)),
        f: Rc::new(RefCell::new(f)),
    }
}

impl<S, A> Debounced<S, A>
where
    S: Scheduler + ?Sized,
    A: 'static,
{
    pub fn call(&self, arg: A) -> Result<()> {
        let Some(scheduler) = self.scheduler.upgrade() else {
            return Ok(());
        };
        if let Some(id) = self.pending.take() {
            scheduler.clear_timeout(id);
        }

        let pending = Rc::clone(&self.pending);
        let f = Rc::clone(&self.f);
        let id = scheduler.set_timeout(
            self.delay,
            Box::new(move || {
                pending.set(None);
                (&mut *f.borrow_mut())(arg);
            }),
        )?;
        self.pending.set(Some(id));
        Ok(())
    }

    /// Drop the pending invocation, if any
    pub fn cancel(&self) {
        if let Some(id) = self.pending.take() {
            if let Some(scheduler) = self.scheduler.upgrade() {
                scheduler.clear_timeout(id);
            }
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        let id = self.pending.get();
        id.is_some()
    }
}
