use super::Timer;
use core::mem;
use core::ops::{Deref, DerefMut};
use core::time::Duration;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

/// A thread-safe pool of idle, homogeneous values.
///
/// Values are parked with [`Pool::put`] and handed back out with
/// [`Pool::get`] in LIFO order, which keeps recently used (cache-warm) values
/// in circulation. At most `max_idle` values are retained; extra values passed
/// to `put` are dropped.
///
/// The pool does not reset values. Callers are responsible for returning them
/// in a reusable state.
#[derive(Debug)]
pub struct Pool<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
}

impl<T> Pool<T> {
    /// Number of idle values retained by [`Pool::default`].
    pub const DEFAULT_MAX_IDLE: usize = 1024;

    /// Creates an empty pool retaining at most `max_idle` idle values.
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Takes an idle value, if any.
    pub fn get(&self) -> Option<T> {
        self.idle.lock().pop()
    }

    /// Parks `value` for reuse. Returns `false` (and drops the value) if the
    /// pool is already holding `max_idle` values.
    pub fn put(&self, value: T) -> bool {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(value);
            true
        } else {
            false
        }
    }

    /// Number of values currently parked.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_IDLE)
    }
}

/// A pool of reusable [`Timer`]s.
///
/// Used by [`Dispatcher::serve_with_timeout`](crate::Dispatcher::serve_with_timeout)
/// so that bounded waits under a high submission rate recycle parked timers.
/// Re-arming a parked timer allocates nothing.
///
/// [`TimerPool::release`] guarantees that a parked timer carries no pending
/// firing, so a timer returned by [`TimerPool::acquire`] only ever fires for
/// the countdown it was acquired with.
#[derive(Debug, Default)]
pub struct TimerPool {
    timers: Pool<Timer>,
}

static GLOBAL: OnceLock<Arc<TimerPool>> = OnceLock::new();

impl TimerPool {
    /// Creates a pool retaining at most `max_idle` parked timers.
    pub fn new(max_idle: usize) -> Self {
        Self {
            timers: Pool::new(max_idle),
        }
    }

    /// The process-wide shared pool. It is created on first use and never torn
    /// down.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::default())))
    }

    /// Returns a timer armed to fire after `duration`, recycled when one is
    /// parked.
    pub fn acquire(&self, duration: Duration) -> Timer {
        match self.timers.get() {
            Some(mut timer) => {
                timer.reset(duration);
                timer
            }
            None => Timer::new(duration),
        }
    }

    /// Stops `timer`, drains a firing it may have left pending, and parks it.
    pub fn release(&self, mut timer: Timer) {
        if !timer.stop() {
            timer.drain();
        }
        self.timers.put(timer);
    }

    /// Acquires a timer that is released back to this pool when the guard is
    /// dropped.
    pub fn lease(&self, duration: Duration) -> TimerGuard<'_> {
        TimerGuard {
            pool: self,
            timer: self.acquire(duration),
        }
    }

    /// Number of timers currently parked.
    pub fn idle(&self) -> usize {
        self.timers.idle()
    }
}

/// A [`Timer`] on loan from a [`TimerPool`]. Released on drop.
#[derive(Debug)]
pub struct TimerGuard<'a> {
    pool: &'a TimerPool,
    timer: Timer,
}

impl Deref for TimerGuard<'_> {
    type Target = Timer;

    fn deref(&self) -> &Timer {
        &self.timer
    }
}

impl DerefMut for TimerGuard<'_> {
    fn deref_mut(&mut self) -> &mut Timer {
        &mut self.timer
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.pool.release(mem::take(&mut self.timer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::scope;
    use std::time::Instant;

    #[test]
    fn pool_is_lifo_and_bounded() {
        let pool = Pool::new(2);
        assert!(pool.get().is_none());

        assert!(pool.put(1));
        assert!(pool.put(2));
        assert!(!pool.put(3));
        assert_eq!(pool.idle(), 2);

        assert_eq!(pool.get(), Some(2));
        assert_eq!(pool.get(), Some(1));
        assert_eq!(pool.get(), None);
    }

    #[test]
    fn acquire_reuses_released_timer() {
        let pool = TimerPool::new(4);
        let timer = pool.acquire(Duration::from_secs(1));
        assert_eq!(pool.idle(), 0);

        pool.release(timer);
        assert_eq!(pool.idle(), 1);

        let timer = pool.acquire(Duration::from_secs(1));
        assert_eq!(pool.idle(), 0);
        assert!(timer.deadline().is_some());
    }

    #[test]
    fn reacquired_timer_has_no_stale_firing() {
        let pool = TimerPool::new(1);

        // Expires while checked out and is released without anyone consuming
        // the firing.
        let timer = pool.acquire(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        pool.release(timer);
        assert_eq!(pool.idle(), 1);

        let mut timer = pool.acquire(Duration::from_secs(5));
        assert_eq!(pool.idle(), 0);
        assert!(!timer.is_pending());
        assert!(timer.poll().is_none());
    }

    #[test]
    fn reacquired_timer_fires_for_its_new_countdown() {
        let pool = TimerPool::new(1);
        pool.release(pool.acquire(Duration::from_secs(5)));

        let mut timer = pool.acquire(Duration::from_millis(1));
        let deadline = timer.deadline();
        assert!(deadline.is_some());
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(timer.poll(), deadline);
    }

    #[test]
    fn timed_out_lease_goes_back_clean() {
        let pool = TimerPool::new(1);
        let (tx, _rx) = crossbeam_channel::bounded(0);
        let started = Instant::now();
        {
            let mut lease = pool.lease(Duration::from_millis(10));
            assert!(lease.send_before(&tx, ()).is_err());
        }
        assert!(started.elapsed() >= Duration::from_millis(10));
        assert_eq!(pool.idle(), 1);

        let mut timer = pool.acquire(Duration::from_secs(5));
        assert!(timer.poll().is_none());
        assert!(timer.stop());
    }

    #[test]
    fn lease_returns_timer_on_drop() {
        let pool = TimerPool::new(4);
        {
            let lease = pool.lease(Duration::from_millis(1));
            assert!(lease.deadline().is_some());
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn global_is_shared() {
        let a = TimerPool::global();
        let b = TimerPool::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn concurrent_acquire_release() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 256;

        let pool = TimerPool::new(THREADS);
        scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    for _ in 0..ROUNDS {
                        let mut timer = pool.acquire(Duration::from_secs(1));
                        assert!(timer.poll().is_none());
                        pool.release(timer);
                    }
                });
            }
        });
        assert!(pool.idle() <= THREADS);
    }
}
