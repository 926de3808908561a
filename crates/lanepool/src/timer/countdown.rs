use crossbeam_channel::{Select, SendError, SendTimeoutError, Sender, TrySendError};
use std::time::{Duration, Instant};

/// A reusable countdown timer.
///
/// A timer is a deadline plus at most one pending firing. It allocates
/// nothing, so re-arming a parked timer with [`Timer::reset`] costs a clock
/// read. Expiry is observed rather than pushed: a firing becomes pending the
/// first time the timer is inspected ([`Timer::stop`], [`Timer::poll`],
/// [`Timer::wait`]) at or after its deadline, and stays pending until it is
/// consumed. [`Timer::send_before`] races a channel send against the deadline
/// and consumes the firing itself when the deadline wins.
///
/// A timer is meant to be parked in a [`TimerPool`](crate::TimerPool) between
/// uses. Before parking, the owner must [`Timer::stop`] it and, if it had
/// already fired, [`Timer::drain`] the pending firing so the next borrower
/// cannot observe it. `reset` does not clear a pending firing.
///
/// The default timer is disarmed with nothing pending.
#[derive(Debug, Default)]
pub struct Timer {
    deadline: Option<Instant>,
    pending: Option<Instant>,
}

impl Timer {
    /// Creates a timer armed to fire after `duration`.
    pub fn new(duration: Duration) -> Self {
        Self {
            deadline: Some(deadline_after(duration)),
            pending: None,
        }
    }

    /// Re-arms the timer to fire after `duration`, discarding any previous
    /// countdown. A firing that is already pending is kept.
    pub fn reset(&mut self, duration: Duration) {
        self.deadline = Some(deadline_after(duration));
    }

    /// Disarms the timer.
    ///
    /// Returns `true` if this call stopped a countdown that had not fired yet.
    /// Returns `false` if the timer had already fired or was already stopped;
    /// in the fired case a firing may still be pending for [`Timer::drain`].
    pub fn stop(&mut self) -> bool {
        self.expire(Instant::now());
        self.deadline.take().is_some()
    }

    /// Consumes a pending firing without blocking and without checking the
    /// clock.
    ///
    /// Returns the deadline that fired, or `None` if nothing was pending.
    pub fn drain(&mut self) -> Option<Instant> {
        self.pending.take()
    }

    /// Consumes the firing if the timer has fired, without blocking.
    pub fn poll(&mut self) -> Option<Instant> {
        self.expire(Instant::now());
        self.pending.take()
    }

    /// Blocks until the armed deadline passes, then consumes the firing.
    ///
    /// Returns immediately with whatever is pending if the timer is disarmed.
    pub fn wait(&mut self) -> Option<Instant> {
        if let Some(deadline) = self.deadline {
            let left = deadline.saturating_duration_since(Instant::now());
            if !left.is_zero() {
                std::thread::sleep(left);
            }
        }
        self.poll()
    }

    /// Sends `msg` on `tx`, waiting at most until the deadline for room.
    ///
    /// If the deadline passes first the firing is consumed here and the
    /// message is handed back in [`SendTimeoutError::Timeout`]. A disarmed
    /// timer counts as already expired, so only an immediate send can win.
    ///
    /// # Errors
    ///
    /// - [`SendTimeoutError::Timeout`] if the deadline passed first.
    /// - [`SendTimeoutError::Disconnected`] if every receiver is gone.
    pub fn send_before<T>(&mut self, tx: &Sender<T>, msg: T) -> Result<(), SendTimeoutError<T>> {
        let Some(deadline) = self.deadline else {
            return tx.try_send(msg).map_err(|e| match e {
                TrySendError::Full(msg) => SendTimeoutError::Timeout(msg),
                TrySendError::Disconnected(msg) => SendTimeoutError::Disconnected(msg),
            });
        };

        let mut sel = Select::new();
        sel.send(tx);
        match sel.select_deadline(deadline) {
            Ok(op) => op
                .send(tx, msg)
                .map_err(|SendError(msg)| SendTimeoutError::Disconnected(msg)),
            Err(_) => {
                self.deadline = None;
                Err(SendTimeoutError::Timeout(msg))
            }
        }
    }

    /// The instant the timer is armed for, if it is armed.
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` if a firing is waiting to be consumed.
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    // Turns an elapsed deadline into a pending firing.
    fn expire(&mut self, now: Instant) {
        if let Some(deadline) = self.deadline {
            if deadline <= now {
                self.deadline = None;
                self.pending = Some(deadline);
            }
        }
    }
}

// `Instant + Duration` panics on overflow; an unrepresentable deadline is
// treated as "far enough away".
fn deadline_after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365 * 30))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_fires_after_duration() {
        let mut timer = Timer::new(Duration::from_millis(10));
        let started = Instant::now();
        let fired_at = timer.wait().expect("timer fires");
        assert!(fired_at >= started);
        assert!(started.elapsed() >= Duration::from_millis(10));
        assert!(timer.deadline().is_none());
        assert!(timer.wait().is_none());
    }

    #[test]
    fn stop_before_firing_disarms() {
        let mut timer = Timer::new(Duration::from_secs(5));
        assert!(timer.stop());
        assert!(timer.deadline().is_none());
        assert!(timer.poll().is_none());
        // A second stop has nothing left to stop.
        assert!(!timer.stop());
    }

    #[test]
    fn stop_after_firing_reports_false_and_drain_consumes() {
        let mut timer = Timer::new(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));

        assert!(!timer.stop());
        assert!(timer.is_pending());
        assert!(timer.drain().is_some());
        assert!(timer.drain().is_none());
        assert!(timer.poll().is_none());
    }

    #[test]
    fn reset_keeps_an_unconsumed_firing() {
        let mut timer = Timer::new(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        assert!(!timer.stop());

        timer.reset(Duration::from_secs(5));
        assert!(timer.poll().is_some());
        assert!(timer.poll().is_none());
        assert!(timer.deadline().is_some());
    }

    #[test]
    fn send_before_wins_when_there_is_room() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut timer = Timer::new(Duration::from_secs(5));
        timer.send_before(&tx, 7).unwrap();
        assert_eq!(rx.try_recv(), Ok(7));
        // Still armed; the send won the race.
        assert!(timer.stop());
    }

    #[test]
    fn send_before_consumes_the_firing_on_timeout() {
        let (tx, _rx) = crossbeam_channel::bounded(0);
        let mut timer = Timer::new(Duration::from_millis(20));
        let started = Instant::now();

        assert_eq!(
            timer.send_before(&tx, 1),
            Err(SendTimeoutError::Timeout(1))
        );
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(!timer.stop());
        assert!(timer.drain().is_none());
    }

    #[test]
    fn send_before_completes_once_room_frees_up() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        tx.send(0).unwrap();
        let mut timer = Timer::new(Duration::from_secs(5));

        std::thread::scope(|s| {
            s.spawn(|| {
                std::thread::sleep(Duration::from_millis(20));
                assert_eq!(rx.recv(), Ok(0));
            });
            timer.send_before(&tx, 1).unwrap();
        });
        assert_eq!(rx.try_recv(), Ok(1));
    }

    #[test]
    fn disarmed_send_before_only_tries_once() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut timer = Timer::default();
        timer.send_before(&tx, 1).unwrap();
        assert_eq!(timer.send_before(&tx, 2), Err(SendTimeoutError::Timeout(2)));
        drop(rx);
        assert_eq!(
            timer.send_before(&tx, 3),
            Err(SendTimeoutError::Disconnected(3))
        );
    }

    #[test]
    fn huge_durations_do_not_overflow() {
        let mut timer = Timer::new(Duration::MAX);
        assert!(timer.deadline().is_some());
        assert!(timer.poll().is_none());
    }
}
