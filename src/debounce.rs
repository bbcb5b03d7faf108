use std::time::{Duration, Instant};

/// Quiet period before a layout pass runs.
pub const RECOMPUTE_DELAY: Duration = Duration::from_millis(300);

/// Single-slot pending-work queue with a trailing-edge delay.
///
/// Each `schedule` replaces whatever was pending and restarts the delay, so
/// only the last request of a burst ever fires. Time is passed in by the
/// caller; nothing here sleeps or spawns.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Queue `work`, superseding any pending request. Returns true when an
    /// earlier request was cancelled.
    pub fn schedule(&mut self, now: Instant, work: T) -> bool {
        self.pending.replace((now + self.delay, work)).is_some()
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, work)| work)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(at, _)| *at)
    }

    /// Hand out the pending work once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((at, _)) if *at <= now => self.pending.take().map(|(_, work)| work),
            _ => None,
        }
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(RECOMPUTE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn fires_after_delay() {
        let t0 = Instant::now();
        let mut d = Debouncer::default();
        d.schedule(t0, 1);
        assert_eq!(d.poll(t0 + ms(299)), None);
        assert_eq!(d.poll(t0 + ms(300)), Some(1));
        assert_eq!(d.poll(t0 + ms(900)), None);
    }

    #[test]
    fn burst_keeps_only_the_last_request() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(300));
        assert!(!d.schedule(t0, "a"));
        assert!(d.schedule(t0 + ms(100), "b"));
        assert!(d.schedule(t0 + ms(250), "c"));
        // the first deadline has passed but was superseded
        assert_eq!(d.poll(t0 + ms(400)), None);
        assert_eq!(d.deadline(), Some(t0 + ms(550)));
        assert_eq!(d.poll(t0 + ms(550)), Some("c"));
        assert!(!d.is_pending());
    }

    #[test]
    fn cancel_drops_pending_work() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(10));
        d.schedule(t0, ());
        assert_eq!(d.cancel(), Some(()));
        assert_eq!(d.poll(t0 + ms(20)), None);
    }
}
