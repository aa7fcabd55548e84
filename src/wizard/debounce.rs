use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

/// A single cancellable scheduled validation pass.
///
/// Scheduling again replaces the pending deadline, so a burst of field
/// changes results in one pass once the burst has been quiet for `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<DateTime<Utc>>,
    generation: u64,
}

impl Debouncer {
    pub fn new(delay: StdDuration) -> Self {
        let millis = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        Self {
            delay: Duration::milliseconds(millis),
            deadline: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancels any pending pass and schedules a new one `delay` after `now`.
    pub fn schedule(&mut self, now: DateTime<Utc>) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.deadline = Some(
            now.checked_add_signed(self.delay)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
        self.generation
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Generation of the most recent schedule.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Consumes the pending pass if its deadline has been reached.
    pub fn fire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    #[test]
    fn fires_only_after_quiet_period() {
        let mut debouncer = Debouncer::new(StdDuration::from_millis(500));
        debouncer.schedule(start());
        assert!(!debouncer.fire_if_due(start() + Duration::milliseconds(499)));
        assert!(debouncer.fire_if_due(start() + Duration::milliseconds(500)));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn rescheduling_pushes_deadline_back() {
        let mut debouncer = Debouncer::new(StdDuration::from_millis(300));
        let first = debouncer.schedule(start());
        let second = debouncer.schedule(start() + Duration::milliseconds(200));
        assert_ne!(first, second);
        assert!(!debouncer.fire_if_due(start() + Duration::milliseconds(300)));
        assert!(debouncer.fire_if_due(start() + Duration::milliseconds(500)));
    }

    #[test]
    fn zero_delay_fires_immediately() {
        let mut debouncer = Debouncer::new(StdDuration::ZERO);
        debouncer.schedule(start());
        assert!(debouncer.fire_if_due(start()));
    }

    #[test]
    fn huge_delay_saturates_instead_of_overflowing() {
        let mut debouncer = Debouncer::new(StdDuration::MAX);
        debouncer.schedule(Utc::now());
        assert_eq!(debouncer.deadline(), Some(DateTime::<Utc>::MAX_UTC));
        assert!(!debouncer.fire_if_due(Utc::now()));
    }

    #[test]
    fn cancelled_pass_never_fires() {
        let mut debouncer = Debouncer::new(StdDuration::from_millis(10));
        debouncer.schedule(start());
        debouncer.cancel();
        assert!(!debouncer.fire_if_due(start() + Duration::seconds(1)));
    }
}
