//! Clock abstraction so time-based rolling and age retention can be tested

use chrono::{DateTime, Utc};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_recent() {
        let now = SystemClock.now();
        // 2020-01-01
        assert!(now.timestamp() > 1_577_836_800);
    }

    #[test]
    fn test_clock_trait_object() {
        let clock: Box<dyn Clock> = Box::new(SystemClock);
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
