//! Monotone logical clock.
//!
//! No wall-clock dependency: the clock only moves through `tick` (local
//! conflict detected) and `leap` (a finalized timestamp from another
//! partition overtook us).

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotone counter shared by every task of one peer.
///
/// `tick` is the only unconditional increment; `leap` never decreases
/// the value. Safe under concurrent readers. The counter is 64-bit and
/// wraparound is not handled.
#[derive(Debug, Default)]
pub struct LogicalClock {
    value: AtomicU64,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Increment the clock by one.
    pub fn tick(&self) {
        self.value.fetch_add(1, Ordering::SeqCst);
    }

    /// Read the current value.
    pub fn tock(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Advance the clock to `to` if it is ahead of the current value.
    pub fn leap(&self, to: u64) {
        self.value.fetch_max(to, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_increments() {
        let clock = LogicalClock::new();
        assert_eq!(clock.tock(), 0);
        clock.tick();
        clock.tick();
        assert_eq!(clock.tock(), 2);
    }

    #[test]
    fn test_leap_never_decreases() {
        let clock = LogicalClock::new();
        clock.leap(10);
        assert_eq!(clock.tock(), 10);
        clock.leap(3);
        assert_eq!(clock.tock(), 10);
        clock.leap(11);
        assert_eq!(clock.tock(), 11);
    }

    #[test]
    fn test_concurrent_ticks() {
        use std::sync::Arc;

        let clock = Arc::new(LogicalClock::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = clock.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        clock.tick();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(clock.tock(), 8000);
    }
}
