//! Lock-free monotonically increasing counter.
//!
//! Used for two things in easytcp:
//!
//! - the `seq` field of every outbound frame (one counter per transport), and
//! - session identifiers handed out by the server (one counter per server,
//!   starting at 1 so that 0 never names a live session).

use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe counter that hands out each value exactly once.
///
/// # Examples
///
/// ```rust
/// use easytcp_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::starting_at(1);
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// assert_eq!(counter.current(), 3);
/// ```
#[derive(Debug)]
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    /// Creates a counter whose first value is 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a counter whose first value is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            inner: AtomicU64::new(first),
        }
    }

    /// Returns the next value and advances the counter.
    ///
    /// Wraps from `u64::MAX` to 0. `Relaxed` is enough: the value is only an
    /// identifier, it does not publish any other memory.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the value the next call to [`next`](Self::next) would hand out.
    pub fn current(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequence_counter_starts_at_zero() {
        let counter = SequenceCounter::new();
        assert_eq!(counter.next(), 0);
    }

    #[test]
    fn test_starting_at_hands_out_first_value() {
        // Arrange
        let counter = SequenceCounter::starting_at(1);

        // Act
        let first = counter.next();
        let second = counter.next();

        // Assert
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_sequence_counter_wraps_at_u64_max() {
        // Arrange – one step before overflow
        let counter = SequenceCounter::starting_at(u64::MAX);

        // Act
        let before_wrap = counter.next();
        let after_wrap = counter.next();

        // Assert
        assert_eq!(before_wrap, u64::MAX);
        assert_eq!(after_wrap, 0, "counter must wrap to 0 after u64::MAX");
    }

    #[test]
    fn test_sequence_counter_values_are_unique_across_threads() {
        // Arrange
        let counter = Arc::new(SequenceCounter::new());
        let thread_count = 8;
        let per_thread = 500;

        // Act
        let handles: Vec<_> = (0..thread_count)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || (0..per_thread).map(|_| c.next()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();

        // Assert
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), thread_count * per_thread);
    }

    #[test]
    fn test_current_does_not_advance() {
        let counter = SequenceCounter::starting_at(7);
        assert_eq!(counter.current(), 7);
        assert_eq!(counter.next(), 7);
        assert_eq!(counter.current(), 8);
    }
}
