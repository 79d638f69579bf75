//! Process-wide strictly monotonic nanosecond ticker.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// A strictly monotonic nanosecond time source.
///
/// Backed by `Instant`, which is monotonic but may return equal readings
/// on consecutive calls; `now_ns` additionally guarantees strict increase
/// within the process. No wall-clock tie.
#[derive(Debug)]
pub struct Ticker {
    anchor: Instant,
    last_ns: AtomicI64,
}

impl Ticker {
    fn new() -> Self {
        Self {
            anchor: Instant::now(),
            last_ns: AtomicI64::new(0),
        }
    }

    /// The process-wide shared ticker.
    pub fn global() -> &'static Ticker {
        static TICKER: OnceLock<Ticker> = OnceLock::new();
        TICKER.get_or_init(Ticker::new)
    }

    /// Current tick in nanoseconds, strictly greater than any previous
    /// reading from this ticker.
    pub fn now_ns(&self) -> i64 {
        let raw = self.anchor.elapsed().as_nanos() as i64;
        let mut prev = self.last_ns.load(Ordering::Relaxed);
        loop {
            let next = raw.max(prev + 1);
            match self.last_ns.compare_exchange_weak(
                prev,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictly_increasing() {
        let ticker = Ticker::new();
        let mut last = ticker.now_ns();
        for _ in 0..10_000 {
            let now = ticker.now_ns();
            assert!(now > last);
            last = now;
        }
    }

    #[test]
    fn test_global_is_shared() {
        let a = Ticker::global() as *const Ticker;
        let b = Ticker::global() as *const Ticker;
        assert_eq!(a, b);
    }

    #[test]
    fn test_strictly_increasing_across_threads() {
        use std::sync::Arc;

        let ticker = Arc::new(Ticker::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let ticker = Arc::clone(&ticker);
            handles.push(std::thread::spawn(move || {
                let mut readings = Vec::with_capacity(1000);
                for _ in 0..1000 {
                    readings.push(ticker.now_ns());
                }
                readings
            }));
        }

        let mut all: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let len = all.len();
        all.sort_unstable();
        all.dedup();
        // No two threads ever observed the same tick
        assert_eq!(all.len(), len);
    }
}
