//! A blocking count-down latch.
//!
//! Used both as the single-shot completion signal of the transient states (a latch of one)
//! and as the drain barrier of a graceful stop (a latch of the in-flight requests).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Counting down is a CAS on the atomic count. Only the release to zero takes the lock,
/// to wake the waiters that checked the count under it.
#[derive(Debug)]
pub(crate) struct Latch {
    count: AtomicU64,
    lock: Mutex<()>,
    zero: Condvar,
}

impl Latch {
    pub(crate) fn new(count: u64) -> Self {
        Self {
            count: AtomicU64::new(count),
            lock: Mutex::new(()),
            zero: Condvar::new(),
        }
    }

    /// A single-shot completion signal.
    pub(crate) fn signal() -> Self {
        Self::new(1)
    }

    pub(crate) fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Decrements the count, waking the waiters when it reaches zero.
    ///
    /// Returns `false` if the count was already zero.
    pub(crate) fn count_down(&self) -> bool {
        match self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1))
        {
            Ok(1) => {
                self.wake();
                true
            }
            Ok(_) => true,
            Err(_) => false,
        }
    }

    /// Forces the count to zero.
    pub(crate) fn open(&self) {
        if self.count.swap(0, Ordering::AcqRel) > 0 {
            self.wake();
        }
    }

    fn wake(&self) {
        let _guard = self.lock.lock();
        self.zero.notify_all();
    }

    pub(crate) fn wait(&self) {
        if self.count() == 0 {
            return;
        }

        let mut guard = self.lock.lock();
        while self.count() > 0 {
            self.zero.wait(&mut guard);
        }
    }

    /// Waits until the count reaches zero, or the timeout elapses.
    ///
    /// Returns `true` if the count reached zero.
    pub(crate) fn wait_for(&self, timeout: Duration) -> bool {
        if self.count() == 0 {
            return true;
        }

        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };

        let mut guard = self.lock.lock();
        while self.count() > 0 {
            if self.zero.wait_until(&mut guard, deadline).timed_out() {
                return self.count() == 0;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::Latch;

    #[test]
    fn it_should_not_count_down_below_zero() {
        let latch = Latch::new(2);

        assert!(latch.count_down());
        assert!(latch.count_down());
        assert!(!latch.count_down());
        assert_eq!(latch.count(), 0);
    }

    #[test]
    fn it_should_time_out_while_the_count_is_not_zero() {
        let latch = Latch::signal();

        assert!(!latch.wait_for(Duration::from_millis(10)));
        assert_eq!(latch.count(), 1);
    }

    #[test]
    fn it_should_return_immediately_once_opened() {
        let latch = Latch::new(5);

        latch.open();

        assert!(latch.wait_for(Duration::ZERO));
        latch.wait();
    }

    #[test]
    fn it_should_count_down_exactly_once_per_count_across_threads() {
        const THREADS: usize = 8;
        const COUNT: u64 = 1_000;

        let latch = Arc::new(Latch::new(COUNT));

        let threads: Vec<_> = (0..THREADS)
            .map(|_| {
                let latch = latch.clone();
                thread::spawn(move || (0..COUNT).filter(|_| latch.count_down()).count() as u64)
            })
            .collect();

        let released: u64 = threads.into_iter().map(|t| t.join().expect("it should join")).sum();

        assert_eq!(released, COUNT);
        assert_eq!(latch.count(), 0);
        assert!(latch.wait_for(Duration::ZERO));
    }

    #[test]
    fn it_should_wake_the_waiters_when_the_last_count_is_released() {
        let latch = Arc::new(Latch::new(3));

        let waiter = {
            let latch = latch.clone();
            thread::spawn(move || latch.wait_for(Duration::from_secs(10)))
        };

        for _ in 0..3 {
            assert!(latch.count_down());
        }

        assert!(waiter.join().expect("it should join the waiter"));
    }
}
