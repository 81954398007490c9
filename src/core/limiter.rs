//! Bounded concurrency for cipher jobs.
//!
//! Each engine call spawns a process and buffers data, so the number of cipher
//! jobs in flight is capped. Callers block until a permit frees up.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::trace;

#[derive(Debug)]
struct Permits {
    available: Mutex<usize>,
    freed: Condvar,
}

impl Permits {
    fn lock(&self) -> MutexGuard<'_, usize> {
        // The count stays consistent even if a holder panicked.
        self.available.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Counting gate shared by all cipher jobs.
#[derive(Debug, Clone)]
pub struct JobLimiter {
    permits: Arc<Permits>,
    capacity: usize,
}

impl JobLimiter {
    /// Create a limiter with `capacity` permits (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Permits {
                available: Mutex::new(capacity),
                freed: Condvar::new(),
            }),
            capacity,
        }
    }

    /// Block until a permit is available.
    pub fn acquire(&self) -> JobPermit {
        let mut available = self.permits.lock();
        while *available == 0 {
            trace!("waiting for a job permit");
            available = self
                .permits
                .freed
                .wait(available)
                .unwrap_or_else(|e| e.into_inner());
        }
        *available -= 1;

        JobPermit {
            permits: Arc::clone(&self.permits),
        }
    }

    /// Take a permit only if one is free right now.
    pub fn try_acquire(&self) -> Option<JobPermit> {
        let mut available = self.permits.lock();
        if *available == 0 {
            return None;
        }
        *available -= 1;
        Some(JobPermit {
            permits: Arc::clone(&self.permits),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}

/// A held permit. Dropping it wakes one waiter.
#[derive(Debug)]
pub struct JobPermit {
    permits: Arc<Permits>,
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        *self.permits.lock() += 1;
        self.permits.freed.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_permits_are_returned() {
        let limiter = JobLimiter::new(2);
        let a = limiter.acquire();
        let _b = limiter.acquire();
        assert_eq!(limiter.available(), 0);
        assert!(limiter.try_acquire().is_none());

        drop(a);
        assert_eq!(limiter.available(), 1);
        assert!(limiter.try_acquire().is_some());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let limiter = JobLimiter::new(0);
        assert_eq!(limiter.capacity(), 1);
        assert!(limiter.try_acquire().is_some());
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let limiter = JobLimiter::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let limiter = limiter.clone();
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    let _permit = limiter.acquire();
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(limiter.available(), 3);
    }
}
