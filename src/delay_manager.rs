use log::info;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const SLICE: Duration = Duration::from_millis(100);

/// The wait a crawler takes after each player it actually worked on.
pub trait Throttle {
    /// Returns false when the wait was cut short by `stop`.
    fn pause(&self, stop: &AtomicBool) -> bool;
}

/// Wait between players: a fixed base plus up to `jitter` extra.
#[derive(Debug, Clone, Copy)]
pub struct DelayPolicy {
    pub base: Duration,
    pub jitter: Duration,
}

impl DelayPolicy {
    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let mut rng = rand::thread_rng();
        let extra_ms = rng.gen_range(0..=self.jitter.as_millis() as u64);
        self.base.saturating_add(Duration::from_millis(extra_ms))
    }
}

impl Throttle for DelayPolicy {
    fn pause(&self, stop: &AtomicBool) -> bool {
        let delay = self.next_delay();
        if delay >= Duration::from_secs(10) {
            info!("Waiting for {:.1} seconds...", delay.as_secs_f64());
        }
        interruptible_sleep(delay, stop)
    }
}

/// Returns false when woken early by `stop`.
pub fn interruptible_sleep(duration: Duration, stop: &AtomicBool) -> bool {
    // A wait too long for the clock only ends through `stop`.
    let deadline = Instant::now().checked_add(duration);
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let left = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => SLICE,
        };
        if left.is_zero() {
            return true;
        }
        thread::sleep(SLICE.min(left));
    }
}
