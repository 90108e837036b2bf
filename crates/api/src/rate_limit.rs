use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

#[derive(Debug)]
struct Buckets {
    queues: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

/// Sliding-window request counter keyed by client address. Idle clients are
/// dropped at most one window after their last request.
#[derive(Debug, Clone)]
pub struct IpRateLimiter {
    inner: Arc<Mutex<Buckets>>,
    window: Duration,
    max_requests: usize,
}

impl IpRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Buckets {
                queues: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            window,
            max_requests,
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut guard = self.inner.lock();
        let window = self.window;

        if now.saturating_duration_since(guard.last_sweep) >= window {
            guard.queues.retain(|_, queue| {
                queue
                    .back()
                    .is_some_and(|latest| now.saturating_duration_since(*latest) < window)
            });
            guard.last_sweep = now;
        }

        let queue = guard.queues.entry(key.to_string()).or_default();
        while let Some(front) = queue.front() {
            if now.saturating_duration_since(*front) >= window {
                queue.pop_front();
            } else {
                break;
            }
        }

        if queue.len() >= self.max_requests {
            let retry_after = queue
                .front()
                .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(window);
            return RateDecision::Limited { retry_after };
        }

        queue.push_back(now);
        RateDecision::Allowed {
            remaining: self.max_requests - queue.len(),
        }
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.inner.lock().queues.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_within_window_and_recovers() {
        let limiter = IpRateLimiter::new(Duration::from_secs(10), 2);
        let start = Instant::now();

        assert_eq!(
            limiter.check_at("1.2.3.4", start),
            RateDecision::Allowed { remaining: 1 }
        );
        assert_eq!(
            limiter.check_at("1.2.3.4", start + Duration::from_secs(1)),
            RateDecision::Allowed { remaining: 0 }
        );
        assert_eq!(
            limiter.check_at("1.2.3.4", start + Duration::from_secs(4)),
            RateDecision::Limited {
                retry_after: Duration::from_secs(6)
            }
        );
        assert!(matches!(
            limiter.check_at("5.6.7.8", start + Duration::from_secs(4)),
            RateDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_at("1.2.3.4", start + Duration::from_secs(10)),
            RateDecision::Allowed { .. }
        ));
    }

    #[test]
    fn idle_clients_are_forgotten_after_a_window() {
        let limiter = IpRateLimiter::new(Duration::from_secs(60), 5);
        let start = Instant::now();

        for client in 0..1_000 {
            limiter.check_at(&format!("10.0.{}.{}", client / 256, client % 256), start);
        }
        assert_eq!(limiter.tracked_clients(), 1_000);

        limiter.check_at("192.0.2.1", start + Duration::from_secs(3_600));
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
