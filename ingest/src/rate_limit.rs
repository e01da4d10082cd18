//! Fixed-window request limiter keyed by client.
//!
//! Counters live in process memory, so every running instance enforces its
//! own limit. Nothing is shared between replicas.

use crate::metrics_defs::RATE_LIMIT_CLIENTS;
use parking_lot::Mutex;
use shared::gauge;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Rejected { retry_after_secs: u64 },
}

#[cfg(test)]
impl RateLimitDecision {
    fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start_ms: u64,
    count: u32,
}

#[derive(Debug, Default)]
struct Windows {
    by_client: HashMap<String, Window>,
    last_sweep_ms: u64,
}

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window_ms: u64,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        RateLimiter {
            max_requests,
            window_ms: window.as_millis() as u64,
            windows: Mutex::new(Windows::default()),
        }
    }

    pub fn check(&self, client_key: &str, now_ms: u64) -> RateLimitDecision {
        let mut windows = self.windows.lock();
        self.sweep(&mut windows, now_ms);

        let Some(window) = windows.by_client.get_mut(client_key) else {
            windows.by_client.insert(
                client_key.to_string(),
                Window {
                    start_ms: now_ms,
                    count: 1,
                },
            );
            return RateLimitDecision::Allowed;
        };

        // A window is expired once its start is older than the window length.
        let elapsed = now_ms.saturating_sub(window.start_ms);
        if elapsed > self.window_ms {
            *window = Window {
                start_ms: now_ms,
                count: 1,
            };
            return RateLimitDecision::Allowed;
        }

        window.count = window.count.saturating_add(1);
        if window.count > self.max_requests {
            let remaining_ms = self.window_ms - elapsed;
            RateLimitDecision::Rejected {
                retry_after_secs: remaining_ms.div_ceil(1000).max(1),
            }
        } else {
            RateLimitDecision::Allowed
        }
    }

    // Runs at most once per window length.
    fn sweep(&self, windows: &mut Windows, now_ms: u64) {
        if now_ms.saturating_sub(windows.last_sweep_ms) < self.window_ms {
            return;
        }
        let window_ms = self.window_ms;
        windows
            .by_client
            .retain(|_, window| now_ms.saturating_sub(window.start_ms) <= window_ms);
        windows.last_sweep_ms = now_ms;
        gauge!(RATE_LIMIT_CLIENTS).set(windows.by_client.len() as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_000_000_000;

    fn limiter() -> RateLimiter {
        RateLimiter::new(100, Duration::from_secs(60))
    }

    impl RateLimiter {
        fn tracked_clients(&self) -> usize {
            self.windows.lock().by_client.len()
        }
    }

    #[test]
    fn test_hundredth_allowed_hundred_first_rejected() {
        let limiter = limiter();
        for i in 0..100 {
            assert!(limiter.check("1.2.3.4", T0 + i).is_allowed(), "request {}", i + 1);
        }

        match limiter.check("1.2.3.4", T0 + 1_000) {
            RateLimitDecision::Rejected { retry_after_secs } => assert_eq!(retry_after_secs, 59),
            RateLimitDecision::Allowed => panic!("101st request must be rejected"),
        }

        // Other clients are unaffected.
        assert!(limiter.check("5.6.7.8", T0 + 1_000).is_allowed());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("c", T0).is_allowed());
        assert_eq!(
            limiter.check("c", T0 + 59_500),
            RateLimitDecision::Rejected {
                retry_after_secs: 1
            }
        );
        assert_eq!(
            limiter.check("c", T0 + 10),
            RateLimitDecision::Rejected {
                retry_after_secs: 60
            }
        );
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("c", T0).is_allowed());
        assert!(limiter.check("c", T0 + 1).is_allowed());
        assert!(!limiter.check("c", T0 + 2).is_allowed());

        assert!(limiter.check("c", T0 + 60_001).is_allowed());
        assert!(limiter.check("c", T0 + 60_002).is_allowed());
        assert!(!limiter.check("c", T0 + 60_003).is_allowed());
    }

    #[test]
    fn test_window_is_still_open_at_its_exact_length() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("c", T0).is_allowed());
        assert_eq!(
            limiter.check("c", T0 + 60_000),
            RateLimitDecision::Rejected {
                retry_after_secs: 1
            }
        );
        assert!(limiter.check("c", T0 + 60_001).is_allowed());
    }

    #[test]
    fn test_expired_windows_are_swept() {
        let limiter = limiter();
        for client in ["a", "b", "c"] {
            limiter.check(client, T0);
        }
        assert_eq!(limiter.tracked_clients(), 3);

        limiter.check("d", T0 + 120_000);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_sweep_keeps_live_windows() {
        let limiter = limiter();
        limiter.check("old", T0);
        limiter.check("live", T0 + 90_000);
        limiter.check("new", T0 + 120_000);

        assert_eq!(limiter.tracked_clients(), 2);
    }
}
