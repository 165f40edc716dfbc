//! A per-provider rolling-window call counter. An adapter must never exceed
//! a provider's stated cap; rather than rejecting a call once the window is
//! full, `acquire` sleeps until the oldest call ages out of the window.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RollingWindowLimiter {
    window: Duration,
    cap: u32,
    calls: Mutex<VecDeque<Instant>>,
}

impl RollingWindowLimiter {
    pub fn new(window: Duration, cap: u32) -> Self {
        Self {
            window,
            cap,
            calls: Mutex::new(VecDeque::with_capacity(cap as usize)),
        }
    }

    pub fn per_minute(cap: u32) -> Self {
        Self::new(Duration::from_secs(60), cap)
    }

    /// Blocks until a call is permitted under the rolling window, then
    /// records it as having happened now.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();
                while calls.front().is_some_and(|&t| now.duration_since(t) >= self.window) {
                    calls.pop_front();
                }
                if (calls.len() as u32) < self.cap {
                    calls.push_back(now);
                    None
                } else {
                    let oldest = *calls.front().expect("cap > 0 implies at-cap queue is nonempty");
                    Some(self.window - now.duration_since(oldest))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn never_exceeds_cap_within_window() {
        let limiter = RollingWindowLimiter::new(Duration::from_millis(50), 2);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        // third acquire must wait for the window to roll over
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
