use std::sync::Arc;
use tokio::sync::{AcquireError, Semaphore};
use tokio::time::{sleep, Duration, Instant};

/// RateLimiter caps concurrent writes to a collaborator and enforces a
/// minimum spacing between them
#[derive(Clone, Debug)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    min_delay: Duration,
    last_request: Arc<tokio::sync::Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, min_delay_ms: u64) -> Self {
        RateLimiter {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            min_delay: Duration::from_millis(min_delay_ms),
            last_request: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Acquire a permit to make a request
    /// Returns a guard that will release the permit when dropped
    pub async fn acquire(&self) -> Result<RateLimitGuard, AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;

        if !self.min_delay.is_zero() {
            let mut last_request = self.last_request.lock().await;
            if let Some(last) = *last_request {
                let elapsed = last.elapsed();
                if elapsed < self.min_delay {
                    let wait_time = self.min_delay - elapsed;
                    tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                    sleep(wait_time).await;
                }
            }
            *last_request = Some(Instant::now());
        }

        Ok(RateLimitGuard {
            _permit: Some(permit),
        })
    }

    #[cfg(test)]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Stop handing out permits; pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// Guard that releases the rate limit permit when dropped
pub struct RateLimitGuard {
    _permit: Option<tokio::sync::OwnedSemaphorePermit>,
}

impl Drop for RateLimitGuard {
    fn drop(&mut self) {
        tracing::trace!("Rate limit permit released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permits_are_returned_on_drop() {
        let limiter = RateLimiter::new(2, 0);
        let first = limiter.acquire().await.unwrap();
        let _second = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available_permits(), 0);

        drop(first);
        assert_eq!(limiter.available_permits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spaces_out_consecutive_requests() {
        let limiter = RateLimiter::new(1, 50);
        let started = Instant::now();
        drop(limiter.acquire().await.unwrap());
        drop(limiter.acquire().await.unwrap());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn closed_limiter_refuses_permits() {
        let limiter = RateLimiter::new(1, 0);
        limiter.close();
        assert!(limiter.acquire().await.is_err());
    }
}
