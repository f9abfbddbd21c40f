use async_trait::async_trait;
use backoff::backoff::{Backoff, Constant};
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::time::Duration;

/// Blocking-style pause between attempts
///
/// Injected so tests can observe requested delays without waiting on the clock.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackoffKind {
    Fixed(Duration),
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

/// How many times an operation runs and how long to wait in between
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffKind,
}

/// Why a retried operation gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// A non-retryable error; returned on the attempt it happened
    Fatal(E),
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last: E },
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: BackoffKind) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, BackoffKind::Fixed(delay))
    }

    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self::new(
            max_attempts,
            BackoffKind::Exponential {
                initial,
                max,
                multiplier: 2.0,
            },
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn create_backoff(&self) -> Box<dyn Backoff + Send> {
        match self.backoff {
            BackoffKind::Fixed(delay) => Box::new(Constant::new(delay)),
            BackoffKind::Exponential {
                initial,
                max,
                multiplier,
            } => Box::new(
                ExponentialBackoffBuilder::new()
                    .with_initial_interval(initial)
                    .with_max_interval(max)
                    .with_multiplier(multiplier)
                    .with_randomization_factor(0.0)
                    .with_max_elapsed_time(None)
                    .build(),
            ),
        }
    }

    /// `attempt` is 1-based: true while another attempt may follow it
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Run `op` until it succeeds, fails fatally, or the attempts run out
    ///
    /// `on_retry` sees the 1-based attempt that failed, its error, and the delay
    /// about to be slept. No delay follows the final attempt.
    pub async fn run<T, E, F, Fut>(
        &self,
        sleeper: &dyn Sleeper,
        is_retryable: impl Fn(&E) -> bool,
        mut on_retry: impl FnMut(u32, &E, Duration),
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut backoff = self.create_backoff();
        let mut attempt = 1;

        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_retryable(&err) {
                return Err(RetryError::Fatal(err));
            }
            if !self.should_retry(attempt) {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = backoff.next_backoff().unwrap_or(Duration::ZERO);
            on_retry(attempt, &err, delay);
            metrics::counter!("client_retries_total").increment(1);
            sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}
