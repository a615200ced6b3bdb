/// Circuit breaker for store clients
///
/// State transitions:
/// - Closed → Open: after `failure_threshold` consecutive failures
/// - Open → HalfOpen: once `cooldown` has elapsed, a single probe call is admitted
/// - HalfOpen → Closed: after `success_threshold` successful probes
/// - HalfOpen → Open: on any probe failure
/// - A probe dropped before it settles frees its slot and the circuit stays HalfOpen
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            cooldown: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    #[error("circuit open, call rejected")]
    Open,
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    probe_successes: u32,
    probe_in_flight: bool,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    config: BreakerConfig,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: BreakerConfig) -> Self {
        Self {
            name,
            config,
            inner: Arc::new(Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                probe_successes: 0,
                probe_in_flight: false,
                opened_at: None,
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Run `f` unless the circuit is open. Every error of `f` counts towards tripping.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(|_: &E| true, f).await
    }

    /// Run `f` unless the circuit is open, counting only errors for which
    /// `is_failure` holds. Any other error means the backend answered, so it
    /// settles the call like a success.
    ///
    /// Dropping the returned future before it completes releases a half-open
    /// probe slot without recording an outcome.
    pub async fn call_with<F, Fut, T, E, P>(
        &self,
        is_failure: P,
        f: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let admission = self.admit::<E>()?;

        match f().await {
            Ok(value) => {
                admission.succeed();
                Ok(value)
            }
            Err(err) => {
                if is_failure(&err) {
                    admission.fail();
                } else {
                    admission.succeed();
                }
                Err(BreakerError::Inner(err))
            }
        }
    }

    fn admit<E>(&self) -> Result<Admission<'_>, BreakerError<E>> {
        let mut inner = self.inner.lock();

        let probing = match inner.state {
            BreakerState::Closed => false,
            BreakerState::Open => {
                let cooled = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if !cooled {
                    return Err(BreakerError::Open);
                }
                info!(breaker = self.name, "Circuit breaker: Open → HalfOpen");
                inner.state = BreakerState::HalfOpen;
                inner.probe_successes = 0;
                inner.probe_in_flight = true;
                true
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    return Err(BreakerError::Open);
                }
                inner.probe_in_flight = true;
                true
            }
        };

        Ok(Admission {
            breaker: self,
            probing,
            settled: false,
        })
    }

    /// A probe was abandoned mid-flight. Free the slot for the next caller.
    fn release_probe(&self) {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::HalfOpen && inner.probe_in_flight {
            inner.probe_in_flight = false;
            debug!(breaker = self.name, "Circuit breaker: probe abandoned, slot released");
        }
    }

    fn on_success(&self, probing: bool) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = 0;

        if probing && inner.state == BreakerState::HalfOpen {
            inner.probe_in_flight = false;
            inner.probe_successes += 1;
            if inner.probe_successes >= self.config.success_threshold {
                info!(breaker = self.name, "Circuit breaker: HalfOpen → Closed");
                inner.state = BreakerState::Closed;
                inner.opened_at = None;
            }
        }
    }

    fn on_failure(&self, probing: bool) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;

        match inner.state {
            BreakerState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        breaker = self.name,
                        failures = inner.consecutive_failures,
                        "Circuit breaker: Closed → Open"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen if probing => {
                warn!(breaker = self.name, "Circuit breaker: HalfOpen → Open (probe failed)");
                inner.state = BreakerState::Open;
                inner.probe_in_flight = false;
                inner.opened_at = Some(Instant::now());
            }
            _ => {}
        }
    }
}

/// An admitted call. Settles exactly once, or releases its probe slot on drop.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    probing: bool,
    settled: bool,
}

impl Admission<'_> {
    fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.probing);
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.probing);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probing {
            self.breaker.release_probe();
        }
    }
}
