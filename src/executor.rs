//! Attempt loops for the blocking and async clients.
//!
//! Both executors feed every attempt through [`evaluate`], so for the same
//! sequence of transport outcomes they make the same attempts and finish
//! with the same result. They differ only in how they wait: a thread sleep
//! or a task sleep.

use std::time::{Duration, Instant};

use crate::{
    classify::{classify_response, classify_transport},
    pool::{AsyncSlots, BlockingSlots},
    ApiRequest, ApiResponse, AsyncTransport, OilPriceError, OutcomeKind, PoolLimits, Result,
    RetryPolicy, Transport, TransportError,
};

/// How a single attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failed(OutcomeKind),
    Unclassified,
}

/// Diagnostic record of one attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct AttemptRecord {
    pub attempt_index: u32,
    pub outcome: AttemptOutcome,
    /// Time from requesting a slot to receiving the outcome.
    pub elapsed: Duration,
}

/// Final result of a logical call together with its attempts.
#[derive(Debug)]
pub struct Execution {
    pub result: Result<ApiResponse>,
    pub attempts: Vec<AttemptRecord>,
}

pub(crate) enum Step {
    Finish(Result<ApiResponse>),
    Retry {
        delay: Duration,
        reason: OilPriceError,
    },
}

/// Decides what follows attempt `attempt_index` given its raw outcome.
pub(crate) fn evaluate(
    policy: &RetryPolicy,
    attempt_index: u32,
    outcome: std::result::Result<ApiResponse, TransportError>,
) -> (AttemptOutcome, Step) {
    let error = match outcome {
        Ok(response) if response.is_success() => {
            return (AttemptOutcome::Success, Step::Finish(Ok(response)))
        }
        Ok(response) => match classify_response(&response) {
            Some(error) => error,
            None => {
                let error = OilPriceError::Http {
                    status: response.status,
                    body: response.body,
                };
                return (AttemptOutcome::Unclassified, Step::Finish(Err(error)));
            }
        },
        Err(err) => match classify_transport(&err) {
            Some(error) => error,
            None => {
                return (
                    AttemptOutcome::Unclassified,
                    Step::Finish(Err(OilPriceError::Transport(err))),
                )
            }
        },
    };

    match error.kind() {
        Some(kind) if policy.should_retry(attempt_index, kind) => (
            AttemptOutcome::Failed(kind),
            Step::Retry {
                delay: policy.delay_for(attempt_index),
                reason: error,
            },
        ),
        Some(kind) => (AttemptOutcome::Failed(kind), Step::Finish(Err(error))),
        None => (AttemptOutcome::Unclassified, Step::Finish(Err(error))),
    }
}

/// A blocking send can only be checked once it returns. An answer that
/// arrives after `timeout` counts as a timeout, the same outcome an expired
/// async attempt produces.
fn enforce_deadline(
    outcome: std::result::Result<ApiResponse, TransportError>,
    elapsed: Duration,
    timeout: Duration,
) -> std::result::Result<ApiResponse, TransportError> {
    if elapsed > timeout {
        Err(TransportError::Timeout(timeout))
    } else {
        outcome
    }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn log_attempt(tag: &str, request: &ApiRequest, record: &AttemptRecord) {
    #[cfg(feature = "tracing")]
    tracing::debug!(
        client = tag,
        path = %request.path,
        attempt = record.attempt_index,
        elapsed_ms = record.elapsed.as_millis() as u64,
        outcome = ?record.outcome,
        "request attempt finished"
    );
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn log_retry(
    tag: &str,
    policy: &RetryPolicy,
    attempt_index: u32,
    reason: &OilPriceError,
    delay: Duration,
) {
    #[cfg(feature = "tracing")]
    tracing::warn!(
        "[{tag}] {reason}, retrying in {:.2}s (attempt {}/{})",
        delay.as_secs_f64(),
        attempt_index + 1,
        policy.max_attempts
    );
}

/// Runs logical calls on the calling thread.
#[derive(Debug)]
pub struct BlockingExecutor<T> {
    transport: T,
    policy: RetryPolicy,
    slots: BlockingSlots,
}

impl<T: Transport> BlockingExecutor<T> {
    pub fn new(transport: T, policy: RetryPolicy, limits: PoolLimits) -> Result<Self> {
        policy.validate()?;
        limits.validate()?;
        Ok(Self {
            transport,
            policy,
            slots: BlockingSlots::new(limits.max_total),
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Transport calls currently holding a connection slot.
    pub fn in_flight(&self) -> usize {
        self.slots.in_use()
    }

    pub fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.execute_traced(request).result
    }

    /// Like [`execute`](Self::execute), also returning every attempt.
    pub fn execute_traced(&self, request: &ApiRequest) -> Execution {
        let mut attempts = Vec::new();
        let mut attempt_index = 0;
        loop {
            let started = Instant::now();
            let outcome = {
                let _slot = self.slots.acquire();
                let sent = Instant::now();
                let outcome = self.transport.send(request);
                enforce_deadline(outcome, sent.elapsed(), request.timeout)
            };

            let (recorded, step) = evaluate(&self.policy, attempt_index, outcome);
            let record = AttemptRecord {
                attempt_index,
                outcome: recorded,
                elapsed: started.elapsed(),
            };
            log_attempt("Sync", request, &record);
            attempts.push(record);

            match step {
                Step::Finish(result) => return Execution { result, attempts },
                Step::Retry { delay, reason } => {
                    log_retry("Sync", &self.policy, attempt_index, &reason, delay);
                    std::thread::sleep(delay);
                    attempt_index += 1;
                }
            }
        }
    }
}

/// Runs logical calls as async tasks; retry waits yield to the runtime.
#[derive(Debug)]
pub struct AsyncExecutor<T> {
    transport: T,
    policy: RetryPolicy,
    slots: AsyncSlots,
}

impl<T: AsyncTransport> AsyncExecutor<T> {
    pub fn new(transport: T, policy: RetryPolicy, limits: PoolLimits) -> Result<Self> {
        policy.validate()?;
        limits.validate()?;
        Ok(Self {
            transport,
            policy,
            slots: AsyncSlots::new(limits.max_total),
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Transport calls currently holding a connection slot.
    pub fn in_flight(&self) -> usize {
        self.slots.in_use()
    }

    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.execute_traced(request).await.result
    }

    /// Like [`execute`](Self::execute), also returning every attempt.
    ///
    /// Dropping the future aborts the in-flight transport call and returns
    /// its slot.
    pub async fn execute_traced(&self, request: &ApiRequest) -> Execution {
        let mut attempts = Vec::new();
        let mut attempt_index = 0;
        loop {
            let started = Instant::now();
            let outcome = self.attempt(request).await;

            let (recorded, step) = evaluate(&self.policy, attempt_index, outcome);
            let record = AttemptRecord {
                attempt_index,
                outcome: recorded,
                elapsed: started.elapsed(),
            };
            log_attempt("Async", request, &record);
            attempts.push(record);

            match step {
                Step::Finish(result) => return Execution { result, attempts },
                Step::Retry { delay, reason } => {
                    log_retry("Async", &self.policy, attempt_index, &reason, delay);
                    tokio::time::sleep(delay).await;
                    attempt_index += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        request: &ApiRequest,
    ) -> std::result::Result<ApiResponse, TransportError> {
        let _permit = self.slots.acquire().await?;
        match tokio::time::timeout(request.timeout, self.transport.send(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Timeout(request.timeout)),
        }
    }
}
