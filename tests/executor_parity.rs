mod support;

use std::{sync::Arc, time::Duration};

use oilprice_http::{
    executor::{AsyncExecutor, BlockingExecutor},
    ApiRequest, AttemptOutcome, Execution, OilPriceError, OutcomeKind, PoolLimits, RetryPolicy,
    TransportError,
};
use support::{price_body, status, Outcome, ScriptedTransport};

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts)
        .with_backoff(Duration::from_millis(1), Duration::from_millis(4))
        .with_jitter(0.0)
}

fn request() -> ApiRequest {
    ApiRequest::get("/v1/prices/latest", Duration::from_secs(1)).with_query("by_code", "WTI_USD")
}

fn run_blocking(script: Vec<Outcome>, policy: RetryPolicy) -> (Execution, usize) {
    let transport = Arc::new(ScriptedTransport::new(script));
    let executor = BlockingExecutor::new(Arc::clone(&transport), policy, PoolLimits::default())
        .expect("executor must build");
    let execution = executor.execute_traced(&request());
    (execution, transport.calls())
}

async fn run_async(script: Vec<Outcome>, policy: RetryPolicy) -> (Execution, usize) {
    let transport = Arc::new(ScriptedTransport::new(script));
    let executor = AsyncExecutor::new(Arc::clone(&transport), policy, PoolLimits::default())
        .expect("executor must build");
    let execution = executor.execute_traced(&request()).await;
    (execution, transport.calls())
}

fn outcomes(execution: &Execution) -> Vec<(u32, AttemptOutcome)> {
    execution
        .attempts
        .iter()
        .map(|record| (record.attempt_index, record.outcome))
        .collect()
}

/// Runs the same script through both executors and checks they agree.
async fn assert_parity(script: Vec<Outcome>, policy: RetryPolicy) -> (Execution, usize) {
    let (sync_execution, sync_calls) = run_blocking(script.clone(), policy.clone());
    let (async_execution, async_calls) = run_async(script, policy).await;

    assert_eq!(sync_calls, async_calls, "transport call counts differ");
    assert_eq!(
        outcomes(&sync_execution),
        outcomes(&async_execution),
        "attempt sequences differ"
    );
    match (&sync_execution.result, &async_execution.result) {
        (Ok(left), Ok(right)) => assert_eq!(left, right),
        (Err(left), Err(right)) => assert_eq!(left, right),
        (left, right) => panic!("results differ: {left:?} vs {right:?}"),
    }
    (async_execution, async_calls)
}

#[tokio::test]
async fn three_server_errors_then_success_take_four_attempts() {
    let script = vec![
        status(503),
        status(503),
        status(503),
        Ok(price_body("WTI_USD", 70.25)),
    ];
    let (execution, calls) = assert_parity(script, policy(4)).await;

    assert_eq!(calls, 4);
    assert_eq!(execution.attempts.len(), 4);
    assert_eq!(
        outcomes(&execution),
        vec![
            (0, AttemptOutcome::Failed(OutcomeKind::Server)),
            (1, AttemptOutcome::Failed(OutcomeKind::Server)),
            (2, AttemptOutcome::Failed(OutcomeKind::Server)),
            (3, AttemptOutcome::Success),
        ]
    );
    let response = execution.result.expect("fourth attempt must succeed");
    assert_eq!(response.status, 200);
    assert!(response.body.contains("70.25"));
}

#[tokio::test]
async fn exhausted_attempts_surface_last_server_error() {
    let script = vec![status(500), status(502), status(503), status(504)];
    let (execution, calls) = assert_parity(script, policy(3)).await;

    assert_eq!(calls, 3);
    assert!(matches!(
        execution.result,
        Err(OilPriceError::Server { status: 503, .. })
    ));
}

#[tokio::test]
async fn authentication_failure_is_not_retried() {
    let script = vec![status(503), status(401), status(200)];
    let (execution, calls) = assert_parity(script, policy(5)).await;

    assert_eq!(calls, 2);
    assert!(matches!(
        execution.result,
        Err(OilPriceError::Authentication { .. })
    ));
}

#[tokio::test]
async fn rate_limit_is_retried_only_when_configured() {
    let script = vec![status(429), Ok(price_body("WTI_USD", 70.0))];

    let (execution, calls) = assert_parity(script.clone(), policy(3)).await;
    assert_eq!(calls, 1);
    assert!(matches!(execution.result, Err(OilPriceError::RateLimit { .. })));

    let lenient = policy(3).retry_on([OutcomeKind::Server, OutcomeKind::RateLimit]);
    let (execution, calls) = assert_parity(script, lenient).await;
    assert_eq!(calls, 2);
    assert!(execution.result.is_ok());
}

#[tokio::test]
async fn timeouts_are_retried_and_connect_failures_are_not() {
    let script = vec![
        Err(TransportError::Timeout(Duration::from_secs(1))),
        Err(TransportError::Connect("connection refused".to_owned())),
        Ok(price_body("WTI_USD", 70.0)),
    ];
    let (execution, calls) = assert_parity(script, policy(5)).await;

    assert_eq!(calls, 2);
    assert_eq!(
        outcomes(&execution),
        vec![
            (0, AttemptOutcome::Failed(OutcomeKind::Timeout)),
            (1, AttemptOutcome::Unclassified),
        ]
    );
    assert!(matches!(
        execution.result,
        Err(OilPriceError::Transport(TransportError::Connect(_)))
    ));
}

#[tokio::test]
async fn unclassified_status_is_returned_verbatim() {
    let script = vec![Ok(oilprice_http::ApiResponse::new(418, "teapot"))];
    let (execution, calls) = assert_parity(script, policy(3)).await;

    assert_eq!(calls, 1);
    assert_eq!(
        execution.result.expect_err("must fail"),
        OilPriceError::Http {
            status: 418,
            body: "teapot".to_owned(),
        }
    );
}

#[tokio::test]
async fn async_executor_enforces_per_attempt_timeout() {
    struct Stalled;

    impl oilprice_http::AsyncTransport for Stalled {
        fn send<'a>(&'a self, _request: &'a ApiRequest) -> oilprice_http::TransportFuture<'a> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(TransportError::Other("unreachable".to_owned()))
            })
        }
    }

    let executor = AsyncExecutor::new(Stalled, policy(2), PoolLimits::default())
        .expect("executor must build");
    let request = ApiRequest::get("/v1/prices/past_day", Duration::from_millis(20));
    let execution = executor.execute_traced(&request).await;

    assert_eq!(execution.attempts.len(), 2);
    assert_eq!(
        execution.result.expect_err("must time out"),
        OilPriceError::Timeout {
            timeout: Duration::from_millis(20)
        }
    );
    assert_eq!(executor.in_flight(), 0);
}

/// Answers successfully, but only after `delay`.
struct Slow {
    delay: Duration,
}

impl oilprice_http::Transport for Slow {
    fn send(&self, _request: &ApiRequest) -> Result<oilprice_http::ApiResponse, TransportError> {
        std::thread::sleep(self.delay);
        Ok(price_body("WTI_USD", 70.0))
    }
}

impl oilprice_http::AsyncTransport for Slow {
    fn send<'a>(&'a self, _request: &'a ApiRequest) -> oilprice_http::TransportFuture<'a> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(price_body("WTI_USD", 70.0))
        })
    }
}

#[tokio::test]
async fn answer_slower_than_request_timeout_times_out_on_both_paths() {
    let slow = || Slow {
        delay: Duration::from_millis(200),
    };
    let request = ApiRequest::get("/v1/prices/latest", Duration::from_millis(20))
        .with_query("by_code", "WTI_USD");

    let blocking = BlockingExecutor::new(slow(), policy(2), PoolLimits::default())
        .expect("executor must build");
    let blocking_request = request.clone();
    let sync_execution =
        tokio::task::spawn_blocking(move || blocking.execute_traced(&blocking_request))
            .await
            .expect("blocking executor must not panic");

    let executor = AsyncExecutor::new(slow(), policy(2), PoolLimits::default())
        .expect("executor must build");
    let async_execution = executor.execute_traced(&request).await;

    let expected = OilPriceError::Timeout {
        timeout: Duration::from_millis(20),
    };
    for execution in [&sync_execution, &async_execution] {
        assert_eq!(
            outcomes(execution),
            vec![
                (0, AttemptOutcome::Failed(OutcomeKind::Timeout)),
                (1, AttemptOutcome::Failed(OutcomeKind::Timeout)),
            ]
        );
        assert_eq!(execution.result.as_ref().expect_err("must time out"), &expected);
    }
}
