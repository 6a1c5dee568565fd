#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use oilprice_http::{
    ApiRequest, ApiResponse, AsyncTransport, ClientOptions, PoolLimits, RetryPolicy, Transport,
    TransportError, TransportFuture,
};
use serde_json::json;

pub type Outcome = Result<ApiResponse, TransportError>;

pub fn price_body(code: &str, price: f64) -> ApiResponse {
    ApiResponse::json(
        200,
        &json!({
            "status": "success",
            "data": {
                "code": code,
                "price": price,
                "currency": "USD",
                "created_at": "2024-01-15T10:00:00Z",
                "type": "spot_price"
            }
        }),
    )
}

pub fn status(code: u16) -> Outcome {
    Ok(ApiResponse::json(code, &json!({"error": format!("status {code}")})))
}

/// Options with millisecond backoff so retry tests stay fast.
pub fn fast_options(max_attempts: u32) -> ClientOptions {
    ClientOptions::default().with_retry(
        RetryPolicy::new(max_attempts)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(5))
            .with_jitter(0.0),
    )
}

pub fn pooled_options(max_total: usize, max_idle: usize) -> ClientOptions {
    fast_options(3).with_pool(PoolLimits::new(max_total, max_idle))
}

/// Replays a fixed sequence of outcomes, one per call.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Outcome>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Outcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("script mutex must not be poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("script exhausted".to_owned())))
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, _request: &ApiRequest) -> Outcome {
        self.next()
    }
}

impl AsyncTransport for ScriptedTransport {
    fn send<'a>(&'a self, _request: &'a ApiRequest) -> TransportFuture<'a> {
        Box::pin(async move { self.next() })
    }
}

/// Answers by the `by_code` query parameter and records the order of codes
/// requested.
pub struct KeyedTransport {
    responses: HashMap<String, Outcome>,
    requested: Mutex<Vec<String>>,
}

impl KeyedTransport {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Outcome)>,
    {
        Self {
            responses: responses
                .into_iter()
                .map(|(code, outcome)| (code.to_owned(), outcome))
                .collect(),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .expect("request log mutex must not be poisoned")
            .clone()
    }

    fn respond(&self, request: &ApiRequest) -> Outcome {
        let code = request.query_value("by_code").unwrap_or_default().to_owned();
        self.requested
            .lock()
            .expect("request log mutex must not be poisoned")
            .push(code.clone());
        self.responses
            .get(&code)
            .cloned()
            .unwrap_or_else(|| status(404))
    }
}

impl Transport for KeyedTransport {
    fn send(&self, request: &ApiRequest) -> Outcome {
        self.respond(request)
    }
}

impl AsyncTransport for KeyedTransport {
    fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a> {
        Box::pin(async move { self.respond(request) })
    }
}

/// Async transport that holds each call open for `hold` and records the
/// peak number of simultaneously active calls.
pub struct CountingTransport {
    hold: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingTransport {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AsyncTransport for CountingTransport {
    fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            let _active = ActiveGuard(&self.active);
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.hold).await;
            let code = request.query_value("by_code").unwrap_or("UNKNOWN");
            Ok(price_body(code, 42.0))
        })
    }
}
