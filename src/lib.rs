//! `oilprice-http` is a blocking and async HTTP client for the OilPriceAPI
//! commodity price service.
//!
//! Both clients share one retry loop design:
//! - [`RetryPolicy`] decides whether and how long to wait between attempts
//! - [`classify`] turns HTTP statuses and timeouts into [`OilPriceError`]s
//! - [`routing`] picks the narrowest history route for a date range
//!
//! The async client is [`OilPriceClient`]; the blocking one is
//! [`blocking::OilPriceClient`].

pub mod blocking;
pub mod classify;
mod client;
mod decode;
mod error;
pub mod executor;
mod options;
mod params;
mod pool;
mod retry;
pub mod routing;
mod transport;
mod types;
mod wire;

pub use client::{HistoricalPages, OilPriceClient};
pub use error::{OilPriceError, OutcomeKind, TransportError};
pub use executor::{AttemptOutcome, AttemptRecord, Execution};
pub use options::{ApiKey, ClientOptions, API_KEY_ENV, DEFAULT_BASE_URL};
pub use params::{HistoricalQuery, Interval};
pub use pool::PoolLimits;
pub use retry::RetryPolicy;
pub use routing::{EndpointRoute, Granularity};
pub use transport::{
    ApiRequest, ApiResponse, AsyncTransport, BlockingReqwestTransport, ReqwestTransport,
    Transport, TransportFuture,
};
pub use types::{
    Batch, Commodity, FuturesPoint, FuturesPrice, HistoricalPage, HistoricalPrice, KeyFailure,
    PaginationMeta, PartialFailure, Price,
};

pub type Result<T> = std::result::Result<T, OilPriceError>;
