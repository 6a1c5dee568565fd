use std::fmt;
use std::time::Duration;

use time::Date;

use crate::{
    routing::{select_route, unbounded_route, EndpointRoute},
    ApiRequest, HistoricalPage, OilPriceError, Result,
};

pub const LATEST_PRICE_PATH: &str = "/v1/prices/latest";
pub const COMMODITIES_PATH: &str = "/v1/commodities";
pub const FUTURES_PATH: &str = "/v1/futures";

/// Largest page size the API accepts.
pub const MAX_PER_PAGE: u32 = 1000;

/// Sampling interval of historical prices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interval {
    Minute,
    Hourly,
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a historical price query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoricalQuery {
    pub commodity: String,
    pub start: Option<Date>,
    pub end: Option<Date>,
    pub interval: Interval,
    pub page: u32,
    pub per_page: u32,
    /// Price type, e.g. `spot_price`.
    pub price_type: String,
    /// Overrides the route's per-attempt timeout.
    pub timeout: Option<Duration>,
}

impl HistoricalQuery {
    pub fn new(commodity: impl Into<String>) -> Self {
        Self {
            commodity: commodity.into(),
            start: None,
            end: None,
            interval: Interval::default(),
            page: 1,
            per_page: 100,
            price_type: "spot_price".to_owned(),
            timeout: None,
        }
    }

    pub fn range(mut self, start: Date, end: Date) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn start(mut self, start: Date) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: Date) -> Self {
        self.end = Some(end);
        self
    }

    pub fn interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn price_type(mut self, price_type: impl Into<String>) -> Self {
        self.price_type = price_type.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Route for this query; the year route unless both dates are set.
    pub fn route(&self) -> EndpointRoute {
        match (self.start, self.end) {
            (Some(start), Some(end)) => select_route(start, end),
            _ => unbounded_route(),
        }
    }

    pub(crate) fn effective_per_page(&self) -> u32 {
        self.per_page.min(MAX_PER_PAGE)
    }

    fn validate(&self) -> Result<()> {
        require_code("commodity", &self.commodity)?;
        require_ordered(self.start, self.end)?;
        if self.page == 0 {
            return Err(OilPriceError::validation("page", "page numbers start at 1"));
        }
        if self.per_page == 0 {
            return Err(OilPriceError::validation(
                "per_page",
                "per_page must be at least 1",
            ));
        }
        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(OilPriceError::validation(
                "timeout",
                "timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn require_code(field: &str, code: &str) -> Result<()> {
    if code.trim().is_empty() {
        return Err(OilPriceError::validation(field, "commodity code cannot be empty"));
    }
    Ok(())
}

fn require_contract(contract: &str) -> Result<&str> {
    let contract = contract.trim();
    if contract.is_empty() {
        return Err(OilPriceError::validation(
            "contract",
            "futures contract cannot be empty",
        ));
    }
    Ok(contract)
}

fn require_ordered(start: Option<Date>, end: Option<Date>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(OilPriceError::validation(
            "end_date",
            format!("end date {end} is before start date {start}"),
        )),
        _ => Ok(()),
    }
}

pub(crate) fn latest_price_request(code: &str, timeout: Duration) -> Result<ApiRequest> {
    require_code("code", code)?;
    Ok(ApiRequest::get(LATEST_PRICE_PATH, timeout).with_query("by_code", code.trim()))
}

pub(crate) fn historical_request(query: &HistoricalQuery) -> Result<ApiRequest> {
    query.validate()?;
    let route = query.route();
    let mut request = ApiRequest::get(route.path, query.timeout.unwrap_or(route.timeout))
        .with_query("by_code", query.commodity.trim())
        .with_query("interval", query.interval)
        .with_query("page", query.page)
        .with_query("per_page", query.effective_per_page())
        .with_query("by_type", &query.price_type);
    if let Some(start) = query.start {
        request = request.with_query("start_date", start);
    }
    if let Some(end) = query.end {
        request = request.with_query("end_date", end);
    }
    Ok(request)
}

pub(crate) fn commodities_request(timeout: Duration) -> ApiRequest {
    ApiRequest::get(COMMODITIES_PATH, timeout)
}

pub(crate) fn commodity_request(code: &str, timeout: Duration) -> Result<ApiRequest> {
    require_code("code", code)?;
    Ok(ApiRequest::get(
        format!("{COMMODITIES_PATH}/{}", code.trim()),
        timeout,
    ))
}

pub(crate) fn futures_latest_request(contract: &str, timeout: Duration) -> Result<ApiRequest> {
    let contract = require_contract(contract)?;
    Ok(ApiRequest::get(format!("{FUTURES_PATH}/{contract}"), timeout))
}

pub(crate) fn futures_history_request(
    contract: &str,
    start: Option<Date>,
    end: Option<Date>,
    timeout: Duration,
) -> Result<ApiRequest> {
    let contract = require_contract(contract)?;
    require_ordered(start, end)?;
    let mut request = ApiRequest::get(format!("{FUTURES_PATH}/{contract}/historical"), timeout);
    if let Some(start) = start {
        request = request.with_query("start_date", start);
    }
    if let Some(end) = end {
        request = request.with_query("end_date", end);
    }
    Ok(request)
}

/// Position of a page-by-page walk over a historical query. Both clients
/// drive their page iterators through it.
#[derive(Clone, Debug)]
pub(crate) struct PageCursor {
    query: HistoricalQuery,
    done: bool,
}

impl PageCursor {
    pub(crate) fn new(query: HistoricalQuery) -> Self {
        Self { query, done: false }
    }

    /// Query for the next page, or `None` once the walk has ended.
    pub(crate) fn pending(&self) -> Option<&HistoricalQuery> {
        (!self.done).then_some(&self.query)
    }

    /// Folds in the result of fetching [`PageCursor::pending`] and returns
    /// what the iterator yields. An empty page ends the walk unyielded; an
    /// error is yielded once and ends it.
    pub(crate) fn advance(
        &mut self,
        fetched: Result<HistoricalPage>,
    ) -> Option<Result<HistoricalPage>> {
        match fetched {
            Ok(page) if page.prices.is_empty() => {
                self.done = true;
                None
            }
            Ok(page) => {
                match self.query.page.checked_add(1) {
                    Some(next) if page.meta.has_next => self.query.page = next,
                    _ => self.done = true,
                }
                Some(Ok(page))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
