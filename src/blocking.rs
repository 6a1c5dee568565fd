//! Blocking client. Every call runs on, and suspends, the calling thread.
//!
//! The client wraps `reqwest::blocking`, so it must not be created, used or
//! dropped from inside an async runtime. Use [`crate::OilPriceClient`]
//! there instead.

use std::fmt;

use time::Date;

use crate::{
    decode::{
        decode_commodities, decode_commodity, decode_futures_history, decode_futures_price,
        decode_historical, decode_price,
    },
    executor::{BlockingExecutor, Execution},
    params::{
        commodities_request, commodity_request, futures_history_request, futures_latest_request,
        historical_request, latest_price_request, PageCursor, MAX_PER_PAGE,
    },
    ApiKey, ApiRequest, Batch, BlockingReqwestTransport, ClientOptions, Commodity, FuturesPoint,
    FuturesPrice, HistoricalPage, HistoricalPrice, HistoricalQuery, PartialFailure, Price, Result,
    Transport,
};

/// Blocking client for the OilPriceAPI price service.
///
/// Share one client between threads by reference or `Arc`; each thread
/// runs one call at a time.
pub struct OilPriceClient<T = BlockingReqwestTransport> {
    executor: BlockingExecutor<T>,
    options: ClientOptions,
}

impl<T> fmt::Debug for OilPriceClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("blocking::OilPriceClient")
            .field("base_url", &self.options.base_url)
            .field("api_key", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

impl OilPriceClient<BlockingReqwestTransport> {
    pub fn new(api_key: impl Into<String>, options: ClientOptions) -> Result<Self> {
        let api_key = ApiKey::new(api_key)?;
        options.validate()?;
        let transport = BlockingReqwestTransport::new(&api_key, &options)?;
        Self::with_transport(transport, options)
    }

    /// Creates a client with the key from `OILPRICEAPI_KEY`.
    pub fn from_env(options: ClientOptions) -> Result<Self> {
        let api_key = ApiKey::from_env()?;
        options.validate()?;
        let transport = BlockingReqwestTransport::new(&api_key, &options)?;
        Self::with_transport(transport, options)
    }
}

impl<T: Transport> OilPriceClient<T> {
    pub fn with_transport(transport: T, options: ClientOptions) -> Result<Self> {
        options.validate()?;
        let executor = BlockingExecutor::new(transport, options.retry.clone(), options.pool)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            base_url = %options.base_url,
            max_attempts = options.retry.max_attempts,
            max_total = options.pool.max_total,
            "blocking client opened"
        );

        Ok(Self { executor, options })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn in_flight(&self) -> usize {
        self.executor.in_flight()
    }

    pub fn fetch_one(&self, code: &str) -> Result<Price> {
        let request = latest_price_request(code, self.options.timeout)?;
        let response = self.executor.execute(&request)?;
        decode_price(&response)
    }

    /// See [`crate::OilPriceClient::fetch_many`].
    pub fn fetch_many<I, S>(&self, codes: I, mode: PartialFailure) -> Result<Batch>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut batch = Batch::default();
        for code in codes {
            let code = code.as_ref();
            batch.record(mode, code, self.fetch_one(code))?;
        }
        Ok(batch)
    }

    pub fn historical(&self, query: &HistoricalQuery) -> Result<HistoricalPage> {
        let request = historical_request(query)?;
        let response = self.executor.execute(&request)?;
        decode_historical(&response, query.page, query.effective_per_page())
    }

    /// See [`crate::OilPriceClient::historical_pages`].
    pub fn historical_pages(&self, query: &HistoricalQuery) -> HistoricalPages<'_, T> {
        HistoricalPages {
            client: self,
            cursor: PageCursor::new(query.clone()),
        }
    }

    pub fn historical_all(&self, query: &HistoricalQuery) -> Result<Vec<HistoricalPrice>> {
        let mut prices = Vec::new();
        for page in self.historical_pages(&query.clone().per_page(MAX_PER_PAGE)) {
            prices.extend(page?.prices);
        }
        Ok(prices)
    }

    pub fn futures_latest(&self, contract: &str) -> Result<FuturesPrice> {
        let request = futures_latest_request(contract, self.options.timeout)?;
        let response = self.executor.execute(&request)?;
        decode_futures_price(&response, contract)
    }

    pub fn futures_historical(
        &self,
        contract: &str,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<Vec<FuturesPoint>> {
        let request = futures_history_request(contract, start, end, self.options.timeout)?;
        let response = self.executor.execute(&request)?;
        decode_futures_history(&response)
    }

    pub fn commodities(&self) -> Result<Vec<Commodity>> {
        let response = self
            .executor
            .execute(&commodities_request(self.options.timeout))?;
        decode_commodities(&response)
    }

    pub fn commodity(&self, code: &str) -> Result<Commodity> {
        let request = commodity_request(code, self.options.timeout)?;
        let response = self.executor.execute(&request)?;
        decode_commodity(&response)
    }

    pub fn execute_traced(&self, request: &ApiRequest) -> Execution {
        self.executor.execute_traced(request)
    }

    /// Releases the connection pool.
    pub fn close(self) {
        #[cfg(feature = "tracing")]
        tracing::debug!(base_url = %self.options.base_url, "blocking client closed");
    }
}

/// Iterator over the pages of a historical query, created by
/// [`OilPriceClient::historical_pages`]. Stops after the last page, before
/// an empty page, or after yielding an error.
pub struct HistoricalPages<'a, T = BlockingReqwestTransport> {
    client: &'a OilPriceClient<T>,
    cursor: PageCursor,
}

impl<T: Transport> Iterator for HistoricalPages<'_, T> {
    type Item = Result<HistoricalPage>;

    fn next(&mut self) -> Option<Self::Item> {
        let query = self.cursor.pending()?;
        let fetched = self.client.historical(query);
        self.cursor.advance(fetched)
    }
}
