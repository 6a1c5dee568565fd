use std::fmt;

use time::Date;

use crate::{
    decode::{
        decode_commodities, decode_commodity, decode_futures_history, decode_futures_price,
        decode_historical, decode_price,
    },
    executor::{AsyncExecutor, Execution},
    params::{
        commodities_request, commodity_request, futures_history_request, futures_latest_request,
        historical_request, latest_price_request, PageCursor, MAX_PER_PAGE,
    },
    ApiKey, ApiRequest, AsyncTransport, Batch, ClientOptions, Commodity, FuturesPoint,
    FuturesPrice, HistoricalPage, HistoricalPrice, HistoricalQuery, PartialFailure, Price,
    ReqwestTransport, Result,
};

/// Async client for the OilPriceAPI price service.
///
/// The client owns its connection pool. Share it between tasks by
/// reference or `Arc`; release it with [`OilPriceClient::close`] or by
/// dropping it.
///
/// ```no_run
/// use oilprice_http::{ClientOptions, OilPriceClient};
///
/// # async fn run() -> oilprice_http::Result<()> {
/// let client = OilPriceClient::new("my-api-key", ClientOptions::default())?;
/// let price = client.fetch_one("BRENT_CRUDE_USD").await?;
/// println!("{}: {}", price.commodity, price.value);
/// client.close();
/// # Ok(())
/// # }
/// ```
pub struct OilPriceClient<T = ReqwestTransport> {
    executor: AsyncExecutor<T>,
    options: ClientOptions,
}

impl<T> fmt::Debug for OilPriceClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OilPriceClient")
            .field("base_url", &self.options.base_url)
            .field("api_key", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

impl OilPriceClient<ReqwestTransport> {
    /// Creates a client backed by `reqwest`.
    pub fn new(api_key: impl Into<String>, options: ClientOptions) -> Result<Self> {
        let api_key = ApiKey::new(api_key)?;
        options.validate()?;
        let transport = ReqwestTransport::new(&api_key, &options)?;
        Self::with_transport(transport, options)
    }

    /// Creates a client with the key from `OILPRICEAPI_KEY`.
    pub fn from_env(options: ClientOptions) -> Result<Self> {
        let api_key = ApiKey::from_env()?;
        options.validate()?;
        let transport = ReqwestTransport::new(&api_key, &options)?;
        Self::with_transport(transport, options)
    }
}

impl<T: AsyncTransport> OilPriceClient<T> {
    /// Creates a client over a custom transport. The transport is
    /// responsible for authentication.
    pub fn with_transport(transport: T, options: ClientOptions) -> Result<Self> {
        options.validate()?;
        let executor = AsyncExecutor::new(transport, options.retry.clone(), options.pool)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            base_url = %options.base_url,
            max_attempts = options.retry.max_attempts,
            max_total = options.pool.max_total,
            "async client opened"
        );

        Ok(Self { executor, options })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Transport calls currently holding a connection slot.
    pub fn in_flight(&self) -> usize {
        self.executor.in_flight()
    }

    /// Latest price for one commodity code.
    pub async fn fetch_one(&self, code: &str) -> Result<Price> {
        let request = latest_price_request(code, self.options.timeout)?;
        let response = self.executor.execute(&request).await?;
        decode_price(&response)
    }

    /// Latest prices for several codes, fetched one after another in input
    /// order.
    ///
    /// With [`PartialFailure::Raise`] the first failure is returned and the
    /// remaining codes are not requested. With [`PartialFailure::Collect`]
    /// classified failures are gathered in the returned [`Batch`].
    pub async fn fetch_many<I, S>(&self, codes: I, mode: PartialFailure) -> Result<Batch>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut batch = Batch::default();
        for code in codes {
            let code = code.as_ref();
            let result = self.fetch_one(code).await;
            batch.record(mode, code, result)?;
        }
        Ok(batch)
    }

    /// One page of historical prices, routed by the query's date range.
    pub async fn historical(&self, query: &HistoricalQuery) -> Result<HistoricalPage> {
        let request = historical_request(query)?;
        let response = self.executor.execute(&request).await?;
        decode_historical(&response, query.page, query.effective_per_page())
    }

    /// Walks the query page by page, starting at `query.page`.
    ///
    /// ```no_run
    /// # use oilprice_http::{HistoricalQuery, OilPriceClient};
    /// # async fn run(client: OilPriceClient) -> oilprice_http::Result<()> {
    /// let mut pages = client.historical_pages(&HistoricalQuery::new("WTI_USD"));
    /// while let Some(page) = pages.next_page().await? {
    ///     println!("page {}: {} prices", page.meta.page, page.prices.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn historical_pages(&self, query: &HistoricalQuery) -> HistoricalPages<'_, T> {
        HistoricalPages {
            client: self,
            cursor: PageCursor::new(query.clone()),
        }
    }

    /// Every historical price for the query, following pages until the API
    /// reports no next page or returns an empty one.
    pub async fn historical_all(&self, query: &HistoricalQuery) -> Result<Vec<HistoricalPrice>> {
        let mut pages = self.historical_pages(&query.clone().per_page(MAX_PER_PAGE));
        let mut prices = Vec::new();
        while let Some(page) = pages.next_page().await? {
            prices.extend(page.prices);
        }
        Ok(prices)
    }

    /// Latest quote for a futures contract such as `CL.1`.
    pub async fn futures_latest(&self, contract: &str) -> Result<FuturesPrice> {
        let request = futures_latest_request(contract, self.options.timeout)?;
        let response = self.executor.execute(&request).await?;
        decode_futures_price(&response, contract)
    }

    /// Daily prices of a futures contract, optionally bounded by date.
    pub async fn futures_historical(
        &self,
        contract: &str,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<Vec<FuturesPoint>> {
        let request = futures_history_request(contract, start, end, self.options.timeout)?;
        let response = self.executor.execute(&request).await?;
        decode_futures_history(&response)
    }

    /// Catalog of available commodities.
    pub async fn commodities(&self) -> Result<Vec<Commodity>> {
        let response = self
            .executor
            .execute(&commodities_request(self.options.timeout))
            .await?;
        decode_commodities(&response)
    }

    pub async fn commodity(&self, code: &str) -> Result<Commodity> {
        let request = commodity_request(code, self.options.timeout)?;
        let response = self.executor.execute(&request).await?;
        decode_commodity(&response)
    }

    /// Runs a raw request through the retry loop and returns every attempt.
    pub async fn execute_traced(&self, request: &ApiRequest) -> Execution {
        self.executor.execute_traced(request).await
    }

    /// Releases the connection pool.
    pub fn close(self) {
        #[cfg(feature = "tracing")]
        tracing::debug!(base_url = %self.options.base_url, "async client closed");
    }
}

/// Page-by-page walk over a historical query, created by
/// [`OilPriceClient::historical_pages`].
///
/// Ends after the last page the API reports, before an empty page, or after
/// yielding an error.
pub struct HistoricalPages<'a, T = ReqwestTransport> {
    client: &'a OilPriceClient<T>,
    cursor: PageCursor,
}

impl<T: AsyncTransport> HistoricalPages<'_, T> {
    pub async fn next_page(&mut self) -> Result<Option<HistoricalPage>> {
        let Some(query) = self.cursor.pending() else {
            return Ok(None);
        };
        let fetched = self.client.historical(query).await;
        self.cursor.advance(fetched).transpose()
    }
}
