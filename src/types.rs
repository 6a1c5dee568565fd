use time::{Date, OffsetDateTime};

use crate::{OilPriceError, Result};

/// Latest price of one commodity.
#[derive(Clone, Debug, PartialEq)]
pub struct Price {
    pub commodity: String,
    pub value: f64,
    pub currency: String,
    pub unit: Option<String>,
    /// Price type such as `spot_price`.
    pub kind: String,
    pub timestamp: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistoricalPrice {
    pub commodity: String,
    pub price: f64,
    pub unit: String,
    pub kind: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

/// One page of historical prices.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoricalPage {
    pub prices: Vec<HistoricalPrice>,
    pub meta: PaginationMeta,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commodity {
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub currency: Option<String>,
}

/// Latest quote of a futures contract such as `CL.1`.
#[derive(Clone, Debug, PartialEq)]
pub struct FuturesPrice {
    pub contract: String,
    pub price: f64,
    pub timestamp: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuturesPoint {
    pub date: Date,
    pub price: f64,
}

/// What `fetch_many` does when one key fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PartialFailure {
    /// Abort on the first failure and return it.
    #[default]
    Raise,
    /// Record classified failures and keep going. Unclassified failures
    /// still abort the batch.
    Collect,
}

/// A key that failed inside a collected batch.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyFailure {
    pub key: String,
    pub error: OilPriceError,
}

/// Result of `fetch_many`. Both lists keep the input key order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    pub prices: Vec<Price>,
    pub failures: Vec<KeyFailure>,
}

impl Batch {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Folds one key's result into the batch according to `mode`.
    ///
    /// Returns the error when the batch must stop.
    pub(crate) fn record(
        &mut self,
        mode: PartialFailure,
        key: &str,
        result: Result<Price>,
    ) -> Result<()> {
        match result {
            Ok(price) => {
                self.prices.push(price);
                Ok(())
            }
            Err(error) if mode == PartialFailure::Collect && error.is_classified() => {
                #[cfg(feature = "tracing")]
                tracing::debug!(key, %error, "collected batch failure");
                self.failures.push(KeyFailure {
                    key: key.to_owned(),
                    error,
                });
                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::{Batch, PartialFailure, Price};
    use crate::{OilPriceError, TransportError};

    fn price(code: &str) -> Price {
        Price {
            commodity: code.to_owned(),
            value: 1.0,
            currency: "USD".to_owned(),
            unit: None,
            kind: "spot_price".to_owned(),
            timestamp: datetime!(2024-01-15 10:00:00 UTC),
        }
    }

    fn not_found(code: &str) -> OilPriceError {
        OilPriceError::NotFound {
            message: "missing".to_owned(),
            resource: Some(code.to_owned()),
        }
    }

    #[test]
    fn raise_mode_stops_on_classified_failure() {
        let mut batch = Batch::default();
        batch
            .record(PartialFailure::Raise, "A", Ok(price("A")))
            .expect("success is recorded");
        let err = batch
            .record(PartialFailure::Raise, "B", Err(not_found("B")))
            .expect_err("raise mode propagates");
        assert!(matches!(err, OilPriceError::NotFound { .. }));
        assert!(batch.failures.is_empty());
    }

    #[test]
    fn collect_mode_keeps_classified_failures() {
        let mut batch = Batch::default();
        batch
            .record(PartialFailure::Collect, "A", Err(not_found("A")))
            .expect("collected");
        batch
            .record(PartialFailure::Collect, "B", Ok(price("B")))
            .expect("success is recorded");
        assert_eq!(batch.prices.len(), 1);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].key, "A");
        assert!(!batch.is_complete());
    }

    #[test]
    fn collect_mode_propagates_unclassified_failures() {
        let mut batch = Batch::default();
        let err = batch
            .record(
                PartialFailure::Collect,
                "A",
                Err(OilPriceError::Transport(TransportError::Connect(
                    "refused".to_owned(),
                ))),
            )
            .expect_err("unclassified errors are never absorbed");
        assert!(matches!(err, OilPriceError::Transport(_)));
        assert!(batch.failures.is_empty());
    }

    #[test]
    fn raise_is_the_default_mode() {
        assert_eq!(PartialFailure::default(), PartialFailure::Raise);
    }
}
