use serde::de::DeserializeOwned;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
};

use crate::{
    wire::{self, CommodityList, Envelope, HistoricalData},
    ApiResponse, Commodity, FuturesPoint, FuturesPrice, HistoricalPage, HistoricalPrice,
    OilPriceError, PaginationMeta, Price, Result,
};

const BODY_PREVIEW_LIMIT: usize = 256;

pub(crate) fn decode_envelope<T: DeserializeOwned>(response: &ApiResponse) -> Result<Envelope<T>> {
    serde_json::from_str::<Envelope<T>>(&response.body).map_err(|err| {
        OilPriceError::Decode(format!(
            "invalid response JSON: {err}; body: {}",
            preview(&response.body)
        ))
    })
}

pub(crate) fn decode_price(response: &ApiResponse) -> Result<Price> {
    let record = decode_envelope::<wire::PriceRecord>(response)?.data;
    Ok(Price {
        timestamp: parse_timestamp(&record.created_at)?,
        commodity: record.code,
        value: finite(record.price)?,
        currency: record.currency.unwrap_or_else(|| "USD".to_owned()),
        unit: record.unit,
        kind: record.kind.unwrap_or_else(|| "spot_price".to_owned()),
    })
}

/// Decodes one historical page. `page` and `per_page` fill in pagination
/// fields the API left out.
pub(crate) fn decode_historical(
    response: &ApiResponse,
    page: u32,
    per_page: u32,
) -> Result<HistoricalPage> {
    let envelope = decode_envelope::<HistoricalData>(response)?;
    let records = match envelope.data {
        HistoricalData::Nested { prices } | HistoricalData::Flat(prices) => prices,
    };

    let prices = records
        .into_iter()
        .map(decode_historical_price)
        .collect::<Result<Vec<_>>>()?;

    let count = prices.len() as u64;
    let meta = match envelope.meta {
        Some(meta) => PaginationMeta {
            page: meta.page.unwrap_or(page),
            per_page: meta.per_page.unwrap_or(per_page),
            total: meta.total.unwrap_or(count),
            total_pages: meta.total_pages.unwrap_or(1),
            has_next: meta.has_next.unwrap_or(false),
            has_prev: meta.has_prev.unwrap_or(false),
        },
        None => PaginationMeta {
            page,
            per_page,
            total: count,
            total_pages: 1,
            has_next: count == u64::from(per_page),
            has_prev: page > 1,
        },
    };

    Ok(HistoricalPage { prices, meta })
}

fn decode_historical_price(record: wire::PriceRecord) -> Result<HistoricalPrice> {
    Ok(HistoricalPrice {
        created_at: parse_timestamp(&record.created_at)?,
        commodity: record.code,
        price: finite(record.price)?,
        unit: record.unit.unwrap_or_else(|| "barrel".to_owned()),
        kind: record.kind.unwrap_or_else(|| "spot_price".to_owned()),
    })
}

pub(crate) fn decode_commodities(response: &ApiResponse) -> Result<Vec<Commodity>> {
    let records = match decode_envelope::<CommodityList>(response)?.data {
        CommodityList::Nested { commodities } | CommodityList::Flat(commodities) => commodities,
    };
    Ok(records.into_iter().map(into_commodity).collect())
}

pub(crate) fn decode_commodity(response: &ApiResponse) -> Result<Commodity> {
    decode_envelope::<wire::CommodityRecord>(response).map(|envelope| into_commodity(envelope.data))
}

/// `contract` stands in when the payload does not echo it.
pub(crate) fn decode_futures_price(response: &ApiResponse, contract: &str) -> Result<FuturesPrice> {
    let record = decode_envelope::<wire::FuturesRecord>(response)?.data;
    Ok(FuturesPrice {
        contract: record
            .contract
            .unwrap_or_else(|| contract.trim().to_owned()),
        price: finite(record.price)?,
        timestamp: record.timestamp.as_deref().map(parse_timestamp).transpose()?,
    })
}

pub(crate) fn decode_futures_history(response: &ApiResponse) -> Result<Vec<FuturesPoint>> {
    decode_envelope::<Vec<wire::FuturesPointRecord>>(response)?
        .data
        .into_iter()
        .map(|record| {
            Ok(FuturesPoint {
                date: parse_date(&record.date)?,
                price: finite(record.price)?,
            })
        })
        .collect()
}

fn into_commodity(record: wire::CommodityRecord) -> Commodity {
    Commodity {
        code: record.code,
        name: record.name,
        category: record.category,
        unit: record.unit,
        currency: record.currency,
    }
}

fn parse_timestamp(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|err| OilPriceError::Decode(format!("invalid timestamp '{value}': {err}")))
}

/// Accepts `YYYY-MM-DD`, alone or as the prefix of a full timestamp.
fn parse_date(value: &str) -> Result<Date> {
    let day = value.get(..10).unwrap_or(value);
    Date::parse(day, format_description!("[year]-[month]-[day]"))
        .map_err(|err| OilPriceError::Decode(format!("invalid date '{value}': {err}")))
}

fn finite(value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(OilPriceError::Decode(format!(
            "non-finite price value '{value}' is unsupported"
        )))
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(BODY_PREVIEW_LIMIT) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}
