use serde::Deserialize;

/// `{"status": "success", "data": ..., "meta": {...}}`
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[allow(dead_code)]
    #[serde(default)]
    pub status: Option<String>,
    pub data: T,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
pub struct PriceRecord {
    #[serde(alias = "commodity_name")]
    pub code: String,
    pub price: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    pub created_at: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum HistoricalData {
    Nested { prices: Vec<PriceRecord> },
    Flat(Vec<PriceRecord>),
}

#[derive(Debug, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub has_next: Option<bool>,
    #[serde(default)]
    pub has_prev: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct FuturesRecord {
    #[serde(default)]
    pub contract: Option<String>,
    pub price: f64,
    #[serde(default, alias = "created_at")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FuturesPointRecord {
    pub date: String,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct CommodityRecord {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CommodityList {
    Nested { commodities: Vec<CommodityRecord> },
    Flat(Vec<CommodityRecord>),
}
