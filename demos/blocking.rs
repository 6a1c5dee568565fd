use oilprice_http::{blocking::OilPriceClient, ClientOptions, HistoricalQuery};

fn main() -> anyhow::Result<()> {
    let client = OilPriceClient::from_env(ClientOptions::default())?;

    for commodity in client.commodities()?.iter().take(5) {
        println!("{} - {}", commodity.code, commodity.name);
    }

    let rows = client.historical_all(&HistoricalQuery::new("WTI_USD"))?;
    println!("fetched {} rows from the past year", rows.len());

    client.close();
    Ok(())
}
