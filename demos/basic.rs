use oilprice_http::{ClientOptions, HistoricalQuery, OilPriceClient};
use time::{Duration, OffsetDateTime};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = OilPriceClient::from_env(ClientOptions::default())?;

    let price = client.fetch_one("BRENT_CRUDE_USD").await?;
    println!(
        "{}: {} {} at {}",
        price.commodity, price.value, price.currency, price.timestamp
    );

    let today = OffsetDateTime::now_utc().date();
    let query = HistoricalQuery::new("WTI_USD").range(today - Duration::days(7), today);
    println!("history route: {}", query.route().path);

    let page = client.historical(&query).await?;
    for row in page.prices {
        println!("{} {} {}", row.created_at, row.commodity, row.price);
    }

    client.close();
    Ok(())
}
