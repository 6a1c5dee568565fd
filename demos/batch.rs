use oilprice_http::{ClientOptions, OilPriceClient, PartialFailure, RetryPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = ClientOptions::default().with_retry(RetryPolicy::new(5));
    let client = OilPriceClient::from_env(options)?;

    let batch = client
        .fetch_many(
            ["BRENT_CRUDE_USD", "WTI_USD", "NATURAL_GAS_USD", "NOT_A_CODE"],
            PartialFailure::Collect,
        )
        .await?;

    for price in &batch.prices {
        println!("ok: {} = {} {}", price.commodity, price.value, price.currency);
    }
    for failure in &batch.failures {
        println!("failed: {} ({})", failure.key, failure.error);
    }

    client.close();
    Ok(())
}
