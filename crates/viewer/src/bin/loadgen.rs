//! Traffic generator: fire N hits at one product.
//!
//! Usage: loadgen <product-id> [count=1]
//! The target server comes from API_BASE (default http://localhost:3000).

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(product) = args.next() else {
        eprintln!("Usage: loadgen <product-id> [count=1]");
        std::process::exit(1);
    };
    let count: u32 = args
        .next()
        .map(|c| c.parse())
        .transpose()
        .context("count must be a number")?
        .unwrap_or(1);

    let base =
        std::env::var("API_BASE").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let url = format!("{}/api/products/{}/hit", base.trim_end_matches('/'), product);

    let client = reqwest::Client::new();
    for i in 1..=count {
        let response = client.post(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            eprintln!("[{}/{}] request failed with status {}: {}", i, count, status, body);
            std::process::exit(1);
        }
        println!("[{}/{}] {}", i, count, body);
    }

    Ok(())
}
