//! Example demonstrating retry budgets and delay policies.
//!
//! This example shows how to:
//! - Disable retries entirely
//! - Configure a retry budget with exponential backoff
//! - Honor `Retry-After` headers from rate-limited APIs
//! - Compute delays from the in-flight call context
//! - Restrict which status codes trigger a retry
//!
//! Run with: `cargo run --example retries`

use refetch::{Client, Error, FetchContext, Retry, RetryDelay};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing to see retry attempts
    tracing_subscriber::fmt()
        .with_env_filter("refetch=info,retries=info")
        .init();

    println!("=== No Retries ===");
    let client_no_retry = Client::builder()
        .base_url("https://httpbin.org")?
        .retry(Retry::Never)
        .build()?;

    // A 503 would normally retry; Retry::Never fails it immediately
    match client_no_retry.get("/status/503").await {
        Ok(_) => println!("Unexpected success"),
        Err(e) => println!("Failed immediately (no retries): {}", e),
    }
    println!();

    println!("=== Exponential Backoff ===");
    println!("Delays: 100ms, 200ms, 400ms (with jitter)");
    let client_exponential = Client::builder()
        .base_url("https://httpbin.org")?
        .retry(3)
        .retry_delay(RetryDelay::exponential(
            Duration::from_millis(100),
            Duration::from_secs(30),
            true, // Adds randomness to prevent thundering herd
        ))
        .timeout(Duration::from_secs(5))
        .build()?;

    // This keeps answering 503, so the budget runs out
    let start = std::time::Instant::now();
    match client_exponential.get("/status/503").await {
        Ok(response) => println!("Response: {}", response.status),
        Err(e) => {
            println!("Failed after retries: {}", e);
            println!("Total time: {:?}", start.elapsed());
        }
    }
    println!();

    println!("=== Retry-After Aware Delays ===");
    // Rate-limited APIs answer 429 with a Retry-After header; this policy
    // waits as instructed, capped so a hostile value cannot stall the call
    let client_rate_limited = Client::builder()
        .base_url("https://httpbin.org")?
        .retry(2)
        .retry_status_codes([429, 503])
        .retry_delay(RetryDelay::retry_after(
            Duration::from_millis(500), // fallback when the header is absent
            Duration::from_secs(10),    // cap on what the server may ask for
        ))
        .build()?;

    match client_rate_limited.get("/status/429").await {
        Ok(response) => println!("Response: {}", response.status),
        Err(e) => println!("Rate limited until the budget ran out: {}", e),
    }
    println!();

    println!("=== Computed Delays ===");
    // Full control: the policy sees the failed attempt and decides
    let client_computed = Client::builder()
        .base_url("https://httpbin.org")?
        .retry(2)
        .retry_delay(RetryDelay::computed(|ctx: &FetchContext| {
            Duration::from_millis(50 * u64::from(ctx.attempt))
        }))
        .build()?;

    match client_computed.get("/status/500").await {
        Ok(response) => println!("Response: {}", response.status),
        Err(e) => println!("Failed with linear-ish delays: {}", e),
    }
    println!();

    println!("=== Restricting Retryable Statuses ===");
    let client_picky = Client::builder()
        .base_url("https://httpbin.org")?
        .retry(5)
        .retry_status_codes([429])
        .build()?;

    // 500 is not in the custom set, so the budget is never touched
    match client_picky.get("/status/500").await {
        Ok(response) => println!("Response: {}", response.status),
        Err(e) => println!("Failed without retrying: {}", e),
    }

    Ok(())
}
