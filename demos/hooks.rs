//! Example demonstrating lifecycle hooks.
//!
//! This example shows how to:
//! - Rewrite requests before they are sent
//! - Observe responses before the caller sees them
//! - Inspect failed responses in `on_response_error`
//! - Register per-call hooks that replace the client defaults
//! - Derive a scoped client that inherits hooks and headers
//!
//! Run with: `cargo run --example hooks`

use refetch::{BoxError, Client, Error, FetchContext, FetchOptions};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("refetch=info,hooks=info")
        .init();

    let request_counter = Arc::new(AtomicU64::new(0));
    let counter = request_counter.clone();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .on_request(move |ctx: &mut FetchContext| -> Result<(), BoxError> {
            // Stamp every outgoing request with a sequence number
            let id = counter.fetch_add(1, Ordering::SeqCst);
            ctx.options.headers.insert(
                http::HeaderName::from_static("x-request-id"),
                http::HeaderValue::from_str(&id.to_string())?,
            );
            println!("-> {} {}", ctx.options.method, ctx.request.url_string());
            Ok(())
        })
        .on_response(|ctx: &mut FetchContext| {
            if let Some(response) = &ctx.response {
                println!(
                    "<- {} in {:?} (attempt {})",
                    response.status, response.latency, ctx.attempt
                );
            }
            Ok(())
        })
        .on_response_error(|ctx: &mut FetchContext| {
            if let Some(response) = &ctx.response {
                println!(
                    "!! {} from {}: {:?}",
                    response.status,
                    ctx.request.url_string(),
                    response.data.as_ref().and_then(|data| data.as_json())
                );
            }
            Ok(())
        })
        .build()?;

    println!("=== Hooks on a Successful Call ===");
    let response = client.get("/posts/1").await?;
    println!("Caller sees status: {}", response.status);
    println!();

    println!("=== Hooks on a Failing Call ===");
    // JSONPlaceholder answers 404 for unknown posts; on_response_error
    // fires before the call turns into an error
    match client.get("/posts/999999").await {
        Ok(_) => println!("Unexpected success"),
        Err(e) => println!("Caller sees: {}", e),
    }
    println!();

    println!("=== Per-Call Hooks Replace Defaults ===");
    // A non-empty per-call hook list replaces the defaults for that slot,
    // so the sequence-number hook does not run for this request
    let options = FetchOptions::new().on_request(|ctx: &mut FetchContext| {
        println!("(per-call) -> {}", ctx.request.url_string());
        Ok(())
    });
    let _ = client.fetch_raw("/posts/2", options).await?;
    println!();

    println!("=== Derived Clients Inherit Hooks ===");
    let scoped = client.create(FetchOptions::new().header("x-team", "platform")?);
    let _ = scoped.get("/posts/3").await?;
    println!(
        "Requests stamped so far: {}",
        request_counter.load(Ordering::SeqCst)
    );

    Ok(())
}
