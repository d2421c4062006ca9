//! Basic example demonstrating simple GET and POST requests.
//!
//! This example shows how to:
//! - Create a client with a base URL and defaults
//! - Fetch straight into a typed value
//! - Keep the raw response with status, headers and metadata
//! - Send JSON bodies with POST
//!
//! Run with: `cargo run --example basic_fetch`

use refetch::{Client, Error, FetchOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("refetch=debug,basic_fetch=info")
        .init();

    // Create a client for the JSONPlaceholder API
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .build()?;

    println!("=== Typed Fetch Example ===");
    // Decode the response body straight into a struct
    let post: Post = client.fetch("/posts/1", FetchOptions::new()).await?;

    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!();

    println!("=== Raw Fetch Example ===");
    // Keep the whole response when the metadata matters
    let response = client.get("/posts/1").await?;

    println!("Status code: {}", response.status);
    println!("Request latency: {:?}", response.latency);
    println!("Attempts: {}", response.attempts);
    println!("Content-Type: {:?}", response.header("content-type"));
    if let Some(data) = &response.data {
        println!("Body kind: JSON = {}", data.as_json().is_some());
    }
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };

    let created = client
        .fetch_raw("/posts", FetchOptions::new().method(http::Method::POST).json(&new_post)?)
        .await?;
    println!("Created with status: {}", created.status);

    // The same request, phrased with the verb helper and a JSON literal
    let response = client
        .post("/posts", serde_json::json!({ "title": "Hello", "body": "World", "userId": 1 }))
        .await?;
    let echoed: Post = response.decode()?;
    println!("Created post ID: {}", echoed.id);
    println!();

    println!("=== Query Parameters ===");
    let comments = client
        .fetch_raw("/comments", FetchOptions::new().query("postId", "1"))
        .await?;
    if let Some(list) = comments.data.as_ref().and_then(|data| data.as_json()) {
        println!(
            "Comments on post 1: {}",
            list.as_array().map(|a| a.len()).unwrap_or(0)
        );
    }

    Ok(())
}
