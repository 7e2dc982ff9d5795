//! Basic example demonstrating a form login followed by cookie-carrying calls.
//!
//! This example shows how to:
//! - Create a client from a JSON config
//! - Post a form and keep the session cookie
//! - Pass per-call query options and hooks
//! - Export the cookie store
//!
//! Run with: `cargo run --example basic_fetch`

use fetchwell::{hook, CallOption, Client, Config, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("fetchwell=debug,basic_fetch=info")
        .init();

    let config: Config = serde_json::from_str(
        r#"{
            "userAgent": "fetchwell-demo/0.1",
            "headers": { "Referer": "https://httpbin.org/" },
            "timeoutMs": 10000
        }"#,
    )
    .map_err(|e| Error::ConfigurationError(format!("Invalid config: {}", e)))?;

    let client = Client::from_config(config)?;

    // Reject server errors for every call of this client
    client.set_response_hook(Some(hook::response_hook(|status, outcome| {
        let body = outcome?;
        if status >= 500 {
            return Err(Error::hook(format!("server answered {status}")));
        }
        Ok(body)
    })));

    println!("=== Cookie Example ===");
    client
        .get("https://httpbin.org/cookies/set/session/abc123", [])
        .await?;

    let echoed = client.get("https://httpbin.org/cookies", []).await?;
    println!("Server sees: {}", echoed.text());

    for (url, cookies) in client.cookies().export_all() {
        for cookie in cookies {
            println!("{url} set {}={}", cookie.name(), cookie.value());
        }
    }
    println!();

    println!("=== Form POST Example ===");
    let response = client
        .post(
            "https://httpbin.org/post",
            [("user", "admin"), ("password", "admin")],
            [CallOption::query([("source", "demo")])],
        )
        .await?;

    println!("Status code: {}", response.status);
    println!("Request latency: {:?}", response.latency);
    println!("Attempts: {}", response.attempts);
    println!();

    println!("=== Isolated Call Example ===");
    let isolated = client
        .get("https://httpbin.org/cookies", [CallOption::NoCookie])
        .await?;
    println!("Without the store: {}", isolated.text());

    Ok(())
}
