#![allow(dead_code)]

pub mod architecture;
pub mod fixtures;

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Decode a JSON request body.
pub fn json_body(body: &str) -> serde_json::Value {
    serde_json::from_str(body).expect("request body is JSON")
}

/// Poll `condition` every 10ms until it holds or `wait` elapses.
pub async fn eventually<F>(wait: std::time::Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
