//! Synchronous LLM HTTP client (§6 "Wire: LLM").
//!
//! `reqwest`'s blocking client is deliberate: §5 states the LLM call
//! "blocks the loop for its duration" and this crate preserves that
//! rather than dispatching it to a worker (§9 "Single-threaded blocking
//! on LLM", Open Question resolved in DESIGN.md).

use reqwest::blocking::Client;
use serde_json::{json, Value};

use crate::error::LlmError;

/// Response bodies are capped to roughly 4 KiB, matching the original
/// submission's fixed-size reply buffer (§6).
const RESPONSE_CAP: usize = 4096;

fn request_body(model: &str, system: &str, query: &str) -> Value {
    json!({
        "model": model,
        "system": system,
        "query": query,
        "temperature": 0.00,
        "lastk": 1,
        "session_id": "GenericSession",
    })
}

/// POST to `<endpoint>/dev` and return up to `RESPONSE_CAP` bytes of the
/// response body as text.
pub fn llm_request(
    endpoint: &str,
    api_key: &str,
    model: &str,
    system: &str,
    query: &str,
) -> Result<String, LlmError> {
    let client = Client::new();
    let url = format!("{}/dev", endpoint.trim_end_matches('/'));
    let body = request_body(model, system, query);

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("x-api-key", api_key)
        .json(&body)
        .send()?;

    let mut text = response.text()?;
    if text.len() > RESPONSE_CAP {
        // `String::truncate` panics off a non-UTF-8-char-boundary index;
        // walk back from the cap to the nearest boundary instead of
        // assuming byte 4096 lands cleanly (§7: a malformed/oversized
        // response degrades gracefully, never crashes the loop).
        let mut boundary = RESPONSE_CAP;
        while !text.is_char_boundary(boundary) {
            boundary -= 1;
        }
        text.truncate(boundary);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_wire_contract() {
        let body = request_body("4o-mini", "sys", "query");
        assert_eq!(body["model"], "4o-mini");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["lastk"], 1);
        assert_eq!(body["session_id"], "GenericSession");
    }
}
