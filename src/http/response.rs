//! Upstream response types.
//!
//! # Responsibilities
//! - Carry a successful JSON object with the URL it was served from
//! - Best-effort decode of error bodies (JSON, else text, else none)
//! - Extract the informational `Retry-After` header

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Serialize;
use serde_json::{Map, Value};

/// A successful upstream answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawResponse {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    /// The top-level JSON object.
    pub data: Map<String, Value>,
}

/// Decoded body of a non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    /// `None` for an empty body.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Some(Self::Json(value)),
            Err(_) => Some(Self::Text(String::from_utf8_lossy(bytes).into_owned())),
        }
    }

    /// RDAP error `title`, when the body is an RDAP error object.
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Json(value) => value.get("title").and_then(Value::as_str),
            Self::Text(_) => None,
        }
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
