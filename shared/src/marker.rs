//! Freshness marker carried between runs.
//!
//! The collection's `Last-Modified` header is the only state this tool keeps
//! across runs. It is echoed back verbatim in `If-Modified-Since` requests and
//! compared as a timestamp against local data.
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("invalid marker {raw:?}: {reason}")]
pub struct MarkerError {
    raw: String,
    reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marker {
    raw: String,
    timestamp: DateTime<Utc>,
}

impl Marker {
    /// Parses an HTTP date (`Wed, 21 Oct 2015 07:28:00 GMT`).
    pub fn parse(raw: &str) -> Result<Self, MarkerError> {
        let timestamp = DateTime::parse_from_rfc2822(raw.trim())
            .map_err(|e| MarkerError {
                raw: raw.to_string(),
                reason: e.to_string(),
            })?
            .with_timezone(&Utc);

        Ok(Marker {
            raw: raw.trim().to_string(),
            timestamp,
        })
    }

    /// The marker exactly as the server sent it.
    pub fn as_header_value(&self) -> &str {
        &self.raw
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
