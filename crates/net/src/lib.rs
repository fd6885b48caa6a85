#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! HTTP transport adapter used by the raw disk-image importer.
//!
//! This crate is the concrete implementation of the "HTTP multi-transfer
//! driver" collaborator the import core is designed against: connection
//! pooling, retry/backoff, and conditional-GET support live here so the
//! download state machine in `rawpull-import` only has to deal with a
//! `Response` and its validators.

mod client;

pub use client::{NetClient, NetConfig};

use rawpull_errors::{Error, NetworkError};
use reqwest::Response;
use url::Url;

/// Validators and sizing information extracted from a response's headers,
/// used to build the cache filename and detect truncated transfers.
#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_length: Option<u64>,
}

impl ResponseMeta {
    #[must_use]
    pub fn from_response(response: &Response) -> Self {
        Self {
            etag: client::header_str(response, "etag").map(str::to_string),
            last_modified: client::header_str(response, "last-modified").map(str::to_string),
            content_length: response.content_length(),
        }
    }
}

/// Issue a conditional GET for `url`, sending `If-None-Match: cached_etag`
/// when one is known. Both `200 OK` and `304 Not Modified` are returned as
/// `Ok`; only transport-level failures are errors.
///
/// # Errors
///
/// Returns an error if the request fails after all retry attempts, or the
/// server responds with a client/server error status.
pub async fn begin_conditional_get(
    client: &NetClient,
    url: &str,
    cached_etag: Option<&str>,
) -> Result<Response, Error> {
    let response = client.get_conditional(url, cached_etag).await?;

    if response.status().is_client_error() || response.status().is_server_error() {
        return Err(NetworkError::HttpError {
            status: response.status().as_u16(),
            url: url.to_string(),
            message: response.status().to_string(),
        }
        .into());
    }

    Ok(response)
}

/// Parse and validate a URL.
///
/// # Errors
///
/// Returns an error if the URL string is malformed or invalid according to RFC 3986.
pub fn parse_url(url: &str) -> Result<Url, Error> {
    Url::parse(url).map_err(|e| NetworkError::InvalidUrl(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url() {
        assert!(parse_url("https://example.com/disk.raw.xz").is_ok());
        assert!(parse_url("not a url").is_err());
    }

    #[test]
    fn test_parse_url_rejects_missing_scheme() {
        assert!(parse_url("example.com/disk.raw.xz").is_err());
    }
}
