//! Integration tests for the HTTP transport adapter

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use rawpull_net::{begin_conditional_get, parse_url, NetClient, ResponseMeta};

    #[tokio::test]
    async fn test_conditional_get_returns_body_on_200() {
        let server = MockServer::start();
        let content = b"raw disk image bytes";

        let mock = server.mock(|when, then| {
            when.method(GET).path("/disk.raw.xz");
            then.status(200)
                .header("etag", "\"abc123\"")
                .header("content-length", content.len().to_string())
                .body(content);
        });

        let client = NetClient::with_defaults().unwrap();
        let url = server.url("/disk.raw.xz");

        let response = begin_conditional_get(&client, &url, None).await.unwrap();
        let meta = ResponseMeta::from_response(&response);

        mock.assert();
        assert_eq!(meta.etag.as_deref(), Some("\"abc123\""));
        assert_eq!(meta.content_length, Some(content.len() as u64));

        let body = response.bytes().await.unwrap();
        assert_eq!(&body[..], content);
    }

    #[tokio::test]
    async fn test_conditional_get_sends_if_none_match() {
        let server = MockServer::start();

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/disk.raw.xz")
                .header("if-none-match", "\"abc123\"");
            then.status(304);
        });

        let client = NetClient::with_defaults().unwrap();
        let url = server.url("/disk.raw.xz");

        let response = begin_conditional_get(&client, &url, Some("\"abc123\""))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(response.status().as_u16(), 304);
    }

    #[tokio::test]
    async fn test_server_error_status_is_an_error() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(GET).path("/missing.raw.xz");
            then.status(404);
        });

        let client = NetClient::with_defaults().unwrap();
        let url = server.url("/missing.raw.xz");

        let err = begin_conditional_get(&client, &url, None).await.unwrap_err();
        assert!(matches!(
            err,
            rawpull_errors::Error::Network(rawpull_errors::NetworkError::HttpError {
                status: 404,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_url() {
        assert!(parse_url("https://example.com/disk.raw.xz").is_ok());
        assert!(parse_url("not a url").is_err());
    }
}
