/// Rate-limited HTTP client for REST upstreams
///
/// Wraps reqwest with the flat rate-limit policy the REST providers get:
/// a rate-limited response earns one fixed-interval sleep and a single
/// retry, then the error surfaces. JSON-RPC calls use the separate
/// exponential schedule in `retry`.
use crate::core::UpstreamError;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Tuning for the rate-limited client
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Flat wait before the single rate-limit retry
    pub rate_limit_wait: Duration,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            rate_limit_wait: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client shared by all REST upstream calls
#[derive(Debug, Clone)]
pub struct RateLimitedClient {
    client: reqwest::Client,
    config: FetchConfig,
}

impl RateLimitedClient {
    pub fn new(config: FetchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// GET a JSON document
    pub async fn get_json(&self, url: &str, headers: HeaderMap) -> Result<Value, UpstreamError> {
        self.send(Method::GET, url, headers, None).await
    }

    /// POST a JSON body and read a JSON document back
    pub async fn post_json(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &Value,
    ) -> Result<Value, UpstreamError> {
        self.send(Method::POST, url, headers, Some(body)).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<&Value>,
    ) -> Result<Value, UpstreamError> {
        let mut retried = false;
        loop {
            let mut request = self
                .client
                .request(method.clone(), url)
                .headers(headers.clone());
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();

            if status.is_success() {
                debug!("{} {} -> {}", method, url, status);
                return response
                    .json::<Value>()
                    .await
                    .map_err(|e| UpstreamError::Payload(e.to_string()));
            }

            // GitHub signals secondary rate limits with 403, most other
            // upstreams use 429
            let rate_limited =
                status.as_u16() == 429 || status.as_u16() == 403;

            if rate_limited && !retried {
                warn!(
                    "rate limited by {} ({}), waiting {:?} before the retry",
                    url, status, self.config.rate_limit_wait
                );
                sleep(self.config.rate_limit_wait).await;
                retried = true;
                continue;
            }

            if rate_limited {
                return Err(UpstreamError::RateLimited {
                    url: url.to_string(),
                });
            }

            return Err(UpstreamError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a fixed sequence of raw HTTP responses on a local port
    async fn serve_script(responses: Vec<&'static str>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_inner = Arc::clone(&hits);

        tokio::spawn(async move {
            for body in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                hits_inner.fetch_add(1, Ordering::SeqCst);
                socket.write_all(body.as_bytes()).await.unwrap();
            }
        });

        (format!("http://{}/", addr), hits)
    }

    fn test_client() -> RateLimitedClient {
        RateLimitedClient::new(FetchConfig {
            rate_limit_wait: Duration::from_millis(10),
            request_timeout: Duration::from_secs(5),
        })
    }

    const OK: &str =
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 13\r\nconnection: close\r\n\r\n{\"ok\": true}\n";
    const LIMITED: &str =
        "HTTP/1.1 429 Too Many Requests\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";
    const BROKEN: &str =
        "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

    #[tokio::test]
    async fn rate_limit_retries_once_then_succeeds() {
        let (url, hits) = serve_script(vec![LIMITED, OK]).await;
        let value = test_client()
            .get_json(&url, HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rate_limit_twice_surfaces_error() {
        let (url, hits) = serve_script(vec![LIMITED, LIMITED]).await;
        let err = test_client()
            .get_json(&url, HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::RateLimited { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn server_error_is_not_retried() {
        let (url, hits) = serve_script(vec![BROKEN]).await;
        let err = test_client()
            .get_json(&url, HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 500, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
