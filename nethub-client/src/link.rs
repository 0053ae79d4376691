//! HTTP 链接检测
//!
//! 对给定 URL 发 HEAD 请求，根据状态码给出描述和有效性判定。
//! 所有失败都编码在 [`LinkCheckResult`] 中，检测本身从不返回错误。

use std::error::Error as StdError;
use std::fmt;
use std::time::Instant;

use protocol::{is_valid_status, status_phrase};
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use tokio::net::lookup_host;
use tracing::{debug, info};

use crate::config::LinkConfig;
use crate::error::LinkError;

/// 传输层失败时的状态码
pub const TRANSPORT_FAILURE: i32 = -1;

/// 单次检测结果，构造后不可修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCheckResult {
    url: String,
    valid: bool,
    status_code: i32,
    message: String,
    response_time_ms: u64,
}

impl LinkCheckResult {
    fn failure(url: &str, message: String, started: Instant) -> Self {
        Self {
            url: url.to_string(),
            valid: false,
            status_code: TRANSPORT_FAILURE,
            message,
            response_time_ms: elapsed_ms(started),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 状态码在 [200, 400) 内
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// HTTP 状态码，传输层失败时为 [`TRANSPORT_FAILURE`]
    pub fn status_code(&self) -> i32 {
        self.status_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// 从开始检测到得出结论的耗时（毫秒）
    pub fn response_time_ms(&self) -> u64 {
        self.response_time_ms
    }
}

impl fmt::Display for LinkCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - {} (Status: {}, Time: {}ms)",
            if self.valid { "✓" } else { "✗" },
            self.url,
            self.message,
            self.status_code,
            self.response_time_ms
        )
    }
}

/// 链接检测客户端
///
/// 不保留空闲连接，两次检测之间没有共享状态。
#[derive(Clone, Debug)]
pub struct LinkValidationClient {
    client: Client,
}

impl LinkValidationClient {
    pub fn new(config: LinkConfig) -> Result<Self, LinkError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .redirect(Policy::limited(config.max_redirects))
            .user_agent(config.user_agent)
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()?;

        Ok(Self { client })
    }

    /// 检测一个 URL
    pub async fn check_link(&self, url: &str) -> LinkCheckResult {
        let started = Instant::now();

        let parsed = match parse_url(url) {
            Ok(parsed) => parsed,
            Err(detail) => {
                debug!("Rejected {:?}: {}", url, detail);
                return LinkCheckResult::failure(
                    url,
                    format!("Invalid URL format: {}", detail),
                    started,
                );
            }
        };

        // 先单独解析域名，才能把"找不到主机"和其他连接错误区分开
        if let Some(domain) = parsed.domain() {
            let port = parsed.port_or_known_default().unwrap_or(80);
            let resolved = match lookup_host((domain, port)).await {
                Ok(mut addrs) => addrs.next().is_some(),
                Err(e) => {
                    debug!("Failed to resolve {}: {}", domain, e);
                    false
                }
            };
            if !resolved {
                return LinkCheckResult::failure(url, format!("Unknown host: {}", domain), started);
            }
        }

        let result = match self.client.head(parsed).send().await {
            Ok(response) => {
                let status_code = i32::from(response.status().as_u16());
                let response_time_ms = elapsed_ms(started);
                drop(response);

                LinkCheckResult {
                    url: url.to_string(),
                    valid: is_valid_status(status_code),
                    status_code,
                    message: status_phrase(status_code).into_owned(),
                    response_time_ms,
                }
            }
            Err(e) => LinkCheckResult::failure(
                url,
                format!("Connection error: {}", error_chain(&e)),
                started,
            ),
        };

        info!("{}", result);
        result
    }
}

/// 只接受 http 和 https
fn parse_url(url: &str) -> Result<Url, String> {
    let parsed = Url::parse(url).map_err(|e| e.to_string())?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(format!("unsupported protocol: {}", other)),
    }
}

/// 把错误及其全部 source 拼成一行
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn checker() -> LinkValidationClient {
        LinkValidationClient::new(LinkConfig::default()).unwrap()
    }

    fn checker_with_timeout(timeout: Duration) -> LinkValidationClient {
        LinkValidationClient::new(LinkConfig {
            connect_timeout: timeout,
            read_timeout: timeout,
            ..Default::default()
        })
        .unwrap()
    }

    /// 每个请求都延迟 `delay` 才应答的 HTTP 后端，`/start` 重定向到 `/end`
    async fn spawn_slow_backend(delay: Duration) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&chunk[..n]),
                        }
                    }

                    tokio::time::sleep(delay).await;
                    let response: &[u8] = if request.starts_with(b"HEAD /start ") {
                        b"HTTP/1.1 302 Found\r\nLocation: /end\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    } else {
                        b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    };
                    let _ = stream.write_all(response).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_ok_is_valid() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("HEAD", "/ok")
            .match_header("user-agent", "NetHub-LinkChecker/1.0")
            .with_status(200)
            .create_async()
            .await;

        let url = format!("{}/ok", server.url());
        let result = checker().check_link(&url).await;

        assert!(result.is_valid());
        assert_eq!(result.status_code(), 200);
        assert_eq!(result.message(), "OK");
        assert_eq!(result.url(), url);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_is_invalid() {
        let mut server = Server::new_async().await;
        server.mock("HEAD", "/missing").with_status(404).create_async().await;

        let result = checker()
            .check_link(&format!("{}/missing", server.url()))
            .await;

        assert!(!result.is_valid());
        assert_eq!(result.status_code(), 404);
        assert_eq!(result.message(), "Not Found");
    }

    #[tokio::test]
    async fn test_server_error_and_unmapped_codes() {
        let mut server = Server::new_async().await;
        server.mock("HEAD", "/down").with_status(503).create_async().await;
        server.mock("HEAD", "/teapot").with_status(418).create_async().await;
        let client = checker();

        let down = client.check_link(&format!("{}/down", server.url())).await;
        assert_eq!(down.status_code(), 503);
        assert_eq!(down.message(), "Service Unavailable");
        assert!(!down.is_valid());

        let teapot = client.check_link(&format!("{}/teapot", server.url())).await;
        assert_eq!(teapot.status_code(), 418);
        assert_eq!(teapot.message(), "HTTP 418");
        assert!(!teapot.is_valid());
    }

    #[tokio::test]
    async fn test_redirect_is_followed() {
        let mut server = Server::new_async().await;
        let target = format!("{}/new-home", server.url());
        server
            .mock("HEAD", "/old-home")
            .with_status(307)
            .with_header("location", &target)
            .create_async()
            .await;
        let landing = server
            .mock("HEAD", "/new-home")
            .with_status(204)
            .create_async()
            .await;

        let result = checker()
            .check_link(&format!("{}/old-home", server.url()))
            .await;

        assert_eq!(result.status_code(), 204);
        assert_eq!(result.message(), "No Content");
        assert!(result.is_valid());
        landing.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_url_format() {
        let client = checker();

        let result = client.check_link("not a url").await;
        assert!(!result.is_valid());
        assert_eq!(result.status_code(), TRANSPORT_FAILURE);
        assert!(result.message().starts_with("Invalid URL format: "));

        let result = client.check_link("ftp://example.com/file.txt").await;
        assert_eq!(result.status_code(), TRANSPORT_FAILURE);
        assert_eq!(result.message(), "Invalid URL format: unsupported protocol: ftp");
    }

    #[tokio::test]
    async fn test_unknown_host() {
        let result = checker()
            .check_link("http://nethub-link-check.invalid/")
            .await;

        assert!(!result.is_valid());
        assert_eq!(result.status_code(), TRANSPORT_FAILURE);
        assert_eq!(result.message(), "Unknown host: nethub-link-check.invalid");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = checker().check_link(&format!("http://{}/", addr)).await;

        assert!(!result.is_valid());
        assert_eq!(result.status_code(), TRANSPORT_FAILURE);
        assert!(
            result.message().starts_with("Connection error: "),
            "unexpected message: {}",
            result.message()
        );
    }

    #[tokio::test]
    async fn test_response_time_covers_attempt() {
        let mut server = Server::new_async().await;
        server.mock("HEAD", "/").with_status(200).create_async().await;

        let started = Instant::now();
        let result = checker().check_link(&server.url()).await;
        let wall = u64::try_from(started.elapsed().as_millis()).unwrap();

        assert!(result.response_time_ms() <= wall);
    }

    #[tokio::test]
    async fn test_read_timeout_applies_per_hop() {
        // 每跳都在读取超时内应答，但整条重定向链超过了它
        let addr = spawn_slow_backend(Duration::from_millis(600)).await;
        let client = checker_with_timeout(Duration::from_millis(1000));

        let result = client.check_link(&format!("http://{}/start", addr)).await;

        assert!(result.is_valid(), "unexpected result: {}", result);
        assert_eq!(result.status_code(), 200);
        assert!(result.response_time_ms() >= 1200);
    }

    #[tokio::test]
    async fn test_response_time_covers_failed_attempt() {
        // 接受连接但从不应答
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let started = Instant::now();
        let result = checker_with_timeout(Duration::from_millis(300))
            .check_link(&format!("http://{}/", addr))
            .await;
        let wall = u64::try_from(started.elapsed().as_millis()).unwrap();

        assert!(!result.is_valid());
        assert_eq!(result.status_code(), TRANSPORT_FAILURE);
        assert!(
            result.message().starts_with("Connection error: "),
            "unexpected message: {}",
            result.message()
        );
        assert!(result.response_time_ms() >= 300, "too fast: {}", result);
        assert!(result.response_time_ms() <= wall);
    }

    #[test]
    fn test_display() {
        let result = LinkCheckResult {
            url: "https://example.com".to_string(),
            valid: true,
            status_code: 200,
            message: "OK".to_string(),
            response_time_ms: 42,
        };
        assert_eq!(
            result.to_string(),
            "[✓] https://example.com - OK (Status: 200, Time: 42ms)"
        );

        let failed = LinkCheckResult {
            url: "nope".to_string(),
            valid: false,
            status_code: TRANSPORT_FAILURE,
            message: "Invalid URL format: relative URL without a base".to_string(),
            response_time_ms: 0,
        };
        assert_eq!(
            failed.to_string(),
            "[✗] nope - Invalid URL format: relative URL without a base (Status: -1, Time: 0ms)"
        );
    }
}
