//! 传输层
//!
//! 行协议只依赖 [`Transport`] 提供的读写两端，具体连接方式由实现决定。

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::debug;

use crate::error::{ProtocolError, Result};
use crate::CONNECT_TIMEOUT;

/// 连接参数
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// 解析加全部连接尝试的总时限
    pub connect_timeout: Duration,
    /// TCP nodelay
    pub nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            nodelay: true, // 聊天行很短
        }
    }
}

/// 可分离为读写两端的双向字节流
pub trait Transport: Send + Sync + Sized {
    type Reader: AsyncRead + Unpin + Send;
    type Writer: AsyncWrite + Unpin + Send;

    /// 连接到 "host:port"
    fn connect(
        addr: &str,
        config: &TransportConfig,
    ) -> impl std::future::Future<Output = Result<Self>> + Send;

    fn split(self) -> (Self::Reader, Self::Writer);
}

/// TCP 传输
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl Transport for TcpTransport {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn connect(addr: &str, config: &TransportConfig) -> Result<Self> {
        let stream = timeout(config.connect_timeout, connect_any(addr))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)??;

        stream.set_nodelay(config.nodelay)?;
        debug!(
            "TCP connected to {} via {:?} (local {:?})",
            addr,
            stream.peer_addr().ok(),
            stream.local_addr().ok()
        );

        Ok(Self { stream })
    }

    fn split(self) -> (Self::Reader, Self::Writer) {
        self.stream.into_split()
    }
}

impl TcpTransport {
    /// 实际连上的远端地址
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}

/// 按解析顺序逐个尝试，返回第一个成功的连接
///
/// "localhost" 常常先解析出 ::1，而服务器可能只监听 IPv4。
async fn connect_any(addr: &str) -> Result<TcpStream> {
    let mut last_error = None;

    for candidate in lookup_host(addr).await? {
        match TcpStream::connect(candidate).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", candidate, e);
                last_error = Some(e);
            }
        }
    }

    Err(ProtocolError::Io(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("no addresses for {}", addr))
    })))
}
