//! UDP 健康检测客户端
//!
//! 每次调用发送一个请求数据报并阻塞等待一个响应数据报，没有后台线程。
//! 协议里没有序号，上一次超时请求的迟到响应可能被当成本次的响应。

use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ProbeConfig;
use crate::error::ProbeError;

/// 健康检测客户端
///
/// 克隆出的实例共享同一个 socket，便于交给后台任务执行单次请求。
#[derive(Clone, Debug)]
pub struct DatagramProbeClient {
    config: ProbeConfig,
    socket: Option<Arc<UdpSocket>>,
    server: Option<SocketAddr>,
}

impl DatagramProbeClient {
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config,
            socket: None,
            server: None,
        }
    }

    /// 解析服务器地址并绑定本地 socket
    ///
    /// 重复调用会替换旧的 socket。
    pub fn initialize(&mut self) -> Result<(), ProbeError> {
        let server = resolve(&self.config.server_addr)?;

        let local: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.set_read_timeout(Some(self.config.timeout))?;
        socket.set_write_timeout(Some(self.config.timeout))?;

        info!(
            "Probe socket bound to {} for server {}",
            socket.local_addr()?,
            server
        );
        self.socket = Some(Arc::new(socket));
        self.server = Some(server);
        Ok(())
    }

    /// 发送命令并等待一个响应
    ///
    /// 响应超过接收缓冲区的部分被丢弃。
    pub fn send_command(&self, command: impl AsRef<str>) -> Result<String, ProbeError> {
        let (Some(socket), Some(server)) = (self.socket.as_ref(), self.server) else {
            return Err(ProbeError::NotInitialized);
        };
        let command = command.as_ref();

        socket
            .send_to(command.as_bytes(), server)
            .map_err(|e| self.classify(e))?;
        debug!("Sent probe {:?} to {}", command, server);

        let mut buf = vec![0u8; self.config.buffer_size];
        let (len, from) = socket.recv_from(&mut buf).map_err(|e| self.classify(e))?;
        debug!("Received {} bytes from {}", len, from);

        Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
    }

    /// 释放 socket，可重复调用
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!("Probe socket closed");
        }
        self.server = None;
    }

    pub fn is_active(&self) -> bool {
        self.socket.is_some()
    }

    /// 本地绑定地址
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|socket| socket.local_addr().ok())
    }

    fn classify(&self, error: io::Error) -> ProbeError {
        match error.kind() {
            // 读超时在 Unix 上表现为 WouldBlock，在 Windows 上为 TimedOut
            ErrorKind::WouldBlock | ErrorKind::TimedOut => ProbeError::Timeout {
                after: self.config.timeout,
            },
            _ => ProbeError::Io(error),
        }
    }
}

/// 解析服务器地址，优先使用 IPv4
fn resolve(addr: &str) -> Result<SocketAddr, ProbeError> {
    let resolve_error = |source: io::Error| ProbeError::Resolve {
        host: addr.to_string(),
        source,
    };

    let candidates: Vec<SocketAddr> = addr.to_socket_addrs().map_err(resolve_error)?.collect();
    candidates
        .iter()
        .find(|candidate| candidate.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| resolve_error(io::Error::new(ErrorKind::NotFound, "no addresses found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::ProbeCommand;
    use std::thread;
    use std::time::{Duration, Instant};

    /// 启动模拟健康检测服务器，对前 `requests` 个请求调用 `reply`
    fn spawn_server<F>(requests: usize, reply: F) -> (SocketAddr, thread::JoinHandle<()>)
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = socket.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 2048];
            for _ in 0..requests {
                let (len, from) = socket.recv_from(&mut buf).unwrap();
                socket.send_to(&reply(&buf[..len]), from).unwrap();
            }
        });
        (addr, handle)
    }

    fn client_for(addr: SocketAddr, timeout: Duration) -> DatagramProbeClient {
        DatagramProbeClient::new(ProbeConfig {
            server_addr: addr.to_string(),
            timeout,
            ..Default::default()
        })
    }

    #[test]
    fn test_send_before_initialize_sends_nothing() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let client = client_for(server.local_addr().unwrap(), Duration::from_secs(1));

        assert!(!client.is_active());
        assert!(matches!(
            client.send_command("PING"),
            Err(ProbeError::NotInitialized)
        ));

        let mut buf = [0u8; 16];
        assert!(server.recv_from(&mut buf).is_err());
    }

    #[test]
    fn test_command_roundtrip() {
        let (addr, server) = spawn_server(3, |request| match request {
            b"PING" => b"PONG".to_vec(),
            b"STATUS" => b"UP uptime=42s".to_vec(),
            other => [b"ECHO ".as_slice(), other].concat(),
        });

        let mut client = client_for(addr, Duration::from_secs(5));
        client.initialize().unwrap();
        assert!(client.is_active());
        assert!(client.local_addr().is_some());

        assert_eq!(client.send_command(ProbeCommand::Ping).unwrap(), "PONG");
        assert_eq!(client.send_command(ProbeCommand::Status).unwrap(), "UP uptime=42s");
        assert_eq!(client.send_command("INFO").unwrap(), "ECHO INFO");

        server.join().unwrap();
    }

    #[test]
    fn test_no_reply_times_out() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut client = client_for(silent.local_addr().unwrap(), Duration::from_millis(200));
        client.initialize().unwrap();

        let started = Instant::now();
        let err = client.send_command(ProbeCommand::Ping).unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {err}");
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(err.to_string(), "No response within 200 ms");
    }

    #[test]
    fn test_reply_at_buffer_size_is_complete() {
        let (addr, server) = spawn_server(1, |_| vec![b'a'; 1024]);
        let mut client = client_for(addr, Duration::from_secs(5));
        client.initialize().unwrap();

        let reply = client.send_command(ProbeCommand::Info).unwrap();
        assert_eq!(reply.len(), 1024);
        assert!(reply.bytes().all(|b| b == b'a'));
        server.join().unwrap();
    }

    #[test]
    fn test_oversized_reply_is_truncated() {
        let (addr, server) = spawn_server(1, |_| vec![b'z'; 1500]);
        let mut client = client_for(addr, Duration::from_secs(5));
        client.initialize().unwrap();

        assert_eq!(client.send_command(ProbeCommand::Info).unwrap().len(), 1024);
        server.join().unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut client = client_for(silent.local_addr().unwrap(), Duration::from_millis(100));
        client.initialize().unwrap();

        client.close();
        client.close();
        assert!(!client.is_active());
        assert!(client.local_addr().is_none());
        assert!(matches!(
            client.send_command("PING"),
            Err(ProbeError::NotInitialized)
        ));
    }

    #[test]
    fn test_clone_survives_close_of_original() {
        let (addr, server) = spawn_server(1, |_| b"PONG".to_vec());
        let mut client = client_for(addr, Duration::from_secs(5));
        client.initialize().unwrap();

        let worker_copy = client.clone();
        client.close();
        assert_eq!(worker_copy.send_command("PING").unwrap(), "PONG");
        server.join().unwrap();
    }

    #[test]
    fn test_unresolvable_server() {
        let mut client = DatagramProbeClient::new(ProbeConfig {
            server_addr: "localhost".to_string(), // 缺少端口
            ..Default::default()
        });
        assert!(matches!(
            client.initialize(),
            Err(ProbeError::Resolve { .. })
        ));
        assert!(!client.is_active());
    }
}
