//! 聊天客户端核心实现
//!
//! 持有一条 TCP 行协议长连接。接收循环作为任务跑在网络运行时上，
//! 收到的每一行和断线通知都经由 [`Mailbox`] 投递，回调只在调用
//! [`StreamChatClient::poll_events`] 的线程（UI 线程）上执行。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use protocol::{Connection, LineReader, LineWriter, ProtocolError, TcpTransport, Transport};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::mailbox::{mailbox, Mailbox, Poster};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// 接收循环发给 UI 线程的事件
#[derive(Debug)]
enum ChatEvent {
    /// 收到一行
    Line { session: u64, line: String },
    /// 连接中断
    Lost { session: u64, reason: String },
}

type Callback = Box<dyn FnMut(String)>;

/// 回调属于建立它的那次连接
struct Callbacks {
    session: u64,
    on_message: Callback,
    on_status: Callback,
}

/// 一次连接的全部资源
struct Session {
    id: u64,
    /// 网络线程与 UI 线程共享的运行标志，只由翻转它的一方负责通知
    running: Arc<AtomicBool>,
    writer: LineWriter<OwnedWriteHalf>,
    shutdown_tx: watch::Sender<bool>,
    receiver: JoinHandle<()>,
}

impl Session {
    /// 通知接收循环退出
    fn stop(&self) {
        self.running.store(false, Ordering::Release);
        let _ = self.shutdown_tx.send(true);
        self.receiver.abort();
    }
}

/// 聊天客户端
pub struct StreamChatClient {
    config: ChatConfig,
    runtime: Handle,
    session: Option<Session>,
    callbacks: Option<Callbacks>,
    poster: Poster<ChatEvent>,
    events: Mailbox<ChatEvent>,
    next_session_id: u64,
}

impl StreamChatClient {
    /// `runtime` 必须属于当前线程之外的运行时，同步方法会在其上 `block_on`
    pub fn new(config: ChatConfig, runtime: Handle) -> Self {
        let (poster, events) = mailbox();
        Self {
            config,
            runtime,
            session: None,
            callbacks: None,
            poster,
            events,
            next_session_id: 0,
        }
    }

    /// 每次有事件投递时调用 `waker`，通常用于请求 UI 重绘
    ///
    /// 连接建立之后设置也对当前连接生效。
    pub fn set_waker<F>(&self, waker: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.poster.set_waker(waker);
    }

    /// 连接服务器并发送身份行
    ///
    /// 已有连接时先断开旧连接。成功后立即通过 `on_status` 报告已连接，
    /// 之后收到的行要等 [`poll_events`](Self::poll_events) 才会交给 `on_message`。
    pub fn connect<M, S>(&mut self, identity: &str, on_message: M, on_status: S) -> Result<(), ChatError>
    where
        M: FnMut(String) + 'static,
        S: FnMut(String) + 'static,
    {
        validate_identity(identity)?;
        self.disconnect();
        // 旧连接已收到的行先交给旧回调
        self.poll_events();

        let addr = self.config.server_addr.clone();
        let transport = self
            .runtime
            .block_on(TcpTransport::connect(&addr, &self.config.transport))
            .map_err(|source| ChatError::Connect {
                addr: addr.clone(),
                source,
            })?;

        let (reader, mut writer) = Connection::new(transport).split();
        self.runtime
            .block_on(writer.write_line(identity))
            .map_err(ChatError::Handshake)?;

        self.next_session_id += 1;
        let id = self.next_session_id;
        let running = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.callbacks = Some(Callbacks {
            session: id,
            on_message: Box::new(on_message),
            on_status: Box::new(on_status),
        });
        self.report_status(format!("Connected to chat server at {}", addr));

        let receiver = self.runtime.spawn(receive_loop(
            id,
            reader,
            Arc::clone(&running),
            shutdown_rx,
            self.poster.clone(),
        ));

        self.session = Some(Session {
            id,
            running,
            writer,
            shutdown_tx,
            receiver,
        });

        info!("Connected to {} as {} (session {})", addr, identity, id);
        Ok(())
    }

    /// 发送一行；未连接时什么都不做
    ///
    /// 写失败按断线处理，通过 `on_status` 报告，不返回错误。
    pub fn send_line(&mut self, text: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.running.load(Ordering::Acquire) {
            return;
        }

        let error = match self.runtime.block_on(session.writer.write_line(text)) {
            Ok(()) => return,
            Err(e) => e,
        };

        warn!("Failed to send line: {}", error);
        // 接收循环可能已经先一步发现断线并投递了通知
        if session.running.swap(false, Ordering::AcqRel) {
            if let Some(session) = self.session.take() {
                session.stop();
            }
            self.report_status(format!("Connection lost: {}", error));
        }
    }

    /// 断开连接，可重复调用
    ///
    /// 关闭时的错误转换为状态通知，不向调用方传播。
    pub fn disconnect(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        session.stop();
        let result = self.runtime.block_on(session.writer.shutdown());
        drop(session);

        match result {
            Ok(()) => {
                info!("Disconnected from {}", self.config.server_addr);
                self.report_status("Disconnected".to_string());
            }
            Err(e) => {
                warn!("Error while closing connection: {}", e);
                self.report_status(format!("Error disconnecting: {}", e));
            }
        }
    }

    /// 是否已连接且连接仍然可用
    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.running.load(Ordering::Acquire))
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// 在当前线程上分发接收循环投递的事件，返回分发的数量
    pub fn poll_events(&mut self) -> usize {
        let mut delivered = 0;

        while let Some(event) = self.events.try_recv() {
            match event {
                ChatEvent::Line { session, line } => {
                    // 换了新连接后，旧连接迟到的行直接丢弃
                    if let Some(callbacks) = self.callbacks.as_mut().filter(|c| c.session == session) {
                        (callbacks.on_message)(line);
                        delivered += 1;
                    }
                }
                ChatEvent::Lost { session, reason } => {
                    // 已断开或已换了新连接时，旧连接的断线通知作废
                    if self.session.as_ref().is_some_and(|s| s.id == session) {
                        if let Some(session) = self.session.take() {
                            session.stop();
                        }
                        self.report_status(format!("Connection lost: {}", reason));
                        delivered += 1;
                    }
                }
            }
        }

        delivered
    }

    fn report_status(&mut self, status: String) {
        if let Some(callbacks) = self.callbacks.as_mut() {
            (callbacks.on_status)(status);
        }
    }
}

impl Drop for StreamChatClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
        }
    }
}

/// 身份作为第一行发送，必须非空且不含换行
fn validate_identity(identity: &str) -> Result<(), ChatError> {
    if identity.is_empty() {
        return Err(ChatError::InvalidIdentity {
            reason: "identity must not be empty",
        });
    }
    if identity.contains(['\n', '\r']) {
        return Err(ChatError::InvalidIdentity {
            reason: "identity must be a single line",
        });
    }
    Ok(())
}

/// 接收循环
async fn receive_loop(
    session: u64,
    mut reader: LineReader<OwnedReadHalf>,
    running: Arc<AtomicBool>,
    mut shutdown_rx: watch::Receiver<bool>,
    poster: Poster<ChatEvent>,
) {
    loop {
        tokio::select! {
            result = reader.read_line() => {
                match result {
                    Ok(line) => {
                        if !running.load(Ordering::Acquire) {
                            break;
                        }
                        debug!("Received line ({} bytes)", line.len());
                        if !poster.post(ChatEvent::Line { session, line }) {
                            // UI 侧已销毁
                            break;
                        }
                    }
                    Err(e) => {
                        let reason = match e {
                            ProtocolError::ConnectionClosed => "server closed the connection".to_string(),
                            other => other.to_string(),
                        };
                        if running.swap(false, Ordering::AcqRel) {
                            warn!("Connection lost (session {}): {}", session, reason);
                            poster.post(ChatEvent::Lost { session, reason });
                        } else {
                            debug!("Read ended after disconnect: {}", reason);
                        }
                        break;
                    }
                }
            }

            _ = shutdown_rx.changed() => {
                debug!("Receive loop for session {} stopped", session);
                break;
            }
        }
    }
}
