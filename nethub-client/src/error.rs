//! 客户端错误类型

use std::time::Duration;

use protocol::ProtocolError;
use thiserror::Error;

/// 建立聊天会话失败
///
/// 只在 `connect` 中同步返回；会话建立之后的断线通过状态回调通知。
#[derive(Error, Debug)]
pub enum ChatError {
    /// 身份为空或包含换行符
    #[error("Invalid identity: {reason}")]
    InvalidIdentity { reason: &'static str },

    /// 无法连接到服务器
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: ProtocolError,
    },

    /// 身份行发送失败
    #[error("Failed to send identity: {0}")]
    Handshake(#[source] ProtocolError),
}

/// 健康检测失败
#[derive(Error, Debug)]
pub enum ProbeError {
    /// 未调用 initialize 或已关闭
    #[error("Socket not initialized")]
    NotInitialized,

    /// 服务器地址解析失败
    #[error("Failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// 等待响应超时
    #[error("No response within {} ms", .after.as_millis())]
    Timeout { after: Duration },

    /// 其他 IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout { .. })
    }
}

/// 链接检测客户端构建失败
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
