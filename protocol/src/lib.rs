//! NetHub 客户端共享协议库
//!
//! 包含:
//! - 行编解码 (LineReader, LineWriter)
//! - 传输层抽象 (Transport trait)
//! - 连接封装 (Connection)
//! - 健康检测命令 (ProbeCommand)
//! - HTTP 状态码描述表

mod constants;
mod transport;
mod codec;
mod connection;
mod error;
mod probe;
mod status;

pub use constants::*;
pub use transport::{Transport, TransportConfig, TcpTransport};
pub use codec::{LineReader, LineWriter};
pub use connection::Connection;
pub use error::{ProtocolError, Result};
pub use probe::ProbeCommand;
pub use status::{is_valid_status, status_phrase};
