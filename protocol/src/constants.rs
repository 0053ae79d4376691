//! 协议常量定义

use std::time::Duration;

/// 聊天服务器默认地址（TCP）
pub const CHAT_SERVER_ADDR: &str = "localhost:5000";

/// 健康检测服务器默认地址（UDP）
pub const PROBE_SERVER_ADDR: &str = "localhost:5002";

/// 单行聊天消息最大长度（字节，不含换行符）
pub const MAX_LINE_LEN: usize = 8192;

/// 探测响应接收缓冲区大小，超出部分被截断
pub const PROBE_BUFFER_SIZE: usize = 1024;

/// 聊天连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 探测等待响应超时（毫秒）
pub const PROBE_TIMEOUT_MS: u64 = 5000;

/// 链接检测连接/读取超时（毫秒）
pub const LINK_TIMEOUT_MS: u64 = 5000;

/// 链接检测最多跟随的重定向次数
pub const MAX_REDIRECTS: usize = 10;

/// 链接检测请求携带的客户端标识
pub const LINK_USER_AGENT: &str = "NetHub-LinkChecker/1.0";

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);

/// 探测超时 Duration
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(PROBE_TIMEOUT_MS);

/// 链接检测超时 Duration
pub const LINK_TIMEOUT: Duration = Duration::from_millis(LINK_TIMEOUT_MS);
