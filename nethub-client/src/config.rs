//! 客户端配置
//!
//! 默认值来自 `protocol` 中的常量，可被以下环境变量覆盖:
//!
//! | 变量 | 含义 |
//! |------|------|
//! | `NETHUB_CHAT_ADDR` | 聊天服务器地址 |
//! | `NETHUB_CONNECT_TIMEOUT_MS` | 聊天连接超时 |
//! | `NETHUB_PROBE_ADDR` | 健康检测服务器地址 |
//! | `NETHUB_PROBE_TIMEOUT_MS` | 探测等待响应超时 |
//! | `NETHUB_LINK_TIMEOUT_MS` | 链接检测连接/读取超时（分别生效） |

use std::time::Duration;

use protocol::{
    TransportConfig, CHAT_SERVER_ADDR, LINK_TIMEOUT, LINK_USER_AGENT, MAX_REDIRECTS,
    PROBE_BUFFER_SIZE, PROBE_SERVER_ADDR, PROBE_TIMEOUT,
};
use tracing::warn;

/// 聊天客户端配置
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// 服务器地址，格式为 "host:port"
    pub server_addr: String,
    pub transport: TransportConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            server_addr: CHAT_SERVER_ADDR.to_string(),
            transport: TransportConfig::default(),
        }
    }
}

/// 健康检测客户端配置
#[derive(Clone, Debug)]
pub struct ProbeConfig {
    /// 服务器地址，格式为 "host:port"
    pub server_addr: String,
    /// 等待单个响应的最长时间
    pub timeout: Duration,
    /// 接收缓冲区大小，更长的响应会被截断
    pub buffer_size: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            server_addr: PROBE_SERVER_ADDR.to_string(),
            timeout: PROBE_TIMEOUT,
            buffer_size: PROBE_BUFFER_SIZE,
        }
    }
}

/// 链接检测客户端配置
#[derive(Clone, Debug)]
pub struct LinkConfig {
    pub connect_timeout: Duration,
    /// 单次读取的等待上限，每一跳重定向各自计时
    pub read_timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: LINK_TIMEOUT,
            read_timeout: LINK_TIMEOUT,
            max_redirects: MAX_REDIRECTS,
            user_agent: LINK_USER_AGENT.to_string(),
        }
    }
}

/// 三个客户端的完整配置
#[derive(Clone, Debug, Default)]
pub struct ClientConfig {
    pub chat: ChatConfig,
    pub probe: ProbeConfig,
    pub link: LinkConfig,
}

impl ClientConfig {
    /// 从进程环境变量加载
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意键值查找函数加载，未设置或格式错误的项使用默认值
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = non_empty(&lookup, "NETHUB_CHAT_ADDR") {
            config.chat.server_addr = addr;
        }
        if let Some(timeout) = millis(&lookup, "NETHUB_CONNECT_TIMEOUT_MS") {
            config.chat.transport.connect_timeout = timeout;
        }
        if let Some(addr) = non_empty(&lookup, "NETHUB_PROBE_ADDR") {
            config.probe.server_addr = addr;
        }
        if let Some(timeout) = millis(&lookup, "NETHUB_PROBE_TIMEOUT_MS") {
            config.probe.timeout = timeout;
        }
        if let Some(timeout) = millis(&lookup, "NETHUB_LINK_TIMEOUT_MS") {
            config.link.connect_timeout = timeout;
            config.link.read_timeout = timeout;
        }

        config
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// 解析毫秒数；零和非数字都视为无效
fn millis<F>(lookup: &F, key: &str) -> Option<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = non_empty(lookup, key)?;
    match raw.parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            warn!("Ignoring invalid {}={:?}, using default", key, raw);
            None
        }
    }
}
