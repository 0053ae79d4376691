//! 健康检测命令
//!
//! 请求是单个数据报，内容就是命令字符串本身的字节。

use std::fmt;

/// 健康检测服务器支持的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeCommand {
    /// 存活检测
    Ping,
    /// 状态查询
    Status,
    /// 服务信息查询
    Info,
}

impl ProbeCommand {
    /// 全部命令，按界面展示顺序排列
    pub const ALL: [ProbeCommand; 3] = [ProbeCommand::Ping, ProbeCommand::Status, ProbeCommand::Info];

    /// 线上格式
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeCommand::Ping => "PING",
            ProbeCommand::Status => "STATUS",
            ProbeCommand::Info => "INFO",
        }
    }
}

impl AsRef<str> for ProbeCommand {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ProbeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
