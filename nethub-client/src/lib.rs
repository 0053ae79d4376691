//! NetHub 客户端网络层
//!
//! 包含:
//! - 聊天客户端 (StreamChatClient)：TCP 行协议长连接，后台接收，回调在 UI 线程执行
//! - 健康检测客户端 (DatagramProbeClient)：UDP 单请求/单响应，有界等待
//! - 链接检测客户端 (LinkValidationClient)：HTTP HEAD，结果结构化返回
//! - 后台任务 (TaskRunner) 与投递通道 (Mailbox)
//! - egui 前端 (NetHubApp)

pub mod chat;
pub mod config;
pub mod error;
pub mod link;
pub mod mailbox;
pub mod probe;
pub mod runtime;
pub mod tasks;
pub mod ui;

pub use chat::{ConnectionState, StreamChatClient};
pub use config::{ChatConfig, ClientConfig, LinkConfig, ProbeConfig};
pub use error::{ChatError, LinkError, ProbeError};
pub use link::{LinkCheckResult, LinkValidationClient, TRANSPORT_FAILURE};
pub use mailbox::{mailbox, Mailbox, Poster};
pub use probe::DatagramProbeClient;
pub use runtime::{network_runtime, NetworkRuntime};
pub use tasks::{TaskOutcome, TaskRunner};
