//! 后台任务
//!
//! 探测和链接检测都可能等待数秒，UI 线程通过这里把它们放到网络运行时上执行，
//! 结果经由 [`Poster`] 投递回 UI 线程。超时由各自的传输层负责。

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::ProbeError;
use crate::link::{LinkCheckResult, LinkValidationClient};
use crate::mailbox::Poster;
use crate::probe::DatagramProbeClient;

/// 后台任务的完成结果
#[derive(Debug)]
pub enum TaskOutcome {
    /// 一次探测
    Probe {
        command: String,
        result: Result<String, ProbeError>,
    },
    /// 一次链接检测
    Link(LinkCheckResult),
}

/// 后台任务调度器
pub struct TaskRunner {
    runtime: Handle,
    poster: Poster<TaskOutcome>,
}

impl TaskRunner {
    pub fn new(runtime: Handle, poster: Poster<TaskOutcome>) -> Self {
        Self { runtime, poster }
    }

    /// 在阻塞线程池上执行一次探测
    pub fn submit_probe(
        &self,
        client: &DatagramProbeClient,
        command: impl Into<String>,
    ) -> JoinHandle<()> {
        let client = client.clone();
        let command = command.into();
        let poster = self.poster.clone();

        self.runtime.spawn_blocking(move || {
            let result = client.send_command(&command);
            debug!("Probe {} finished: ok={}", command, result.is_ok());
            poster.post(TaskOutcome::Probe { command, result });
        })
    }

    /// 异步执行一次链接检测
    pub fn submit_link_check(
        &self,
        client: &LinkValidationClient,
        url: impl Into<String>,
    ) -> JoinHandle<()> {
        let client = client.clone();
        let url = url.into();
        let poster = self.poster.clone();

        self.runtime.spawn(async move {
            let result = client.check_link(&url).await;
            poster.post(TaskOutcome::Link(result));
        })
    }
}
