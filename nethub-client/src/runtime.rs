//! 网络运行时

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;

/// 网络工作线程数
const WORKER_THREADS: usize = 2;

/// 构建后台网络运行时
///
/// UI 线程不在运行时内部，可以直接用 `Handle::block_on` 驱动短操作；
/// 聊天接收循环和后台任务都跑在这里的工作线程上。
pub fn network_runtime() -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(WORKER_THREADS)
        .thread_name("nethub-net")
        .enable_all()
        .build()
}

/// 由界面持有的网络运行时
///
/// 析构时不等待仍在阻塞线程池里的探测，窗口可以立即关闭。
pub struct NetworkRuntime {
    handle: Handle,
    /// 只在 drop 时取走
    runtime: Option<Runtime>,
}

impl NetworkRuntime {
    pub fn new() -> std::io::Result<Self> {
        let runtime = network_runtime()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }
}

impl Drop for NetworkRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            debug!("Shutting down network runtime");
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_drop_does_not_wait_for_blocking_jobs() {
        let runtime = NetworkRuntime::new().unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        runtime.handle().spawn_blocking(move || {
            started_tx.send(()).unwrap();
            thread::sleep(Duration::from_secs(3));
        });
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let started = Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_handle_runs_tasks() {
        let runtime = NetworkRuntime::new().unwrap();
        let value = runtime.handle().block_on(async { 40 + 2 });
        assert_eq!(value, 42);
    }
}
