//! 网络线程到 UI 线程的投递通道
//!
//! 网络侧持有 [`Poster`]，UI 侧持有 [`Mailbox`] 并在自己的线程上取出事件、
//! 调用回调。回调从不在网络线程上执行，这是两侧之间唯一的同步点。

use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, RwLock};
use std::time::Duration;

type Waker = Box<dyn Fn() + Send + Sync>;

/// 所有克隆共享同一个槽位
type WakerSlot = Arc<RwLock<Option<Waker>>>;

/// 创建一对投递端/接收端
pub fn mailbox<T>() -> (Poster<T>, Mailbox<T>) {
    let (tx, rx) = std_mpsc::channel();
    (Poster { tx, waker: WakerSlot::default() }, Mailbox { rx })
}

/// 投递端，可跨线程克隆
pub struct Poster<T> {
    tx: std_mpsc::Sender<T>,
    /// 投递后调用，用于通知 UI 重绘
    waker: WakerSlot,
}

impl<T> Clone for Poster<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            waker: Arc::clone(&self.waker),
        }
    }
}

impl<T> Poster<T> {
    /// 设置唤醒函数，对已克隆出的投递端同样生效
    pub fn set_waker<F>(&self, waker: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.waker.write() {
            *slot = Some(Box::new(waker));
        }
    }

    /// 投递一个事件；接收端已销毁时返回 false
    pub fn post(&self, item: T) -> bool {
        if self.tx.send(item).is_err() {
            return false;
        }
        if let Ok(slot) = self.waker.read() {
            if let Some(waker) = slot.as_ref() {
                waker();
            }
        }
        true
    }
}

/// 接收端，留在 UI 线程
pub struct Mailbox<T> {
    rx: std_mpsc::Receiver<T>,
}

impl<T> Mailbox<T> {
    /// 非阻塞取出一个事件
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// 按投递顺序取出当前所有事件
    pub fn drain(&self) -> impl Iterator<Item = T> + '_ {
        self.rx.try_iter()
    }

    /// 最多等待 `timeout` 取出一个事件
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }
}
