//! 连接封装
//!
//! 把传输层和行编解码封装在一起。

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{LineReader, LineWriter};
use crate::transport::Transport;

/// 连接封装
///
/// # Type Parameters
/// * `R` - 读取端类型
/// * `W` - 写入端类型
pub struct Connection<R, W> {
    reader: LineReader<R>,
    writer: LineWriter<W>,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> Connection<R, W> {
    /// 从传输层创建连接
    pub fn new<T: Transport<Reader = R, Writer = W>>(transport: T) -> Self {
        let (reader, writer) = transport.split();
        Self::from_parts(reader, writer)
    }

    /// 从读写端直接创建连接
    pub fn from_parts(reader: R, writer: W) -> Self {
        Self {
            reader: LineReader::new(reader),
            writer: LineWriter::new(writer),
        }
    }

    /// 分离为读取端和写入端
    ///
    /// 接收循环和发送方位于不同线程时使用
    pub fn split(self) -> (LineReader<R>, LineWriter<W>) {
        (self.reader, self.writer)
    }
}
