//! 行编解码
//!
//! 帧格式:
//! ```text
//! ┌──────────────────────────────────────┬──────────┐
//! │        Payload (UTF-8 text)          │ \n / \r\n│
//! └──────────────────────────────────────┴──────────┘
//! ```
//!
//! 除换行符外没有任何其他分帧，内容对本层不透明。

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

use crate::error::{ProtocolError, Result};
use crate::MAX_LINE_LEN;

/// 行读取器
pub struct LineReader<R> {
    reader: BufReader<R>,
    buffer: Vec<u8>,
    max_len: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// 创建新的行读取器
    pub fn new(reader: R) -> Self {
        Self::with_max_len(reader, MAX_LINE_LEN)
    }

    /// 创建带自定义行长度上限的读取器
    pub fn with_max_len(reader: R, max_len: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            buffer: Vec::new(),
            max_len,
        }
    }

    /// 读取一行，去掉行尾的 `\n` 或 `\r\n`
    ///
    /// 流在行中间结束时返回已读到的残余部分；流已结束且没有数据时
    /// 返回 [`ProtocolError::ConnectionClosed`]。
    pub async fn read_line(&mut self) -> Result<String> {
        self.buffer.clear();

        // 多留两个字节给行尾的 "\r\n"
        let limit = (self.max_len + 2) as u64;
        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buffer)
            .await?;

        if n == 0 {
            return Err(ProtocolError::ConnectionClosed);
        }

        if self.buffer.last() == Some(&b'\n') {
            self.buffer.pop();
            if self.buffer.last() == Some(&b'\r') {
                self.buffer.pop();
            }
        } else if n as u64 == limit {
            return Err(ProtocolError::LineTooLong { max: self.max_len });
        }

        if self.buffer.len() > self.max_len {
            return Err(ProtocolError::LineTooLong { max: self.max_len });
        }

        Ok(String::from_utf8_lossy(&self.buffer).into_owned())
    }
}

/// 行写入器
pub struct LineWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    /// 创建新的行写入器
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 写入一行并追加 `\n`
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(b'\n');

        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// 关闭写入端
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
