//! 帧编解码
//!
//! 帧格式:
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │          Payload (FRAME_LEN = 255 B)         │
//! │      NUL 填充的文本，无长度前缀、无类型       │
//! └──────────────────────────────────────────────┘
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};
use crate::{Frame, FRAME_LEN};

/// 帧读取器
///
/// 内部缓冲区在多次读取之间复用。
pub struct FrameReader<R> {
    reader: R,
    buffer: [u8; FRAME_LEN],
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// 创建新的帧读取器
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: [0; FRAME_LEN],
        }
    }

    /// 读取一帧
    ///
    /// 对端在帧边界或帧中途关闭连接都返回 [`ProtocolError::ConnectionClosed`]。
    pub async fn read_frame(&mut self) -> Result<Frame> {
        self.reader
            .read_exact(&mut self.buffer)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    ProtocolError::ConnectionClosed
                } else {
                    ProtocolError::Io(e)
                }
            })?;

        Ok(Frame::from_array(self.buffer))
    }
}

/// 帧写入器
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// 创建新的帧写入器
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 完整写出一帧
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
