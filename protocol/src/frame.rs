//! 定长帧
//!
//! 线上传输的唯一单位：恰好 [`FRAME_LEN`] 字节，内容为以 NUL 填充的文本，
//! 没有长度前缀，也没有类型标记。

use std::borrow::Cow;
use std::fmt;

use crate::{FRAME_LEN, TEXT_CAPACITY};

/// 一个定长帧
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    /// 全零帧
    pub const fn zeroed() -> Self {
        Self {
            bytes: [0; FRAME_LEN],
        }
    }

    /// 从线上读到的原始字节构造
    pub const fn from_array(bytes: [u8; FRAME_LEN]) -> Self {
        Self { bytes }
    }

    /// 从文本构造，超长部分静默截断
    ///
    /// 最多保留 [`TEXT_CAPACITY`] 字节，因此帧末尾至少有一个 NUL。
    /// 截断不会切开 UTF-8 字符。
    pub fn from_text(text: &str) -> Self {
        let mut end = text.len().min(TEXT_CAPACITY);
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        let mut frame = Self::zeroed();
        frame.bytes[..end].copy_from_slice(&text.as_bytes()[..end]);
        frame
    }

    /// 带前缀的文本帧，例如 `"alice: "` + 输入行
    pub fn with_prefix(prefix: &str, body: &str) -> Self {
        let mut text = String::with_capacity(prefix.len() + body.len());
        text.push_str(prefix);
        text.push_str(body);
        Self::from_text(&text)
    }

    /// 完整的帧字节
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    /// 第一个 NUL 之前的字节数
    pub fn used_len(&self) -> usize {
        self.bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(FRAME_LEN)
    }

    /// 帧中的文本部分
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes[..self.used_len()])
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl From<[u8; FRAME_LEN]> for Frame {
    fn from(bytes: [u8; FRAME_LEN]) -> Self {
        Self::from_array(bytes)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Frame").field(&self.text()).finish()
    }
}
