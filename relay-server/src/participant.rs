//! 房间成员
//!
//! 成员只有一个能力：接收投递的帧。变体集合是封闭的：
//! 网络会话（`Remote`）和进程内回环（`Loopback`，测试用）。

use std::fmt;

use relay_protocol::{Enqueued, Frame, Outbox, OutboxError};
use thiserror::Error;
use tokio::sync::mpsc;

/// 成员 ID：槽位下标 + 代数
///
/// 成员离开后槽位代数加一，旧 ID 不会匹配到后来的成员。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParticipantId {
    index: u32,
    generation: u32,
}

impl ParticipantId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// 投递失败：该成员已无法再接收帧
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// 会话出站队列已关闭或溢出
    #[error(transparent)]
    Outbox(#[from] OutboxError),

    /// 回环接收端已丢弃
    #[error("Loopback receiver dropped")]
    LoopbackClosed,
}

/// 房间成员
pub enum Participant {
    /// 网络会话，投递即写入其出站队列
    Remote(Outbox),
    /// 进程内回环，投递即发送到通道
    Loopback(mpsc::UnboundedSender<Frame>),
}

impl Participant {
    /// 创建回环成员及其接收端
    pub fn loopback() -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Participant::Loopback(tx), rx)
    }

    /// 投递一帧
    pub fn deliver(&self, frame: &Frame) -> Result<Enqueued, DeliveryError> {
        match self {
            Participant::Remote(outbox) => Ok(outbox.push(frame.clone())?),
            Participant::Loopback(tx) => tx
                .send(frame.clone())
                .map(|()| Enqueued::Queued)
                .map_err(|_| DeliveryError::LoopbackClosed),
        }
    }

    /// 离开房间时调用，之后不再接收
    pub(crate) fn close(&self) {
        if let Participant::Remote(outbox) = self {
            outbox.close();
        }
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participant::Remote(outbox) => f
                .debug_struct("Remote")
                .field("queued", &outbox.queued())
                .finish(),
            Participant::Loopback(_) => f.write_str("Loopback"),
        }
    }
}
