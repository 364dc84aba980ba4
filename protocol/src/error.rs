//! 错误类型定义

use thiserror::Error;

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,
}

/// 出站队列入队错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxError {
    /// 队列已关闭（写端已结束或已被驱逐）
    #[error("Outbox closed")]
    Closed,

    /// 队列已满，按 Disconnect 策略关闭
    #[error("Outbox overflow: {capacity} frames queued")]
    Overflow { capacity: usize },
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
