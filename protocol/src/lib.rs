//! 中继共享协议库
//!
//! 包含:
//! - 定长帧 (Frame)
//! - 传输层抽象 (Transport trait)
//! - 帧编解码 (Codec)
//! - 连接封装 (Connection)
//! - 出站队列 (Outbox)

mod constants;
mod frame;
mod transport;
mod codec;
mod connection;
mod outbox;
mod error;

pub use constants::*;
pub use frame::Frame;
pub use transport::{Transport, TransportListener, TransportConfig, TcpTransport, TcpListener};
pub use codec::{FrameReader, FrameWriter};
pub use connection::Connection;
pub use outbox::{Enqueued, Outbox, OutboxConfig, OutboxReceiver, OverflowPolicy};
pub use error::{OutboxError, ProtocolError, Result};
