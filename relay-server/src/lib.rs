//! 中继服务端
//!
//! - 房间 (Room / RoomHandle)：成员集合与广播
//! - 会话 (Session)：每条连接的读写循环
//! - 接收器 (Acceptor)：接受连接并启动会话

mod acceptor;
mod config;
mod participant;
mod room;
mod server;
mod session;

pub use acceptor::Acceptor;
pub use config::{ServerConfig, DEFAULT_GREETING};
pub use participant::{DeliveryError, Participant, ParticipantId};
pub use room::{Room, RoomError, RoomHandle, JOIN_ANNOUNCEMENT};
pub use server::RelayServer;
pub use session::{CloseReason, Session};
