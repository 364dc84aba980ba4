//! 协议常量定义

use std::time::Duration;

/// 帧长度（字节），收发双方必须一致
pub const FRAME_LEN: usize = 255;

/// 文本最大长度：保留末尾一个 NUL
pub const TEXT_CAPACITY: usize = FRAME_LEN - 1;

/// 服务端默认监听地址
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:6969";

/// 客户端默认连接地址
pub const DEFAULT_CLIENT_ADDR: &str = "127.0.0.1:6969";

/// 每个连接出站队列的默认容量（帧）
pub const DEFAULT_OUTBOX_CAPACITY: usize = 1024;

/// 房间命令通道容量
pub const ROOM_COMMAND_BUFFER: usize = 1024;

/// 最大音量
pub const MAX_VOLUME: u8 = 128;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);
