//! 服务端配置

use relay_protocol::{OutboxConfig, DEFAULT_SERVER_ADDR};

/// 默认欢迎语
pub const DEFAULT_GREETING: &str = "Welcome to the relay server! (guest room)";

/// 服务端配置
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// 监听地址
    pub addr: String,
    /// 欢迎帧的第一行
    pub greeting: String,
    /// 每个会话的出站队列配置
    pub outbox: OutboxConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_SERVER_ADDR.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            outbox: OutboxConfig::default(),
        }
    }
}
