//! 中继服务端
//!
//! 单线程事件循环上的 Tokio TCP 服务器

use anyhow::Result;
use relay_server::{RelayServer, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("relay_server=debug".parse()?)
                .add_directive("relay_protocol=debug".parse()?),
        )
        .init();

    let mut config = ServerConfig::default();
    if let Some(addr) = std::env::args_os().nth(1) {
        config.addr = addr.to_string_lossy().into_owned();
    }

    info!("Relay Server starting on {}", config.addr);

    RelayServer::new(config).run().await?;

    Ok(())
}
