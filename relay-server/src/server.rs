//! 中继服务器：把房间、接收器和监听器组装在一起

use relay_protocol::{TcpListener, TransportListener};
use tracing::{info, warn};

use crate::acceptor::Acceptor;
use crate::config::ServerConfig;
use crate::room::{Room, RoomHandle};

/// 中继服务器
pub struct RelayServer {
    config: ServerConfig,
}

impl RelayServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// 绑定监听地址并启动房间任务
    pub async fn bind(self) -> relay_protocol::Result<Acceptor<TcpListener>> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (room, _task) = RoomHandle::spawn(Room::new(self.config.greeting));
        Ok(Acceptor::new(listener, room, self.config.outbox))
    }

    /// 运行服务器，直到收到 Ctrl+C
    pub async fn run(self) -> anyhow::Result<()> {
        let acceptor = self.bind().await?;
        acceptor
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
                info!("Received shutdown signal");
            })
            .await;
        Ok(())
    }
}

impl Default for RelayServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}
