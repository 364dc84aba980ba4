//! 连接接收器
//!
//! 任何时候只有一个未完成的 accept。每接受一条连接就创建会话并启动，
//! 然后立即发起下一次 accept。accept 失败只记日志，循环不会因此停止。

use std::future::Future;
use std::net::SocketAddr;

use relay_protocol::{Connection, OutboxConfig, Result, TransportListener};
use tracing::{debug, error, info};

use crate::room::RoomHandle;
use crate::session::Session;

/// 连接接收器
pub struct Acceptor<L> {
    listener: L,
    room: RoomHandle,
    outbox: OutboxConfig,
}

impl<L: TransportListener> Acceptor<L> {
    pub fn new(listener: L, room: RoomHandle, outbox: OutboxConfig) -> Self {
        Self {
            listener,
            room,
            outbox,
        }
    }

    /// 实际监听地址
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// 一直接受连接
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// 接受连接，直到 `shutdown` 完成
    ///
    /// 关闭只停止接受新连接，已有会话不受影响。
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Acceptor stopped");
                    break;
                }
                result = self.listener.accept() => self.handle_accept(result),
            }
        }
    }

    fn handle_accept(&self, result: Result<(L::Transport, SocketAddr)>) {
        match result {
            Ok((transport, peer)) => {
                debug!("Accepted connection from {}", peer);
                let session = Session::new(
                    Connection::new(transport),
                    peer,
                    self.room.clone(),
                    self.outbox.clone(),
                );
                tokio::spawn(async move {
                    let reason = session.run().await;
                    debug!("Session task for {} finished: {}", peer, reason);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
