//! 客户端网络侧
//!
//! 与服务端会话相同的读写纪律，只是对端只有一个（服务器）：
//! 收到的帧交给显示和提示音，不再转发。
//!
//! 网络循环跑在独立线程上的单线程 runtime 里；输入线程只通过
//! 一个无界通道把帧交给它，从不直接碰队列或套接字。

use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread;

use relay_protocol::{
    Connection, Enqueued, Frame, FrameReader, FrameWriter, Outbox, OutboxConfig, OutboxReceiver,
    ProtocolError, TcpTransport, Transport, TransportConfig, DEFAULT_CLIENT_ADDR,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::audio::AudioPlayback;
use crate::input::FrameSink;
use crate::render::Presenter;

/// 客户端网络配置
#[derive(Clone, Debug)]
pub struct PeerConfig {
    /// 服务器地址
    pub server_addr: String,
    /// 传输配置
    pub transport: TransportConfig,
    /// 出站队列配置
    pub outbox: OutboxConfig,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_CLIENT_ADDR.to_string(),
            transport: TransportConfig::default(),
            outbox: OutboxConfig::default(),
        }
    }
}

/// 链路结束原因
#[derive(Debug)]
pub enum LinkEnd {
    /// 连接失败
    ConnectFailed(ProtocolError),
    /// 读失败（包括服务器关闭连接）
    ReadFailed(ProtocolError),
    /// 写失败
    WriteFailed(ProtocolError),
    /// 出站队列溢出（Disconnect 策略）
    Overflowed,
    /// 本地输入结束，剩余帧已写完
    InputClosed,
}

impl fmt::Display for LinkEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEnd::ConnectFailed(e) => write!(f, "connect failed: {}", e),
            LinkEnd::ReadFailed(e) => write!(f, "read failed: {}", e),
            LinkEnd::WriteFailed(e) => write!(f, "write failed: {}", e),
            LinkEnd::Overflowed => f.write_str("outbound queue overflowed"),
            LinkEnd::InputClosed => f.write_str("input closed"),
        }
    }
}

/// 到服务器的链路
pub struct Link<P> {
    config: PeerConfig,
    presenter: P,
    audio: Arc<dyn AudioPlayback>,
}

impl<P: Presenter> Link<P> {
    pub fn new(config: PeerConfig, presenter: P, audio: Arc<dyn AudioPlayback>) -> Self {
        Self {
            config,
            presenter,
            audio,
        }
    }

    /// 连接并运行，直到链路断开且输入结束
    ///
    /// 链路断开（或从未连上）后仍继续接收输入，帧在有界队列里累积，
    /// 不会阻塞输入线程。
    pub async fn run(mut self, mut requests: mpsc::UnboundedReceiver<Frame>) -> LinkEnd {
        let (outbox, mut outbound) = Outbox::new(&self.config.outbox);
        let addr = self.config.server_addr.clone();

        let end = match TcpTransport::connect(&addr, &self.config.transport).await {
            Ok(transport) => {
                info!("Connected to {}", addr);
                let (mut reader, mut writer) = Connection::new(transport).split();

                tokio::select! {
                    end = read_loop(&mut reader, &mut self.presenter, self.audio.as_ref()) => end,
                    end = write_loop(&mut writer, &mut outbound) => end,
                    end = async {
                        forward(&mut requests, &outbox).await;
                        // 输入结束后由写循环把剩余帧写完再结束
                        std::future::pending::<LinkEnd>().await
                    } => end,
                }
            }
            Err(e) => {
                error!("Failed to connect to {}: {}", addr, e);
                LinkEnd::ConnectFailed(e)
            }
        };

        match &end {
            LinkEnd::InputClosed => info!("Link to {} closed", addr),
            LinkEnd::ReadFailed(ProtocolError::ConnectionClosed) => {
                warn!("Server {} closed the connection", addr)
            }
            other => warn!("Link to {} ended: {}", addr, other),
        }

        forward(&mut requests, &outbox).await;
        end
    }
}

async fn read_loop<R, P>(
    reader: &mut FrameReader<R>,
    presenter: &mut P,
    audio: &dyn AudioPlayback,
) -> LinkEnd
where
    R: AsyncRead + Unpin,
    P: Presenter,
{
    loop {
        match reader.read_frame().await {
            Ok(frame) => {
                audio.play();
                presenter.render(&frame);
            }
            Err(e) => return LinkEnd::ReadFailed(e),
        }
    }
}

async fn write_loop<W>(writer: &mut FrameWriter<W>, outbound: &mut OutboxReceiver) -> LinkEnd
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = outbound.next().await {
        if let Err(e) = writer.write_frame(&frame).await {
            return LinkEnd::WriteFailed(e);
        }
        debug!("Sent {:?}", frame);
    }

    if outbound.overflowed() {
        LinkEnd::Overflowed
    } else {
        LinkEnd::InputClosed
    }
}

/// 把输入线程交来的帧放进出站队列，输入结束时关闭队列
async fn forward(requests: &mut mpsc::UnboundedReceiver<Frame>, outbox: &Outbox) {
    while let Some(frame) = requests.recv().await {
        match outbox.push(frame) {
            Ok(Enqueued::Queued) => {}
            Ok(Enqueued::DroppedOldest) => warn!("Outbound queue full, dropped oldest frame"),
            Err(e) => warn!("Dropping outbound frame: {}", e),
        }
    }
    outbox.close();
}

// ============================================================================
// 网络线程
// ============================================================================

/// 网络线程句柄
pub struct PeerHandle {
    requests: mpsc::UnboundedSender<Frame>,
    thread: thread::JoinHandle<()>,
}

impl PeerHandle {
    /// 启动网络线程
    pub fn spawn<P>(
        config: PeerConfig,
        presenter: P,
        audio: Arc<dyn AudioPlayback>,
    ) -> io::Result<Self>
    where
        P: Presenter + 'static,
    {
        let (requests, rx) = mpsc::unbounded_channel();
        let link = Link::new(config, presenter, audio);

        let thread = thread::Builder::new()
            .name("relay-net".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to create tokio runtime: {}", e);
                        return;
                    }
                };
                let end = runtime.block_on(link.run(rx));
                debug!("Network thread finished: {}", end);
            })?;

        Ok(Self { requests, thread })
    }

    /// 结束输入，等待剩余帧写完后网络线程退出
    pub fn shutdown(self) {
        drop(self.requests);
        if self.thread.join().is_err() {
            error!("Network thread panicked");
        }
    }
}

impl FrameSink for PeerHandle {
    fn write(&self, frame: Frame) -> bool {
        self.requests.send(frame).is_ok()
    }
}
