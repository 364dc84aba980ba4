//! 服务端会话
//!
//! 一个会话对应一条已建立的连接。读方向和写方向各是一个循环，
//! 每个方向任何时候最多一个未完成的操作（Idle / InFlight）。
//! 任一方向失败即为终止，会话离开房间，排队中的帧被丢弃。

use std::fmt;
use std::net::SocketAddr;

use relay_protocol::{
    Connection, FrameReader, FrameWriter, Outbox, OutboxConfig, OutboxReceiver, ProtocolError,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::participant::{Participant, ParticipantId};
use crate::room::RoomHandle;

/// 会话结束原因
#[derive(Debug)]
pub enum CloseReason {
    /// 读失败（包括对端关闭）
    ReadFailed(ProtocolError),
    /// 写失败
    WriteFailed(ProtocolError),
    /// 出站队列被关闭（溢出或被房间移除）
    Evicted,
    /// 房间任务已退出
    RoomUnavailable,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::ReadFailed(e) => write!(f, "read failed: {}", e),
            CloseReason::WriteFailed(e) => write!(f, "write failed: {}", e),
            CloseReason::Evicted => f.write_str("evicted"),
            CloseReason::RoomUnavailable => f.write_str("room unavailable"),
        }
    }
}

/// 服务端会话
pub struct Session<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    peer: SocketAddr,
    room: RoomHandle,
    outbox: OutboxConfig,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(
        connection: Connection<R, W>,
        peer: SocketAddr,
        room: RoomHandle,
        outbox: OutboxConfig,
    ) -> Self {
        let (reader, writer) = connection.split();
        Self {
            reader,
            writer,
            peer,
            room,
            outbox,
        }
    }

    /// 加入房间并运行读写循环，直到第一次失败
    pub async fn run(self) -> CloseReason {
        let Session {
            mut reader,
            mut writer,
            peer,
            room,
            outbox,
        } = self;

        let (outbox, mut outbound) = Outbox::new(&outbox);
        let id = match room.join(Participant::Remote(outbox)).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Session from {} could not join: {}", peer, e);
                return CloseReason::RoomUnavailable;
            }
        };
        info!("Session {} started for {}", id, peer);

        let reason = tokio::select! {
            reason = read_loop(&mut reader, id, &room) => reason,
            reason = write_loop(&mut writer, &mut outbound) => reason,
        };

        // 离开是幂等的，被驱逐时房间里已经没有这个成员
        let _ = room.leave(id).await;

        match &reason {
            CloseReason::ReadFailed(ProtocolError::ConnectionClosed) => {
                info!("Session {} ({}) disconnected", id, peer);
            }
            other => warn!("Session {} ({}) closed: {}", id, peer, other),
        }
        reason
    }
}

async fn read_loop<R>(reader: &mut FrameReader<R>, id: ParticipantId, room: &RoomHandle) -> CloseReason
where
    R: AsyncRead + Unpin,
{
    loop {
        match reader.read_frame().await {
            Ok(frame) => {
                debug!("{} sent {:?}", id, frame);
                if room.deliver(Some(id), frame).await.is_err() {
                    return CloseReason::RoomUnavailable;
                }
            }
            Err(e) => return CloseReason::ReadFailed(e),
        }
    }
}

async fn write_loop<W>(writer: &mut FrameWriter<W>, outbound: &mut OutboxReceiver) -> CloseReason
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = outbound.next().await {
        tokio::select! {
            result = writer.write_frame(&frame) => {
                if let Err(e) = result {
                    return CloseReason::WriteFailed(e);
                }
            }
            _ = outbound.evicted() => break,
        }
    }
    CloseReason::Evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::{Room, JOIN_ANNOUNCEMENT};
    use relay_protocol::{Frame, OverflowPolicy, FRAME_LEN};
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    const PEER: &str = "127.0.0.1:40000";

    /// 每次写都返回 BrokenPipe 的写端
    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// 启动一个内存会话，返回客户端一侧的流
    fn spawn_session(
        room: &RoomHandle,
        buffer: usize,
        outbox: OutboxConfig,
    ) -> (DuplexStream, JoinHandle<CloseReason>) {
        let (client, server) = duplex(buffer);
        let (read_half, write_half) = tokio::io::split(server);
        let session = Session::new(
            Connection::from_parts(read_half, write_half),
            PEER.parse().unwrap(),
            room.clone(),
            outbox,
        );
        (client, tokio::spawn(session.run()))
    }

    async fn wait_for_members(room: &RoomHandle, expected: usize) {
        timeout(Duration::from_secs(2), async {
            while room.member_count().await.unwrap() != expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("members in time");
    }

    async fn read_text(stream: &mut DuplexStream) -> String {
        let mut buf = [0u8; FRAME_LEN];
        timeout(Duration::from_secs(2), stream.read_exact(&mut buf))
            .await
            .expect("frame in time")
            .unwrap();
        Frame::from_array(buf).text().into_owned()
    }

    #[tokio::test]
    async fn test_session_welcome_and_fanout() {
        let (room, _task) = RoomHandle::spawn(Room::new("hi"));

        let (mut a, _a_task) = spawn_session(&room, 4096, OutboxConfig::default());
        assert_eq!(read_text(&mut a).await, "\nhi\nactive users: 0");
        wait_for_members(&room, 1).await;

        let (mut b, _b_task) = spawn_session(&room, 4096, OutboxConfig::default());
        assert_eq!(read_text(&mut b).await, "\nhi\nactive users: 1");
        assert_eq!(read_text(&mut a).await, JOIN_ANNOUNCEMENT);

        b.write_all(Frame::from_text("b: hello").as_bytes()).await.unwrap();
        assert_eq!(read_text(&mut a).await, "b: hello");
    }

    #[tokio::test]
    async fn test_back_to_back_frames_written_in_order() {
        let (room, _task) = RoomHandle::spawn(Room::new("hi"));

        // 缓冲区比一帧还小，第一帧写到一半就会挂起
        let (mut slow, _slow_task) = spawn_session(&room, 16, OutboxConfig::default());
        wait_for_members(&room, 1).await;
        let (mut sender, _sender_task) = spawn_session(&room, 4096, OutboxConfig::default());
        read_text(&mut sender).await;

        sender.write_all(Frame::from_text("one").as_bytes()).await.unwrap();
        sender.write_all(Frame::from_text("two").as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(read_text(&mut slow).await, "\nhi\nactive users: 0");
        assert_eq!(read_text(&mut slow).await, JOIN_ANNOUNCEMENT);
        assert_eq!(read_text(&mut slow).await, "one");
        assert_eq!(read_text(&mut slow).await, "two");
    }

    #[tokio::test]
    async fn test_disconnect_leaves_room() {
        let (room, _task) = RoomHandle::spawn(Room::new("hi"));

        let (mut a, a_task) = spawn_session(&room, 4096, OutboxConfig::default());
        read_text(&mut a).await;
        assert_eq!(room.member_count().await.unwrap(), 1);

        drop(a);
        let reason = timeout(Duration::from_secs(2), a_task).await.unwrap().unwrap();
        assert!(matches!(
            reason,
            CloseReason::ReadFailed(ProtocolError::ConnectionClosed)
        ));
        assert_eq!(room.member_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_overflow_disconnect_evicts_stalled_reader() {
        let (room, _task) = RoomHandle::spawn(Room::new("hi"));
        let tight = OutboxConfig {
            capacity: 2,
            policy: OverflowPolicy::Disconnect,
        };

        // 从不读取的会话
        let (_stalled, stalled_task) = spawn_session(&room, 16, tight);
        wait_for_members(&room, 1).await;
        let (mut sender, _sender_task) = spawn_session(&room, 4096, OutboxConfig::default());
        read_text(&mut sender).await;

        for i in 0..10 {
            sender
                .write_all(Frame::from_text(&i.to_string()).as_bytes())
                .await
                .unwrap();
        }

        let reason = timeout(Duration::from_secs(2), stalled_task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(reason, CloseReason::Evicted));
        assert_eq!(room.member_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_leaves_room() {
        let (room, _task) = RoomHandle::spawn(Room::new("hi"));

        // 读方向保持打开，只有写方向失败
        let (_client, server) = duplex(4096);
        let session = Session::new(
            Connection::from_parts(server, BrokenPipe),
            PEER.parse().unwrap(),
            room.clone(),
            OutboxConfig::default(),
        );

        // 欢迎帧就写不出去
        let reason = timeout(Duration::from_secs(2), session.run())
            .await
            .expect("session ends in time");
        match reason {
            CloseReason::WriteFailed(ProtocolError::Io(e)) => {
                assert_eq!(e.kind(), io::ErrorKind::BrokenPipe)
            }
            other => panic!("unexpected close reason: {}", other),
        }
        assert_eq!(room.member_count().await.unwrap(), 0);
    }
}
