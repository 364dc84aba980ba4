//! 房间：当前所有成员组成的广播域
//!
//! [`Room`] 是普通的同步结构，只由一个房间任务持有；会话通过
//! [`RoomHandle`] 发命令给这个任务。所有成员变更都在同一个任务里
//! 依次执行，不需要锁。

use relay_protocol::{Enqueued, Frame, ROOM_COMMAND_BUFFER};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::participant::{Participant, ParticipantId};

/// 新成员加入时发给其他成员的通知
pub const JOIN_ANNOUNCEMENT: &str = "New user joined the room!";

/// 房间任务已退出
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room is no longer running")]
    Unavailable,
}

struct Slot {
    generation: u32,
    occupant: Option<Participant>,
}

/// 成员集合（槽位数组 + 空闲表）
pub struct Room {
    slots: Vec<Slot>,
    free: Vec<u32>,
    members: usize,
    greeting: String,
}

impl Room {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            members: 0,
            greeting: greeting.into(),
        }
    }

    /// 加入房间
    ///
    /// 先给新成员发欢迎帧（带加入前的成员数），再通知其他成员。
    /// 欢迎帧投递失败时新成员会被立即移除，返回的 ID 随即失效。
    pub fn join(&mut self, participant: Participant) -> ParticipantId {
        let others = self.members;
        let id = self.insert(participant);

        let welcome = Frame::from_text(&format!(
            "\n{}\nactive users: {}",
            self.greeting, others
        ));
        if !self.send_to(id, &welcome) {
            return id;
        }

        self.deliver(Some(id), &Frame::from_text(JOIN_ANNOUNCEMENT));
        id
    }

    /// 离开房间，不在房间中时什么也不做
    pub fn leave(&mut self, id: ParticipantId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return false;
        };
        if slot.generation != id.generation() {
            return false;
        }
        let Some(participant) = slot.occupant.take() else {
            return false;
        };

        participant.close();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index() as u32);
        self.members -= 1;
        true
    }

    /// 投递给除 `sender` 外的所有成员，`sender` 为 `None` 时投递给所有人
    ///
    /// 投递失败的成员在本轮结束后移除。返回成功投递的成员数。
    pub fn deliver(&mut self, sender: Option<ParticipantId>, frame: &Frame) -> usize {
        let mut delivered = 0;
        let mut failed = Vec::new();

        for (index, slot) in self.slots.iter().enumerate() {
            let Some(participant) = &slot.occupant else {
                continue;
            };
            let id = ParticipantId::new(index as u32, slot.generation);
            if sender == Some(id) {
                continue;
            }

            match participant.deliver(frame) {
                Ok(Enqueued::Queued) => delivered += 1,
                Ok(Enqueued::DroppedOldest) => {
                    warn!("Outbox of {} is full, dropped its oldest frame", id);
                    delivered += 1;
                }
                Err(e) => {
                    warn!("Delivery to {} failed: {}", id, e);
                    failed.push(id);
                }
            }
        }

        for id in failed {
            self.leave(id);
        }
        delivered
    }

    /// 当前成员数
    pub fn len(&self) -> usize {
        self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members == 0
    }

    /// `id` 是否仍是成员
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(|slot| slot.generation == id.generation() && slot.occupant.is_some())
    }

    fn insert(&mut self, participant: Participant) -> ParticipantId {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].occupant = Some(participant);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    occupant: Some(participant),
                });
                (self.slots.len() - 1) as u32
            }
        };
        self.members += 1;
        ParticipantId::new(index, self.slots[index as usize].generation)
    }

    fn send_to(&mut self, id: ParticipantId, frame: &Frame) -> bool {
        let result = match self.slots.get(id.index()).and_then(|s| s.occupant.as_ref()) {
            Some(participant) => participant.deliver(frame),
            None => return false,
        };
        match result {
            Ok(_) => true,
            Err(e) => {
                warn!("Delivery to {} failed: {}", id, e);
                self.leave(id);
                false
            }
        }
    }
}

// ============================================================================
// 房间任务
// ============================================================================

enum RoomCommand {
    Join {
        participant: Participant,
        reply: oneshot::Sender<ParticipantId>,
    },
    Leave {
        id: ParticipantId,
    },
    Deliver {
        sender: Option<ParticipantId>,
        frame: Frame,
    },
    MemberCount {
        reply: oneshot::Sender<usize>,
    },
}

/// 房间任务句柄，克隆开销很小
#[derive(Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// 启动房间任务
    ///
    /// 所有句柄都被丢弃后任务结束，并返回房间本身。
    pub fn spawn(room: Room) -> (Self, JoinHandle<Room>) {
        let (sender, receiver) = mpsc::channel(ROOM_COMMAND_BUFFER);
        let task = tokio::spawn(run_room(room, receiver));
        (Self { sender }, task)
    }

    pub async fn join(&self, participant: Participant) -> Result<ParticipantId, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Join { participant, reply }).await?;
        rx.await.map_err(|_| RoomError::Unavailable)
    }

    pub async fn leave(&self, id: ParticipantId) -> Result<(), RoomError> {
        self.send(RoomCommand::Leave { id }).await
    }

    pub async fn deliver(
        &self,
        sender: Option<ParticipantId>,
        frame: Frame,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Deliver { sender, frame }).await
    }

    pub async fn member_count(&self) -> Result<usize, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::MemberCount { reply }).await?;
        rx.await.map_err(|_| RoomError::Unavailable)
    }

    async fn send(&self, command: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| RoomError::Unavailable)
    }
}

async fn run_room(mut room: Room, mut commands: mpsc::Receiver<RoomCommand>) -> Room {
    while let Some(command) = commands.recv().await {
        match command {
            RoomCommand::Join { participant, reply } => {
                let id = room.join(participant);
                info!("{} joined, {} member(s)", id, room.len());
                let _ = reply.send(id);
            }
            RoomCommand::Leave { id } => {
                if room.leave(id) {
                    info!("{} left, {} member(s)", id, room.len());
                }
            }
            RoomCommand::Deliver { sender, frame } => {
                let delivered = room.deliver(sender, &frame);
                debug!("Fanned out frame to {} member(s)", delivered);
            }
            RoomCommand::MemberCount { reply } => {
                let _ = reply.send(room.len());
            }
        }
    }
    room
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<Frame>) -> Vec<String> {
        let mut texts = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            texts.push(frame.text().into_owned());
        }
        texts
    }

    #[test]
    fn test_welcome_counts_existing_members() {
        let mut room = Room::new("hello");

        let (first, mut first_rx) = Participant::loopback();
        room.join(first);
        assert_eq!(drain(&mut first_rx), vec!["\nhello\nactive users: 0"]);

        let (second, mut second_rx) = Participant::loopback();
        room.join(second);
        assert_eq!(drain(&mut second_rx), vec!["\nhello\nactive users: 1"]);
        assert_eq!(drain(&mut first_rx), vec![JOIN_ANNOUNCEMENT]);
    }

    #[test]
    fn test_deliver_skips_sender() {
        let mut room = Room::new("hi");
        let (a, mut a_rx) = Participant::loopback();
        let (b, mut b_rx) = Participant::loopback();
        let (c, mut c_rx) = Participant::loopback();
        let a = room.join(a);
        room.join(b);
        room.join(c);
        drain(&mut a_rx);
        drain(&mut b_rx);
        drain(&mut c_rx);

        assert_eq!(room.deliver(Some(a), &Frame::from_text("from a")), 2);
        assert!(drain(&mut a_rx).is_empty());
        assert_eq!(drain(&mut b_rx), vec!["from a"]);
        assert_eq!(drain(&mut c_rx), vec!["from a"]);

        assert_eq!(room.deliver(None, &Frame::from_text("all")), 3);
        assert_eq!(drain(&mut a_rx), vec!["all"]);
        assert_eq!(drain(&mut b_rx), vec!["all"]);
        assert_eq!(drain(&mut c_rx), vec!["all"]);
    }

    #[test]
    fn test_leave_is_idempotent() {
        let mut room = Room::new("hi");
        let (a, mut a_rx) = Participant::loopback();
        let a = room.join(a);

        assert!(room.leave(a));
        assert!(!room.leave(a));
        assert!(room.is_empty());

        drain(&mut a_rx);
        room.deliver(None, &Frame::from_text("after"));
        assert!(drain(&mut a_rx).is_empty());
    }

    #[test]
    fn test_stale_id_does_not_match_reused_slot() {
        let mut room = Room::new("hi");
        let (a, _a_rx) = Participant::loopback();
        let a = room.join(a);
        room.leave(a);

        let (b, mut b_rx) = Participant::loopback();
        let b = room.join(b);
        assert_ne!(a, b);
        assert!(!room.contains(a));
        assert!(room.contains(b));

        // 旧 ID 既不能移除新成员，也不会把新成员当成发送者排除
        assert!(!room.leave(a));
        drain(&mut b_rx);
        room.deliver(Some(a), &Frame::from_text("x"));
        assert_eq!(drain(&mut b_rx), vec!["x"]);
    }

    #[test]
    fn test_failed_participant_is_evicted() {
        let mut room = Room::new("hi");
        let (a, a_rx) = Participant::loopback();
        let (b, mut b_rx) = Participant::loopback();
        let a = room.join(a);
        room.join(b);
        drop(a_rx);

        assert_eq!(room.deliver(None, &Frame::from_text("x")), 1);
        assert!(!room.contains(a));
        assert_eq!(room.len(), 1);
        assert_eq!(drain(&mut b_rx).last().map(String::as_str), Some("x"));
    }

    #[test]
    fn test_failed_welcome_removes_joiner() {
        let mut room = Room::new("hi");
        let (a, a_rx) = Participant::loopback();
        drop(a_rx);
        let a = room.join(a);
        assert!(!room.contains(a));
        assert!(room.is_empty());
    }

    #[test]
    fn test_membership_matches_joined_minus_left_in_any_order() {
        // 对几种交错顺序检查：最终成员 = 加入且未离开的集合
        let orders: [&[usize]; 4] = [&[0, 1, 2, 3], &[3, 2, 1, 0], &[1, 3, 0, 2], &[2, 0, 3, 1]];

        for order in orders {
            let mut room = Room::new("hi");
            let mut receivers = Vec::new();
            let mut ids = Vec::new();
            for _ in 0..4 {
                let (p, rx) = Participant::loopback();
                receivers.push(rx);
                ids.push(room.join(p));
            }

            // 按顺序让偶数下标的成员离开，中途再插入一个新成员
            let mut extra = None;
            for &i in order {
                if i % 2 == 0 {
                    room.leave(ids[i]);
                }
                if extra.is_none() && i == 1 {
                    let (p, rx) = Participant::loopback();
                    receivers.push(rx);
                    extra = Some(room.join(p));
                }
            }

            assert_eq!(room.len(), 3);
            assert!(!room.contains(ids[0]));
            assert!(room.contains(ids[1]));
            assert!(!room.contains(ids[2]));
            assert!(room.contains(ids[3]));
            assert!(room.contains(extra.unwrap()));
        }
    }

    #[test]
    fn test_per_recipient_fifo() {
        let mut room = Room::new("hi");
        let (a, mut a_rx) = Participant::loopback();
        room.join(a);
        drain(&mut a_rx);

        for i in 0..50 {
            room.deliver(None, &Frame::from_text(&i.to_string()));
        }
        let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(drain(&mut a_rx), expected);
    }

    #[tokio::test]
    async fn test_handle_concurrent_join_leave() {
        let (room, task) = RoomHandle::spawn(Room::new("hi"));

        let mut workers = Vec::new();
        for i in 0..20 {
            let room = room.clone();
            workers.push(tokio::spawn(async move {
                let (p, rx) = Participant::loopback();
                let id = room.join(p).await.unwrap();
                if i % 2 == 0 {
                    room.leave(id).await.unwrap();
                }
                (id, rx)
            }));
        }

        let mut kept = Vec::new();
        for (i, worker) in workers.into_iter().enumerate() {
            let (id, rx) = worker.await.unwrap();
            if i % 2 == 1 {
                kept.push((id, rx));
            }
        }

        assert_eq!(room.member_count().await.unwrap(), 10);

        drop(room);
        let room = task.await.unwrap();
        for (id, _rx) in &kept {
            assert!(room.contains(*id));
        }
    }

    #[tokio::test]
    async fn test_handle_unavailable_after_task_ends() {
        let (room, task) = RoomHandle::spawn(Room::new("hi"));
        task.abort();
        let _ = task.await;

        let (p, _rx) = Participant::loopback();
        assert_eq!(room.join(p).await, Err(RoomError::Unavailable));
    }
}
