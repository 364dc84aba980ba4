//! 出站队列
//!
//! 每个会话（或客户端链路）一个：生产者入队，唯一的写循环出队。
//! 写循环一次只取一帧并写完再取下一帧，因此每个接收方最多一个
//! 未完成的写，且严格按入队顺序送达。
//!
//! 队列有容量上限，满时按 [`OverflowPolicy`] 处理。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::error::OutboxError;
use crate::{Frame, DEFAULT_OUTBOX_CAPACITY};

/// 队列满时的处理策略
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// 丢弃最旧的排队帧，为新帧腾出位置
    #[default]
    DropOldest,
    /// 关闭队列，断开这个接收方
    Disconnect,
}

/// 出站队列配置
#[derive(Clone, Debug)]
pub struct OutboxConfig {
    /// 最多排队的帧数（不含正在写的那一帧）
    pub capacity: usize,
    /// 满时策略
    pub policy: OverflowPolicy,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_OUTBOX_CAPACITY,
            policy: OverflowPolicy::default(),
        }
    }
}

/// 入队结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueued {
    /// 正常入队
    Queued,
    /// 入队成功，但丢弃了一帧最旧的
    DroppedOldest,
}

struct State {
    queue: VecDeque<Frame>,
    open: bool,
    overflowed: bool,
    dropped: u64,
}

struct Shared {
    state: Mutex<State>,
    notify: Notify,
    evict: Notify,
    capacity: usize,
    policy: OverflowPolicy,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 出站队列的生产端，可克隆
#[derive(Clone)]
pub struct Outbox {
    shared: Arc<Shared>,
}

/// 出站队列的消费端，由写循环独占
pub struct OutboxReceiver {
    shared: Arc<Shared>,
}

impl Outbox {
    /// 创建一对生产端 / 消费端
    pub fn new(config: &OutboxConfig) -> (Outbox, OutboxReceiver) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                open: true,
                overflowed: false,
                dropped: 0,
            }),
            notify: Notify::new(),
            evict: Notify::new(),
            capacity: config.capacity.max(1),
            policy: config.policy,
        });

        (
            Outbox {
                shared: Arc::clone(&shared),
            },
            OutboxReceiver { shared },
        )
    }

    /// 入队一帧
    ///
    /// 队列为空时写循环会被立即唤醒开始写这一帧。
    pub fn push(&self, frame: Frame) -> Result<Enqueued, OutboxError> {
        let mut state = self.shared.lock();
        if !state.open {
            return Err(OutboxError::Closed);
        }

        let mut outcome = Enqueued::Queued;
        if state.queue.len() >= self.shared.capacity {
            match self.shared.policy {
                OverflowPolicy::DropOldest => {
                    state.queue.pop_front();
                    state.dropped += 1;
                    outcome = Enqueued::DroppedOldest;
                }
                OverflowPolicy::Disconnect => {
                    state.open = false;
                    state.overflowed = true;
                    state.queue.clear();
                    drop(state);
                    self.shared.notify.notify_one();
                    self.shared.evict.notify_waiters();
                    return Err(OutboxError::Overflow {
                        capacity: self.shared.capacity,
                    });
                }
            }
        }

        state.queue.push_back(frame);
        drop(state);
        self.shared.notify.notify_one();
        Ok(outcome)
    }

    /// 关闭队列：不再接受新帧，已排队的帧仍会被写完
    pub fn close(&self) {
        self.shared.lock().open = false;
        self.shared.notify.notify_one();
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        !self.shared.lock().open
    }

    /// 当前排队帧数
    pub fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// 因 DropOldest 丢弃的帧数
    pub fn dropped(&self) -> u64 {
        self.shared.lock().dropped
    }
}

impl OutboxReceiver {
    /// 取出队首帧；队列关闭且已排空时返回 `None`
    pub async fn next(&mut self) -> Option<Frame> {
        loop {
            {
                let mut state = self.shared.lock();
                if let Some(frame) = state.queue.pop_front() {
                    return Some(frame);
                }
                if !state.open {
                    return None;
                }
            }
            self.shared.notify.notified().await;
        }
    }

    /// 是否因溢出（Disconnect 策略）被关闭
    pub fn overflowed(&self) -> bool {
        self.shared.lock().overflowed
    }

    /// 等待溢出驱逐
    ///
    /// 写循环在一帧写到一半时用它同时等待驱逐，
    /// 对端停止读取时不会一直卡在这次写上。
    pub async fn evicted(&self) {
        loop {
            let notified = self.shared.evict.notified();
            if self.overflowed() {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for OutboxReceiver {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.open = false;
        state.queue.clear();
    }
}
