//! 收到帧时的提示音

use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};

use relay_protocol::MAX_VOLUME;

/// 音频播放
///
/// 网络线程调用 `play`，输入线程调用 `set_volume`，所以要求 `Sync`。
pub trait AudioPlayback: Send + Sync {
    /// 播放一次提示音
    fn play(&self);

    /// 设置音量，超出 `0..=MAX_VOLUME` 的值被截断，返回实际生效的音量
    fn set_volume(&self, volume: u8) -> u8;

    /// 当前音量
    fn volume(&self) -> u8;
}

/// 终端响铃，音量为 0 时静音
#[derive(Debug)]
pub struct TerminalBell {
    volume: AtomicU8,
}

impl TerminalBell {
    pub fn new(volume: u8) -> Self {
        Self {
            volume: AtomicU8::new(volume.min(MAX_VOLUME)),
        }
    }
}

impl AudioPlayback for TerminalBell {
    fn play(&self) {
        if self.volume() == 0 {
            return;
        }
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(b"\x07");
        let _ = out.flush();
    }

    fn set_volume(&self, volume: u8) -> u8 {
        let volume = volume.min(MAX_VOLUME);
        self.volume.store(volume, Ordering::Relaxed);
        volume
    }

    fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }
}

/// 不发声，只记录音量（输出不是终端时使用）
#[derive(Debug)]
pub struct Muted {
    volume: AtomicU8,
}

impl Muted {
    pub fn new(volume: u8) -> Self {
        Self {
            volume: AtomicU8::new(volume.min(MAX_VOLUME)),
        }
    }
}

impl AudioPlayback for Muted {
    fn play(&self) {}

    fn set_volume(&self, volume: u8) -> u8 {
        let volume = volume.min(MAX_VOLUME);
        self.volume.store(volume, Ordering::Relaxed);
        volume
    }

    fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }
}
