//! 本地输入循环
//!
//! 在输入线程上阻塞读取行。普通行加上显示名前缀后成帧交给网络线程；
//! `~<数字>` 是本地音量命令，只在本地生效，永远不会发出。

use std::io::{self, BufRead};
use std::path::Path;

use relay_protocol::{Frame, MAX_VOLUME};
use tracing::warn;

use crate::audio::AudioPlayback;
use crate::settings::{ConfigStore, Settings};

/// 本地音量命令的前导字符
pub const VOLUME_SIGIL: char = '~';

/// 一行输入的解释结果
#[derive(Debug, PartialEq, Eq)]
pub enum LocalCommand {
    /// 调整本地音量
    SetVolume(u8),
    /// 发给服务器
    Send(Frame),
}

/// 出站帧的接收方（网络线程）
pub trait FrameSink {
    /// 交出一帧，网络线程已退出时返回 false
    fn write(&self, frame: Frame) -> bool;
}

/// 解释一行输入
pub fn interpret(line: &str, prefix: &str) -> LocalCommand {
    match line.strip_prefix(VOLUME_SIGIL) {
        Some(value) => LocalCommand::SetVolume(parse_volume(value)),
        None => LocalCommand::Send(Frame::with_prefix(prefix, line)),
    }
}

/// 按 C `atoi` 的规则解析：跳过前导空白，可选符号，随后的数字；否则为 0。
/// 结果截断到 `0..=MAX_VOLUME`。
fn parse_volume(text: &str) -> u8 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let mut value: u32 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value.saturating_mul(10).saturating_add(u32::from(b - b'0'));
    }

    if negative {
        0
    } else {
        value.min(u32::from(MAX_VOLUME)) as u8
    }
}

/// 启动时打印的说明
pub fn banner(settings: &Settings, config_path: &Path) -> String {
    format!(
        "##############\n\
         set new name by passing it as an argument when invoking program\n\
         type {sigil}<0-{max}> to set sound volume\n\
         all changes are saved to {path}\n\
         (relative to application dir)\n\
         your name: {name}",
        sigil = VOLUME_SIGIL,
        max = MAX_VOLUME,
        path = config_path.display(),
        name = settings.name,
    )
}

/// 运行输入循环，直到输入结束
pub fn run_input<R, S, K>(
    input: R,
    settings: &mut Settings,
    store: &S,
    audio: &dyn AudioPlayback,
    sink: &K,
) -> io::Result<()>
where
    R: BufRead,
    S: ConfigStore + ?Sized,
    K: FrameSink + ?Sized,
{
    let prefix = settings.prefix();

    for line in input.split(b'\n') {
        let line = line?;
        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end_matches('\r');

        match interpret(line, &prefix) {
            LocalCommand::SetVolume(volume) => {
                settings.volume = audio.set_volume(volume);
                println!("new volume set: {}", settings.volume);
                if let Err(e) = store.save(settings) {
                    warn!("Failed to save settings: {}", e);
                }
            }
            LocalCommand::Send(frame) => {
                if !sink.write(frame) {
                    warn!("Network thread has stopped, input is discarded");
                }
            }
        }
    }

    Ok(())
}
