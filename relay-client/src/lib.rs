//! 中继客户端
//!
//! - 网络侧 (Link / PeerHandle)：单个到服务器的链路
//! - 输入循环 (run_input)：控制台行成帧，拦截本地音量命令
//! - 外部协作者：显示 (Presenter)、提示音 (AudioPlayback)、设置存储 (ConfigStore)

mod audio;
mod input;
mod peer;
mod render;
mod settings;

pub use audio::{AudioPlayback, Muted, TerminalBell};
pub use input::{banner, interpret, run_input, FrameSink, LocalCommand, VOLUME_SIGIL};
pub use peer::{Link, LinkEnd, PeerConfig, PeerHandle};
pub use render::{ConsolePresenter, Presenter};
pub use settings::{
    load_or_default, ConfigStore, FileConfigStore, Settings, SettingsError, DEFAULT_CONFIG_PATH,
    DEFAULT_NAME,
};
