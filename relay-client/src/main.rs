//! 中继客户端
//!
//! 控制台客户端：网络线程收发帧，主线程读取标准输入

use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::Result;
use relay_client::{
    banner, load_or_default, run_input, AudioPlayback, ConfigStore, ConsolePresenter,
    FileConfigStore, Muted, PeerConfig, PeerHandle, TerminalBell,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // 初始化日志（写到 stderr，不打断聊天输出）
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("relay_client=info".parse()?))
        .init();

    let store = FileConfigStore::default();
    let mut settings = load_or_default(&store);

    let (name, addr) = parse_args(std::env::args_os().skip(1));
    if let Some(name) = name {
        settings.name = name;
        if let Err(e) = store.save(&settings) {
            warn!("Failed to save settings: {}", e);
        }
    }
    let mut config = PeerConfig::default();
    if let Some(addr) = addr {
        config.server_addr = addr;
    }

    let audio: Arc<dyn AudioPlayback> = if io::stdout().is_terminal() {
        Arc::new(TerminalBell::new(settings.volume))
    } else {
        Arc::new(Muted::new(settings.volume))
    };

    println!("{}", banner(&settings, store.path()));

    let peer = PeerHandle::spawn(config, ConsolePresenter::default(), Arc::clone(&audio))?;
    run_input(io::stdin().lock(), &mut settings, &store, audio.as_ref(), &peer)?;
    peer.shutdown();

    Ok(())
}

/// 参数: [显示名] [服务器地址]，非 UTF-8 字节替换为 U+FFFD
fn parse_args(mut args: impl Iterator<Item = OsString>) -> (Option<String>, Option<String>) {
    let mut next = || args.next().map(|arg| arg.to_string_lossy().into_owned());
    let name = next();
    let addr = next();
    (name, addr)
}
