//! 本地设置：显示名和音量
//!
//! 文件格式（空白分隔）:
//! ```text
//! alice
//! 96
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use relay_protocol::MAX_VOLUME;
use thiserror::Error;
use tracing::warn;

/// 默认显示名
pub const DEFAULT_NAME: &str = "guest";

/// 默认设置文件路径（相对于工作目录）
pub const DEFAULT_CONFIG_PATH: &str = "res/client_config";

/// 设置读写错误
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Malformed settings file {}", .path.display())]
    Format { path: PathBuf },
}

/// 本地设置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub name: String,
    pub volume: u8,
}

impl Settings {
    /// 每条发出的消息前面的显示名前缀
    pub fn prefix(&self) -> String {
        format!("{}: ", self.name)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            volume: MAX_VOLUME,
        }
    }
}

/// 设置持久化
pub trait ConfigStore {
    fn load(&self) -> Result<Settings, SettingsError>;
    fn save(&self, settings: &Settings) -> Result<(), SettingsError>;
}

/// 基于文本文件的设置存储
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let format_error = || SettingsError::Format {
            path: self.path.clone(),
        };

        let mut fields = content.split_whitespace();
        let name = fields.next().ok_or_else(format_error)?;
        let volume: i64 = fields
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(format_error)?;

        Ok(Settings {
            name: name.to_string(),
            volume: volume.clamp(0, MAX_VOLUME as i64) as u8,
        })
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        fs::write(&self.path, format!("{}\n{}", settings.name, settings.volume))
            .map_err(|e| self.io_error(e))
    }
}

/// 读取设置，失败时记日志并使用默认值
pub fn load_or_default<S: ConfigStore + ?Sized>(store: &S) -> Settings {
    match store.load() {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Using default settings: {}", e);
            Settings::default()
        }
    }
}
