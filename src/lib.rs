pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::{AppConfig, EngineOptions, StorageType, SyncSettings};
pub use crate::core::{SyncController, SyncEngine, SyncOutcome, SyncReport};
pub use error::SyncError;

/// 平台相关的配置目录
pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }
    }

    /// 默认配置文件路径
    pub fn default_config_path() -> PathBuf {
        config_dir()
            .map(|p| p.join("cloudmirror"))
            .unwrap_or_else(|| PathBuf::from(".cloudmirror"))
            .join("config.json")
    }
}
