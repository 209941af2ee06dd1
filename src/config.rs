//! 应用配置模块
//!
//! 配置保存在 `config.json` 中。同步相关的字段位于顶层（与旧版配置文件兼容），
//! 引擎参数和日志参数分别位于 `engine` 与 `log` 子对象中。

use crate::error::SyncError;
use crate::logging::LogConfig;
use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// 存储类型
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    S3,
    /// 本地目录充当存储桶
    Local,
}

/// 同步设置：一次同步过程中只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub sync_folder: PathBuf,
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub aws_access_key: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub aws_secret_key: Option<String>,
    /// S3 兼容服务的自定义端点
    #[serde(default, deserialize_with = "empty_as_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub storage_type: StorageType,
}

fn default_region() -> String {
    "us-east-2".to_string()
}

/// 空字符串视为未设置
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sync_folder: PathBuf::new(),
            bucket_name: String::new(),
            region: default_region(),
            aws_access_key: None,
            aws_secret_key: None,
            endpoint: None,
            storage_type: StorageType::default(),
        }
    }
}

impl SyncSettings {
    /// 静态凭证；两个密钥都存在时才使用，否则走环境/默认凭证链
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.aws_access_key, &self.aws_secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }

    /// 检查配置是否可以开始同步
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.bucket_name.trim().is_empty() {
            return Err(SyncError::configuration("bucket name must not be empty"));
        }
        if self.sync_folder.as_os_str().is_empty() {
            return Err(SyncError::configuration("sync folder is not set"));
        }
        if !self.sync_folder.is_dir() {
            return Err(SyncError::configuration(format!(
                "sync folder {} does not exist or is not a directory",
                self.sync_folder.display()
            )));
        }
        fs::read_dir(&self.sync_folder).map_err(|e| {
            SyncError::configuration(format!(
                "sync folder {} is not readable: {}",
                self.sync_folder.display(),
                e
            ))
        })?;
        Ok(())
    }
}

/// 同步引擎参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOptions {
    /// 单个文件上传失败后的最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 重试基础延迟（毫秒），按指数退避
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// 非 IO 操作超时（秒）- list, stat 等
    #[serde(default = "default_op_timeout_secs")]
    pub op_timeout_secs: u64,
    /// IO 操作超时（秒）- 读写数据
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    /// 上传分块大小（字节）
    #[serde(default = "default_upload_chunk_size")]
    pub upload_chunk_size: usize,
    /// 目录遍历与上传之间的缓冲条目数
    #[serde(default = "default_walk_buffer")]
    pub walk_buffer: usize,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_op_timeout_secs() -> u64 {
    60
}

fn default_io_timeout_secs() -> u64 {
    300
}

fn default_upload_chunk_size() -> usize {
    8 * 1024 * 1024 // 8MB
}

fn default_walk_buffer() -> usize {
    64
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            op_timeout_secs: default_op_timeout_secs(),
            io_timeout_secs: default_io_timeout_secs(),
            upload_chunk_size: default_upload_chunk_size(),
            walk_buffer: default_walk_buffer(),
        }
    }
}

/// 完整的 `config.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub engine: EngineOptions,
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 从配置文件加载
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        info!("配置已加载: {}", path.display());
        Ok(config)
    }

    /// 加载配置，文件不存在时写入默认配置
    pub fn load_or_init(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!("已创建默认配置文件: {}", path.display());
            return Ok(config);
        }
        Self::load(path)
    }

    /// 保存配置
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        Ok(())
    }
}
