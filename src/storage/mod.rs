pub mod local;
pub mod s3;

#[cfg(test)]
pub mod memory;

use crate::config::{EngineOptions, StorageType, SyncSettings};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::layers::TimeoutLayer;
use opendal::{Builder, Operator};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

pub use local::LocalStore;
pub use s3::S3Store;

/// 对象存储抽象接口
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 分页遍历存储桶，返回对象总数（仅用于日志/状态）
    async fn count_objects(&self) -> Result<u64>;

    /// 上传本地文件到指定 key，无条件覆盖已有对象，返回写入字节数
    async fn upload_file(&self, local_path: &Path, key: &str) -> Result<u64>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建存储实例
pub fn create_store(
    settings: &SyncSettings,
    options: &EngineOptions,
) -> Result<Arc<dyn ObjectStore>> {
    match settings.storage_type {
        StorageType::S3 => {
            tracing::info!(
                "初始化S3存储: bucket={}, region={}",
                settings.bucket_name,
                settings.region
            );
            Ok(Arc::new(S3Store::new(settings, options)?) as Arc<dyn ObjectStore>)
        }
        StorageType::Local => {
            tracing::info!("初始化本地存储: {}", settings.bucket_name);
            Ok(Arc::new(LocalStore::new(&settings.bucket_name, options)?) as Arc<dyn ObjectStore>)
        }
    }
}

/// 构建带超时层的 Operator
fn build_operator<B: Builder>(builder: B, options: &EngineOptions) -> Result<Operator> {
    let operator = Operator::new(builder)?
        .layer(
            TimeoutLayer::default()
                .with_timeout(Duration::from_secs(options.op_timeout_secs))
                .with_io_timeout(Duration::from_secs(options.io_timeout_secs)),
        )
        .finish();
    Ok(operator)
}

/// 递归列出所有对象并计数（lister 内部处理分页）
async fn count_operator_objects(operator: &Operator) -> Result<u64> {
    let mut lister = operator.lister_with("").recursive(true).await?;
    let mut total = 0u64;
    while let Some(entry) = lister.try_next().await? {
        if !entry.metadata().is_dir() {
            total += 1;
        }
    }
    Ok(total)
}

/// 分块流式上传，避免把大文件整个读入内存
async fn upload_with_operator(
    operator: &Operator,
    local_path: &Path,
    key: &str,
    chunk_size: usize,
) -> Result<u64> {
    let chunk_size = chunk_size.max(1);
    let mut file = tokio::fs::File::open(local_path)
        .await
        .with_context(|| format!("failed to open {}", local_path.display()))?;
    let mut writer = operator.writer_with(key).chunk(chunk_size).await?;

    let mut buf = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        let n = match file.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                let _ = writer.abort().await;
                return Err(anyhow::Error::new(e)
                    .context(format!("failed to read {}", local_path.display())));
            }
        };
        if let Err(e) = writer.write(buf[..n].to_vec()).await {
            let _ = writer.abort().await;
            return Err(e.into());
        }
        total += n as u64;
    }

    writer.close().await?;
    Ok(total)
}
