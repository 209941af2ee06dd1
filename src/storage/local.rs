use super::{build_operator, count_operator_objects, upload_with_operator, ObjectStore};
use crate::config::EngineOptions;
use anyhow::{bail, Result};
use async_trait::async_trait;
use opendal::Operator;
use std::path::{Path, PathBuf};

/// 本地目录充当存储桶，key 中的 `/` 映射为子目录
pub struct LocalStore {
    root: PathBuf,
    operator: Operator,
    chunk_size: usize,
    name: String,
}

impl LocalStore {
    /// 存储桶目录必须已经存在，不会自动创建
    pub fn new(root: impl AsRef<Path>, options: &EngineOptions) -> Result<Self> {
        use opendal::services::Fs;

        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            bail!("bucket directory {} does not exist", root.display());
        }
        let root_str = root
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("bucket directory is not valid UTF-8"))?;

        let operator = build_operator(Fs::default().root(root_str), options)?;
        let name = format!("local:{}", root.display());

        Ok(Self {
            root,
            operator,
            chunk_size: options.upload_chunk_size,
            name,
        })
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn count_objects(&self) -> Result<u64> {
        if !tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            bail!("bucket directory {} does not exist", self.root.display());
        }
        count_operator_objects(&self.operator).await
    }

    async fn upload_file(&self, local_path: &Path, key: &str) -> Result<u64> {
        upload_with_operator(&self.operator, local_path, key, self.chunk_size).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
