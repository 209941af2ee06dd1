use super::{build_operator, count_operator_objects, upload_with_operator, ObjectStore};
use crate::config::{EngineOptions, SyncSettings};
use anyhow::Result;
use async_trait::async_trait;
use opendal::Operator;
use std::path::Path;

/// S3（及兼容服务）存储桶
pub struct S3Store {
    operator: Operator,
    chunk_size: usize,
    name: String,
}

impl S3Store {
    pub fn new(settings: &SyncSettings, options: &EngineOptions) -> Result<Self> {
        use opendal::services::S3;

        let mut builder = S3::default()
            .bucket(&settings.bucket_name)
            .region(&settings.region);

        // 未配置静态密钥时使用环境变量 / 配置文件 / 实例角色等默认凭证
        if let Some((access_key, secret_key)) = settings.credentials() {
            builder = builder
                .access_key_id(access_key)
                .secret_access_key(secret_key);
        }

        if let Some(ref ep) = settings.endpoint {
            builder = builder.endpoint(ep);
        }

        let operator = build_operator(builder, options)?;

        Ok(Self {
            operator,
            chunk_size: options.upload_chunk_size,
            name: format!("s3://{}", settings.bucket_name),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn count_objects(&self) -> Result<u64> {
        count_operator_objects(&self.operator).await
    }

    async fn upload_file(&self, local_path: &Path, key: &str) -> Result<u64> {
        upload_with_operator(&self.operator, local_path, key, self.chunk_size).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
