//! 测试用的内存存储桶，记录每一次上传

use super::ObjectStore;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<String>>,
    attempts: Mutex<HashMap<String, u32>>,
    /// 每次上传都失败的 key
    failing_keys: HashSet<String>,
    /// 前 N 次尝试失败的 key
    flaky_keys: HashMap<String, u32>,
    missing_bucket: bool,
    /// 设置后每次上传需要先获取一个许可
    gate: Option<Arc<Semaphore>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn missing_bucket() -> Self {
        Self {
            missing_bucket: true,
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, key: &str) -> Self {
        self.failing_keys.insert(key.to_string());
        self
    }

    pub fn flaky_on(mut self, key: &str, failures: u32) -> Self {
        self.flaky_keys.insert(key.to_string(), failures);
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// 成功上传的 key，按上传顺序
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn attempts(&self, key: &str) -> u32 {
        self.attempts.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn count_objects(&self) -> Result<u64> {
        if self.missing_bucket {
            bail!("NoSuchBucket: the specified bucket does not exist");
        }
        Ok(self.objects.lock().unwrap().len() as u64)
    }

    async fn upload_file(&self, local_path: &Path, key: &str) -> Result<u64> {
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let counter = attempts.entry(key.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };
        if self.failing_keys.contains(key) {
            bail!("AccessDenied: upload of {} rejected", key);
        }
        if let Some(failures) = self.flaky_keys.get(key) {
            if attempt <= *failures {
                bail!("connection reset while uploading {}", key);
            }
        }

        let data = tokio::fs::read(local_path).await?;
        let size = data.len() as u64;
        self.objects.lock().unwrap().insert(key.to_string(), data);
        self.uploads.lock().unwrap().push(key.to_string());
        Ok(size)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
