use crate::config::{EngineOptions, SyncSettings};
use crate::core::keys::object_key;
use crate::core::progress::{NoopSink, ProgressFn, ProgressSink, StatusFn, StatusSink};
use crate::core::walker::{LocalEntry, LocalTree};
use crate::error::SyncError;
use crate::storage::ObjectStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const STATUS_STARTING: &str = "Starting synchronization...";
pub const STATUS_STOPPED: &str = "Synchronization stopped.";
pub const STATUS_COMPLETED: &str = "Synchronization completed.";

/// 一次同步的结束状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum SyncOutcome {
    Completed,
    /// 用户停止，已上传的文件保留
    Stopped,
    Errored(String),
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: i64,
    pub finished_at: i64,
    /// 开始时存储桶中的对象数；枚举失败时为空
    pub remote_object_count: Option<u64>,
    pub files_processed: u32,
    pub files_uploaded: u32,
    pub files_failed: u32,
    pub bytes_uploaded: u64,
    pub errors: Vec<String>,
    pub outcome: SyncOutcome,
}

/// 单次同步过程中的状态，只在 `run` 内部使用
struct SyncRun {
    run_id: Uuid,
    started_at: i64,
    remote_object_count: Option<u64>,
    files_processed: u32,
    files_uploaded: u32,
    files_failed: u32,
    bytes_uploaded: u64,
    current_file: Option<String>,
    errors: Vec<String>,
}

impl SyncRun {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: chrono::Utc::now().timestamp(),
            remote_object_count: None,
            files_processed: 0,
            files_uploaded: 0,
            files_failed: 0,
            bytes_uploaded: 0,
            current_file: None,
            errors: Vec::new(),
        }
    }

    fn finish(self, outcome: SyncOutcome) -> SyncReport {
        SyncReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: chrono::Utc::now().timestamp(),
            remote_object_count: self.remote_object_count,
            files_processed: self.files_processed,
            files_uploaded: self.files_uploaded,
            files_failed: self.files_failed,
            bytes_uploaded: self.bytes_uploaded,
            errors: self.errors,
            outcome,
        }
    }
}

/// 同步引擎：把本地目录单向上传到存储桶
pub struct SyncEngine {
    settings: SyncSettings,
    store: Arc<dyn ObjectStore>,
    options: EngineOptions,
    progress: Arc<dyn ProgressSink>,
    status: Arc<dyn StatusSink>,
}

impl SyncEngine {
    pub fn new(settings: SyncSettings, store: Arc<dyn ObjectStore>) -> Result<Self, SyncError> {
        settings.validate()?;
        Ok(Self {
            settings,
            store,
            options: EngineOptions::default(),
            progress: Arc::new(NoopSink),
            status: Arc::new(NoopSink),
        })
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status = sink;
        self
    }

    pub fn on_progress<F>(self, f: F) -> Self
    where
        F: Fn(u64, Option<&str>) + Send + Sync + 'static,
    {
        self.with_progress_sink(Arc::new(ProgressFn(f)))
    }

    pub fn on_status<F>(self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.with_status_sink(Arc::new(StatusFn(f)))
    }

    /// 执行一次完整的同步。
    ///
    /// 取消只在文件之间检查：正在上传的文件会先完成。单个文件失败只记录，
    /// 不会中断同步；枚举存储桶失败则直接结束，不上传任何文件。
    pub async fn run(&self, cancel: &CancellationToken) -> SyncReport {
        let mut run = SyncRun::new();
        info!(
            "开始同步: {} -> {} ({})",
            self.settings.sync_folder.display(),
            self.store.name(),
            run.run_id
        );
        self.update_status(STATUS_STARTING);

        let tree = match LocalTree::open(&self.settings.sync_folder) {
            Ok(tree) => tree,
            Err(e) => return self.fail(run, e),
        };

        match self.store.count_objects().await {
            Ok(count) => {
                info!("存储桶中共有 {} 个对象", count);
                run.remote_object_count = Some(count);
            }
            Err(e) => return self.fail(run, SyncError::enumeration(&e)),
        }

        let mut entries = tree.spawn_walk(self.options.walk_buffer);
        while let Some(entry) = entries.recv().await {
            if cancel.is_cancelled() {
                info!(
                    "同步已被用户停止 (已处理 {} 个文件)",
                    run.files_processed
                );
                self.update_status(STATUS_STOPPED);
                return run.finish(SyncOutcome::Stopped);
            }
            self.sync_entry(&mut run, &entry, cancel).await;
        }

        self.progress.on_progress(0, None);
        self.update_status(STATUS_COMPLETED);
        info!(
            "同步完成: {} 个文件, 成功 {}, 失败 {}, {} 字节",
            run.files_processed, run.files_uploaded, run.files_failed, run.bytes_uploaded
        );
        run.finish(SyncOutcome::Completed)
    }

    async fn sync_entry(&self, run: &mut SyncRun, entry: &LocalEntry, cancel: &CancellationToken) {
        let key = object_key(&entry.relative_path);
        let display_name = key
            .clone()
            .unwrap_or_else(|| entry.relative_path.to_string_lossy().replace('\\', "/"));
        run.files_processed += 1;
        run.current_file = Some(display_name.clone());

        self.update_status(&format!("Uploading: {}", display_name));
        self.progress.on_progress(1, run.current_file.as_deref());

        let result = match key {
            Some(key) => self.upload_with_retry(entry, &key, cancel).await,
            None => Err(SyncError::non_utf8_name(&display_name)),
        };
        match result {
            Ok(bytes) => {
                run.files_uploaded += 1;
                run.bytes_uploaded += bytes;
                info!("已上传 {} 到 {}", display_name, self.store.name());
            }
            Err(e) => {
                error!("{}", e);
                run.files_failed += 1;
                run.errors.push(e.to_string());
            }
        }
    }

    /// 带重试的上传，指数退避；等待期间收到取消则放弃该文件
    async fn upload_with_retry(
        &self,
        entry: &LocalEntry,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<u64, SyncError> {
        let max_retries = self.options.max_retries;
        let mut attempt = 0;

        loop {
            match self.store.upload_file(&entry.absolute_path, key).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < max_retries => {
                    let delay = retry_delay(self.options.retry_base_delay_ms, attempt);
                    warn!(
                        "上传失败，{}ms 后重试 ({}/{}): {}: {:#}",
                        delay.as_millis(),
                        attempt + 1,
                        max_retries,
                        key,
                        e
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(SyncError::upload(key, &e)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(SyncError::upload(key, &e)),
            }
        }
    }

    fn fail(&self, run: SyncRun, err: SyncError) -> SyncReport {
        error!("同步失败: {}", err);
        let message = err.to_string();
        self.update_status(&format!("Error during synchronization: {}", message));
        run.finish(SyncOutcome::Errored(message))
    }

    fn update_status(&self, message: &str) {
        debug!("状态: {}", message);
        self.status.on_status(message);
    }
}

fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(1u64 << attempt.min(16)))
}
