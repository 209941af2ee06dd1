//! 本地目录遍历

use crate::error::SyncError;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// 遍历得到的一个普通文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub absolute_path: PathBuf,
    /// 相对于同步根目录的路径
    pub relative_path: PathBuf,
}

/// 待同步的本地目录树
#[derive(Debug, Clone)]
pub struct LocalTree {
    root: PathBuf,
}

impl LocalTree {
    /// 打开根目录；不存在、不是目录或不可读时返回配置错误
    pub fn open(root: impl AsRef<Path>) -> Result<Self, SyncError> {
        let root = root.as_ref();
        let root = std::path::absolute(root).map_err(|e| {
            SyncError::configuration(format!("invalid sync folder {}: {}", root.display(), e))
        })?;

        if !root.is_dir() {
            return Err(SyncError::configuration(format!(
                "sync folder {} does not exist or is not a directory",
                root.display()
            )));
        }
        fs::read_dir(&root).map_err(|e| {
            SyncError::configuration(format!(
                "sync folder {} is not readable: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 惰性遍历所有普通文件；每次调用都从头开始。
    /// 同一目录内按文件名排序，不跟随符号链接。
    pub fn entries(&self) -> impl Iterator<Item = LocalEntry> {
        let root = self.root.clone();
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|res| match res {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("跳过无法读取的条目: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| {
                let relative_path = entry.path().strip_prefix(&root).ok()?.to_path_buf();
                Some(LocalEntry {
                    absolute_path: entry.into_path(),
                    relative_path,
                })
            })
    }

    /// 在阻塞线程池中遍历，通过有界通道逐个送出条目。
    /// 接收端被丢弃后遍历随之停止。
    pub fn spawn_walk(&self, capacity: usize) -> mpsc::Receiver<LocalEntry> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let tree = self.clone();
        tokio::task::spawn_blocking(move || {
            for entry in tree.entries() {
                if tx.blocking_send(entry).is_err() {
                    debug!("遍历提前结束: {}", tree.root.display());
                    return;
                }
            }
        });
        rx
    }
}
