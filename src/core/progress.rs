//! 进度与状态回调
//!
//! 两个通道相互独立，都可以不设置（默认什么也不做）。

use serde::Serialize;
use tokio::sync::mpsc;

/// 进度回调：处理每个文件前以增量 1 调用，结束时以 `(0, None)` 调用
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, increment: u64, current_file: Option<&str>);
}

/// 状态回调：人类可读的状态文本
pub trait StatusSink: Send + Sync {
    fn on_status(&self, message: &str);
}

/// 不做任何事的默认回调
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&self, _increment: u64, _current_file: Option<&str>) {}
}

impl StatusSink for NoopSink {
    fn on_status(&self, _message: &str) {}
}

/// 闭包形式的进度回调
pub struct ProgressFn<F>(pub F);

impl<F> ProgressSink for ProgressFn<F>
where
    F: Fn(u64, Option<&str>) + Send + Sync,
{
    fn on_progress(&self, increment: u64, current_file: Option<&str>) {
        (self.0)(increment, current_file)
    }
}

/// 闭包形式的状态回调
pub struct StatusFn<F>(pub F);

impl<F> StatusSink for StatusFn<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn on_status(&self, message: &str) {
        (self.0)(message)
    }
}

/// 单条进度更新
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub increment: u64,
    pub current_file: Option<String>,
}

/// 事件流中的一条事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    Progress(ProgressUpdate),
    Status { message: String },
}

/// 把两个回调合并成一个事件流，交给 UI 线程按顺序消费
#[derive(Debug, Clone)]
pub struct EventChannel {
    tx: mpsc::UnboundedSender<SyncEvent>,
}

impl EventChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for EventChannel {
    fn on_progress(&self, increment: u64, current_file: Option<&str>) {
        // 接收端已关闭时丢弃事件
        let _ = self.tx.send(SyncEvent::Progress(ProgressUpdate {
            increment,
            current_file: current_file.map(str::to_string),
        }));
    }
}

impl StatusSink for EventChannel {
    fn on_status(&self, message: &str) {
        let _ = self.tx.send(SyncEvent::Status {
            message: message.to_string(),
        });
    }
}
