//! 同步生命周期控制：同一时间最多一个后台同步任务

use crate::core::engine::{SyncEngine, SyncReport};
use scopeguard::ScopeGuard;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 控制器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    Idle,
    Running,
}

/// 正在运行的同步任务，任务结束前一直保留
struct ActivePass {
    cancel: CancellationToken,
    done: watch::Receiver<Option<SyncReport>>,
}

/// 等待任务发布报告；任务 panic 时发送端被丢弃，返回 `None`
async fn await_report(mut done: watch::Receiver<Option<SyncReport>>) -> Option<SyncReport> {
    let result = match done.wait_for(|report| report.is_some()).await {
        Ok(report) => (*report).clone(),
        Err(_) => {
            error!("同步任务异常退出");
            None
        }
    };
    result
}

struct Inner {
    active: Option<ActivePass>,
    last_report: Option<SyncReport>,
}

/// 同步控制器
#[derive(Clone)]
pub struct SyncController {
    engine: Arc<SyncEngine>,
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncController {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            inner: Arc::new(Mutex::new(Inner {
                active: None,
                last_report: None,
            })),
        }
    }

    /// 在后台启动一次同步。已有同步在运行时不做任何事并返回 `false`。
    ///
    /// 必须在 tokio 运行时中调用。
    pub fn start(&self) -> bool {
        let mut guard = lock(&self.inner);
        if guard.active.is_some() {
            info!("同步已在运行中，忽略本次启动请求");
            return false;
        }

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(None);
        let engine = self.engine.clone();
        let inner = self.inner.clone();
        let token = cancel.clone();

        tokio::spawn(async move {
            // 只在 panic 时生效：清掉运行中的任务，回到 Idle
            let on_panic = scopeguard::guard(inner, |inner| {
                error!("同步任务 panic，控制器回到空闲状态");
                lock(&inner).active = None;
            });

            let report = engine.run(&token).await;
            let inner = ScopeGuard::into_inner(on_panic);

            // 先回到 Idle 再发布报告，等待者醒来后即可再次 start
            {
                let mut guard = lock(&inner);
                guard.active = None;
                guard.last_report = Some(report.clone());
            }
            let _ = done_tx.send(Some(report));
        });

        guard.active = Some(ActivePass {
            cancel,
            done: done_rx,
        });
        info!("同步任务已启动");
        true
    }

    /// 请求停止并等待后台任务真正退出，返回该次同步的报告。
    /// 没有同步在运行时直接返回 `None`。多个调用者会等待同一次同步。
    pub async fn stop(&self) -> Option<SyncReport> {
        let done = {
            let guard = lock(&self.inner);
            let active = guard.active.as_ref()?;
            active.cancel.cancel();
            active.done.clone()
        };

        let report = await_report(done).await;
        if report.is_some() {
            info!("同步任务已停止");
        }
        report
    }

    /// 等待当前同步自然结束（不请求取消）；空闲时返回最近一次的报告
    pub async fn wait(&self) -> Option<SyncReport> {
        let done = {
            let guard = lock(&self.inner);
            match guard.active.as_ref() {
                Some(active) => active.done.clone(),
                None => return guard.last_report.clone(),
            }
        };
        await_report(done).await
    }

    pub fn state(&self) -> ControllerState {
        if lock(&self.inner).active.is_some() {
            ControllerState::Running
        } else {
            ControllerState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == ControllerState::Running
    }

    /// 最近一次结束的同步报告
    pub fn last_report(&self) -> Option<SyncReport> {
        lock(&self.inner).last_report.clone()
    }
}
