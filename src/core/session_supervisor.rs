//! 会话监管：运行级取消
//!
//! 每次运行开始时换发新的 CancellationToken（已取消的令牌无法复位）；
//! 操作者可以从其他任务（如 Ctrl+C 处理器）调用 cancel()，中断正在进行的模型请求或工具调用。
//! 两次运行之间收到的取消会挂起，由下一次 begin_run 立即生效。

use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct RunState {
    token: CancellationToken,
    /// 每次 begin_run 递增
    generation: u64,
    /// 是否有运行持有当前令牌
    active: bool,
    /// 空闲期间收到的取消
    pending_cancel: bool,
}

/// 可克隆的取消句柄，克隆体共享同一个运行状态
#[derive(Debug, Clone, Default)]
pub struct SessionSupervisor {
    state: Arc<Mutex<RunState>>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为新一次运行换发令牌；守卫释放时运行结束
    pub fn begin_run(&self) -> RunGuard {
        let token = CancellationToken::new();
        let mut state = self.lock();
        if std::mem::take(&mut state.pending_cancel) {
            tracing::warn!("pending cancellation applied to new run");
            token.cancel();
        }
        state.token = token.clone();
        state.generation += 1;
        state.active = true;
        RunGuard {
            token,
            generation: state.generation,
            supervisor: self.clone(),
        }
    }

    /// 取消当前运行；没有运行时挂起到下一次运行
    pub fn cancel(&self) {
        tracing::warn!("cancellation requested");
        let mut state = self.lock();
        if state.active {
            state.token.cancel();
        } else {
            state.pending_cancel = true;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        let state = self.lock();
        state.token.is_cancelled() || state.pending_cancel
    }

    fn end_run(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation == generation {
            state.active = false;
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 一次运行的令牌持有者
#[derive(Debug)]
pub struct RunGuard {
    token: CancellationToken,
    generation: u64,
    supervisor: SessionSupervisor,
}

impl RunGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.supervisor.end_run(self.generation);
    }
}
