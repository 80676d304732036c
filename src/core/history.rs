//! 任务运行历史
//!
//! 由编排器持有，每次 run_task 完成后追加；只能被显式清空。

use uuid::Uuid;

use crate::core::TaskRun;

#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    runs: Vec<TaskRun>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, run: TaskRun) {
        self.runs.push(run);
    }

    /// 按运行顺序
    pub fn runs(&self) -> &[TaskRun] {
        &self.runs
    }

    pub fn get(&self, id: Uuid) -> Option<&TaskRun> {
        self.runs.iter().find(|r| r.id == id)
    }

    pub fn latest(&self) -> Option<&TaskRun> {
        self.runs.last()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn clear(&mut self) {
        let dropped = self.runs.len();
        self.runs.clear();
        tracing::info!(dropped, "run history cleared");
    }
}
