//! 任务监管：每个任务一个子取消令牌
//!
//! 所有任务令牌都派生自同一个根令牌；取消单个任务不影响其它任务，cancel_all 取消全部。

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct JobSupervisor {
    root: CancellationToken,
    jobs: DashMap<String, CancellationToken>,
}

impl JobSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记任务并返回其令牌；已取消的旧令牌会被替换，使任务可以继续运行
    pub fn register(&self, job_id: &str) -> CancellationToken {
        let mut entry = self
            .jobs
            .entry(job_id.to_string())
            .or_insert_with(|| self.root.child_token());
        if entry.is_cancelled() && !self.root.is_cancelled() {
            *entry = self.root.child_token();
        }
        entry.clone()
    }

    pub fn token(&self, job_id: &str) -> Option<CancellationToken> {
        self.jobs.get(job_id).map(|t| t.clone())
    }

    /// 取消单个任务；任务未登记时返回 false
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.jobs.get(job_id) {
            Some(token) => {
                token.cancel();
                tracing::info!(job_id, "job cancelled");
                true
            }
            None => false,
        }
    }

    /// 取消所有任务（包括之后登记的任务）
    pub fn cancel_all(&self) {
        self.root.cancel();
    }

    /// 任务结束后移除令牌
    pub fn release(&self, job_id: &str) {
        self.jobs.remove(job_id);
    }

    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }
}
