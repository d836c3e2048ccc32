//! clipflow - 短视频制作流水线
//!
//! 入口：初始化日志、加载配置、构建编排器，以命令行参数作为 brief 运行一个任务并输出 JSON 报告。

use anyhow::Context;
use clipflow::{observability, Brief, Job, OrchestratorBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let description = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if description.trim().is_empty() {
        anyhow::bail!("usage: clipflow <brief description>");
    }

    // 配置文件缺失时使用默认值；文件存在但无法解析则直接退出
    let config_path = std::env::var("CLIPFLOW_CONFIG").ok().map(Into::into);
    let orchestrator = OrchestratorBuilder::from_config_path(config_path)
        .context("Invalid configuration")?
        .build();
    let mut job = Job::new(Brief::new(description));
    tracing::info!(job_id = %job.job_id(), "job submitted");

    // Ctrl+C 取消当前任务；已完成的阶段保留
    let supervisor = orchestrator.supervisor().clone();
    let job_id = job.job_id().to_string();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            supervisor.cancel(&job_id);
        }
    });

    let report = orchestrator.run(&mut job).await.context("Job failed")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );
    Ok(())
}
