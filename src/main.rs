//! TaskBee 命令行入口：加载配置、装配编排器、规划并执行一个任务，打印计划、每步摘要与结论。

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use taskbee::config::load_config;
use taskbee::core::{OverallStatus, TaskRun};
use taskbee::{observability, OrchestratorBuilder};

#[derive(Parser)]
#[command(name = "taskbee")]
#[command(about = "Plan a task with an LLM and execute it step by step with sandboxed tools")]
struct Args {
    /// Task description
    task: String,

    /// Keep going after a failed step
    #[arg(long)]
    yolo: bool,

    /// Extra config file layered over config/default.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Workspace directory for file_manager (overrides [app].workspace_root)
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Print the full run as JSON
    #[arg(long)]
    json: bool,

    /// Only generate and print the plan
    #[arg(long)]
    plan_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    observability::init();
    let args = Args::parse();

    let mut config = load_config(args.config.clone()).context("failed to load configuration")?;
    if let Some(workspace) = args.workspace {
        config.app.workspace_root = workspace;
    }
    let yolo_mode = args.yolo || config.app.default_yolo_mode;

    let mut orchestrator = OrchestratorBuilder::from_config(config)?
        .build()
        .await
        .context("failed to build orchestrator")?;

    let supervisor = orchestrator.supervisor().clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            supervisor.cancel();
        }
    });

    if args.plan_only {
        let plan = orchestrator.plan(&args.task).await.context("planning failed")?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            print!("{}", plan.to_text());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let run = orchestrator
        .run_task(&args.task, yolo_mode)
        .await
        .context("task run failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_run(&run);
    }

    Ok(match run.execution.overall_status {
        OverallStatus::Completed => ExitCode::SUCCESS,
        OverallStatus::Failed => ExitCode::FAILURE,
    })
}

fn print_run(run: &TaskRun) {
    println!("Task: {}", run.task);
    println!("Mode: {}", if run.yolo_mode { "YOLO" } else { "stop on failure" });
    println!("\nPlan:\n{}", run.plan.to_text());
    for record in &run.execution.steps {
        println!("[{}] Step {}: {}", record.status, record.step_num, record.description);
        println!("    {}", record.result.summary);
        for te in &record.result.tool_executions {
            match &te.error {
                Some(e) => println!("    - {} failed: {}", te.tool, e),
                None => println!("    - {} ok", te.tool),
            }
        }
    }
    println!("\n{} ({:.1}s)", run.execution.verdict(), run.execution.duration);
}
