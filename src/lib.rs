// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{PlanFile, load_and_validate};
use crate::dag::{DependencyGraph, ExecutionPlan};
use crate::engine::{ExecutionReport, Parallelizer};
use crate::exec::{ShellOutput, ShellWorker};
use crate::types::TaskStatus;

/// Entry point used by `main.rs`.
///
/// Returns `Ok(true)` when every task completed, `Ok(false)` when at least
/// one did not.
pub async fn run(args: CliArgs) -> Result<bool> {
    let plan_file = load_and_validate(&args.plan)?;
    let tasks = plan_file.tasks();

    if args.dot {
        let graph = DependencyGraph::build(&tasks)?;
        print!("{}", graph.to_dot());
        return Ok(true);
    }

    if args.dry_run {
        let graph = DependencyGraph::build(&tasks)?;
        let plan = ExecutionPlan::from_graph(&graph)?;
        print_dry_run(&plan_file, &plan);
        return Ok(true);
    }

    let mut worker = ShellWorker::new();
    if let Some(dir) = plan_dir(&args) {
        worker = worker.with_working_dir(dir);
    }

    let parallelizer = Arc::new(Parallelizer::new(plan_file.scheduler_config(), worker));

    // Ctrl-C: stop admitting work and skip remaining stages.
    {
        let parallelizer = Arc::clone(&parallelizer);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received");
            parallelizer.shutdown();
        });
    }

    let report = parallelizer.execute_tasks(&tasks).await?;
    print_summary(&report);

    Ok(report.all_completed())
}

/// Commands run relative to the plan file's directory.
fn plan_dir(args: &CliArgs) -> Option<std::path::PathBuf> {
    args.plan
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
}

fn print_dry_run(plan_file: &PlanFile, plan: &ExecutionPlan) {
    let cfg = plan_file.scheduler_config();

    println!("taskstage dry-run");
    println!("  max_concurrency = {}", cfg.max_concurrency);
    println!("  priority_queues = {}", cfg.priority_queues);
    println!("  failure_policy = {:?}", cfg.failure_policy);
    println!(
        "  retry = {} retries, {:?} backoff{}",
        cfg.retry.max_retries,
        cfg.retry.backoff,
        if cfg.retry.exponential { " (exponential)" } else { "" }
    );
    println!();

    println!("stages ({}):", plan.len());
    for (i, stage) in plan.stage_ids().iter().enumerate() {
        println!("  {i}: {}", stage.join(", "));
    }
    println!();
    println!("critical path: {}", plan.critical_path().join(" -> "));
    println!("parallelism factor: {:.2}", plan.parallelism_factor());
    println!("estimated duration: {:?}", plan.estimated_duration());

    debug!("dry-run complete (no execution)");
}

fn print_summary(report: &ExecutionReport<ShellOutput>) {
    let metrics = report.metrics();

    println!(
        "{} tasks: {} completed, {} failed, {} skipped",
        report.len(),
        metrics.completed_tasks,
        metrics.failed_tasks,
        metrics.skipped_tasks
    );

    for record in report.records() {
        match record.status {
            TaskStatus::Failed => {
                let reason = record
                    .error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                println!("  FAILED  {} ({} attempts): {reason}", record.id, record.attempts);
            }
            TaskStatus::Skipped => println!("  SKIPPED {}", record.id),
            TaskStatus::Pending => println!("  PENDING {} (not dispatched)", record.id),
            TaskStatus::Completed | TaskStatus::Running => {}
        }
    }
}
