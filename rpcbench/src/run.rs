use anyhow::Context as _;
use std::path::Path;

use rpcbench_core::{
    AttackExecutor, NativeExecutor, ProgressFn, ResultMapping, RunMatrix, Runner, VegetaExecutor,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cli::{ExecutorKind, RunArgs};
use crate::exit_codes::ExitCode;
use crate::fs::write_file;
use crate::output;
use crate::plan::load_plan;
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.output);

    let plan = load_plan(&args.plan)
        .await
        .map_err(RunError::InvalidInput)?;
    let matrix = plan
        .into_matrix(args.seed, &args.only)
        .with_context(|| format!("invalid plan: {}", args.plan.display()))
        .map_err(RunError::InvalidInput)?;

    tracing::info!(
        plan = %args.plan.display(),
        runs = matrix.len(),
        executor = ?args.executor,
        total_secs = matrix.total_duration(),
        "plan loaded"
    );
    out.print_header(&args.plan, &matrix);

    let cancel = CancellationToken::new();
    let watcher = spawn_interrupt_watcher(cancel.clone());

    let results = match args.executor {
        ExecutorKind::Native => {
            execute(NativeExecutor::new(), &matrix, out.progress(), cancel).await
        }
        ExecutorKind::Vegeta => {
            execute(
                VegetaExecutor::new(&args.vegeta_bin),
                &matrix,
                out.progress(),
                cancel,
            )
            .await
        }
    };
    watcher.abort();
    out.finish();
    let results = results?;

    out.print_summary(&results)
        .map_err(RunError::RuntimeError)?;

    if let Some(path) = &args.out {
        write_results(path, &results)
            .await
            .map_err(RunError::RuntimeError)?;
    }

    Ok(ExitCode::Success)
}

async fn execute<E: AttackExecutor>(
    executor: E,
    matrix: &RunMatrix,
    progress: Option<ProgressFn>,
    cancel: CancellationToken,
) -> rpcbench_core::Result<ResultMapping> {
    Runner::new(executor)
        .with_progress(progress)
        .with_cancellation(cancel)
        .run_load_tests(matrix)
        .await
}

fn spawn_interrupt_watcher(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, aborting the current attack");
            cancel.cancel();
        }
    })
}

async fn write_results(path: &Path, results: &ResultMapping) -> anyhow::Result<()> {
    let mut json = serde_json::to_vec_pretty(results).context("failed to serialize results")?;
    json.push(b'\n');
    write_file(path, json, true).await
}
