use std::path::Path;
use std::sync::Arc;

mod format;
mod progress;
mod summary;

use format::format_duration;
use progress::HumanProgress;
use rpcbench_core::{ProgressFn, ProgressUpdate, ResultMapping, RunMatrix};
use summary::render;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, plan_path: &Path, matrix: &RunMatrix) {
        println!("plan: {}", plan_path.display());
        for run in matrix.runs() {
            let remote = run
                .node
                .remote
                .as_ref()
                .map(|r| format!(" remote={r}"))
                .unwrap_or_default();
            println!(
                "run: {} url={}{remote} rates={:?} duration={}",
                run.label,
                run.node.url,
                run.test.rates(),
                format_duration(std::time::Duration::from_secs(run.test.total_duration())),
            );
        }
        if !matrix.is_empty() {
            println!();
        }
    }

    fn progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone();

        Some(Arc::new(move |u| match u {
            ProgressUpdate::AttackStarted(a) => {
                progress.attack_started(
                    &a.run,
                    a.attacks,
                    format!("rate={}/s duration={}s", a.rate, a.duration),
                );
            }
            ProgressUpdate::AttackFinished { attack, .. } => {
                progress.attack_finished(&attack.run, attack.attack, attack.attacks);
            }
            ProgressUpdate::RunFinished { run, elapsed, .. } => {
                progress.run_finished(&run, format!("done in {}", format_duration(elapsed)));
            }
        }))
    }

    fn print_summary(&self, results: &ResultMapping) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(results));
        Ok(())
    }

    fn finish(&self) {
        self.progress.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcbench_core::AttackProgress;

    #[test]
    fn finish_clears_bars_left_by_an_aborted_run() {
        let out = HumanReadableOutput::new();
        let Some(progress) = out.progress() else {
            panic!("human output always reports progress");
        };

        progress(ProgressUpdate::AttackStarted(AttackProgress {
            run: "geth__by_number".to_string(),
            attack: 1,
            attacks: 3,
            rate: 10,
            duration: 1,
        }));
        assert_eq!(out.progress.active_bars(), 1);

        out.finish();
        assert_eq!(out.progress.active_bars(), 0);

        // Idempotent.
        out.finish();
        assert_eq!(out.progress.active_bars(), 0);
    }
}
