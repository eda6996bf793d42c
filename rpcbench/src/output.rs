use crate::cli::OutputFormat;
use std::path::Path;

use rpcbench_core::{ProgressFn, ResultMapping, RunMatrix};

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, plan_path: &Path, matrix: &RunMatrix);
    fn progress(&self) -> Option<ProgressFn>;
    fn print_summary(&self, results: &ResultMapping) -> anyhow::Result<()>;

    /// Tear down live progress output. Called once the runner returns, on success or failure.
    fn finish(&self) {}
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
