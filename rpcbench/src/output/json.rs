use serde::Serialize;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use rpcbench_core::{ProgressFn, ProgressUpdate, ResultMapping, RunMatrix};

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _plan_path: &Path, _matrix: &RunMatrix) {}

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(&self, results: &ResultMapping) -> anyhow::Result<()> {
        emit_json_line(&JsonSummaryLine {
            kind: "summary",
            results,
        });
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine<'a> {
    pub kind: &'static str,
    pub run: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attacks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
}

fn build_progress_line(u: &ProgressUpdate) -> JsonProgressLine<'_> {
    match u {
        ProgressUpdate::AttackStarted(a) => JsonProgressLine {
            kind: "attack_started",
            run: &a.run,
            attack: Some(a.attack),
            attacks: Some(a.attacks),
            rate: Some(a.rate),
            duration_secs: Some(a.duration),
            index: None,
            runs: None,
            elapsed_secs: None,
        },
        ProgressUpdate::AttackFinished { attack: a, elapsed } => JsonProgressLine {
            kind: "attack_finished",
            run: &a.run,
            attack: Some(a.attack),
            attacks: Some(a.attacks),
            rate: Some(a.rate),
            duration_secs: Some(a.duration),
            index: None,
            runs: None,
            elapsed_secs: Some(elapsed.as_secs_f64()),
        },
        ProgressUpdate::RunFinished {
            run,
            index,
            runs,
            elapsed,
        } => JsonProgressLine {
            kind: "run_finished",
            run,
            attack: None,
            attacks: None,
            rate: None,
            duration_secs: None,
            index: Some(*index),
            runs: Some(*runs),
            elapsed_secs: Some(elapsed.as_secs_f64()),
        },
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine<'a> {
    pub kind: &'static str,
    pub results: &'a ResultMapping,
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
