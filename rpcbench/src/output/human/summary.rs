use std::fmt::Write as _;

use rpcbench_core::{LoadTestOutput, ResultMapping};
use serde_json::Value;

use super::format::{format_bytes, format_latency_secs, format_percent, format_rate};

/// Metrics rendered as table columns, in order; anything else is listed after the table.
const COLUMNS: &[(&str, Column)] = &[
    ("target_rate", Column::Integer),
    ("actual_rate", Column::Rate),
    ("requests", Column::Integer),
    ("success", Column::Percent),
    ("throughput", Column::Rate),
    ("p50", Column::Latency),
    ("p90", Column::Latency),
    ("p99", Column::Latency),
    ("max", Column::Latency),
    ("bytes_in", Column::Bytes),
];

const HIDDEN: &[&str] = &[
    "target_duration",
    "actual_duration",
    "min",
    "mean",
    "p95",
    "bytes_out",
];

#[derive(Debug, Clone, Copy)]
enum Column {
    Integer,
    Rate,
    Percent,
    Latency,
    Bytes,
}

impl Column {
    fn render(self, v: &Value) -> String {
        let Some(n) = v.as_f64() else {
            return value_inline(v);
        };
        match self {
            Self::Integer => format!("{n:.0}"),
            Self::Rate => format_rate(n),
            Self::Percent => format_percent(n),
            Self::Latency => format_latency_secs(n),
            Self::Bytes => format_bytes(n.max(0.0) as u64),
        }
    }
}

pub(crate) fn render(results: &ResultMapping) -> String {
    let mut out = String::new();

    if results.is_empty() {
        out.push_str("summary: no runs\n");
        return out;
    }

    out.push_str("summary\n");
    for (run, output) in results {
        writeln!(&mut out, "run: {run}").ok();
        render_run(output, &mut out);
        out.push('\n');
    }

    out
}

fn render_run(output: &LoadTestOutput, out: &mut String) {
    let attacks = output.values().map(Vec::len).max().unwrap_or(0);
    let columns: Vec<(&str, Column)> = COLUMNS
        .iter()
        .copied()
        .filter(|(key, _)| output.contains_key(*key))
        .collect();

    if !columns.is_empty() {
        let mut rows: Vec<Vec<String>> = Vec::with_capacity(attacks + 1);
        let mut header = vec!["#".to_string()];
        header.extend(columns.iter().map(|(key, _)| (*key).to_string()));
        rows.push(header);

        for idx in 0..attacks {
            let mut row = vec![(idx + 1).to_string()];
            for (key, col) in &columns {
                let cell = output
                    .get(*key)
                    .and_then(|series| series.get(idx))
                    .map_or_else(|| "-".to_string(), |v| col.render(v));
                row.push(cell);
            }
            rows.push(row);
        }

        write_table(&rows, out);
    }

    for (key, series) in output {
        if COLUMNS.iter().any(|(k, _)| *k == key.as_str()) || HIDDEN.contains(&key.as_str()) {
            continue;
        }
        if series.iter().all(is_empty_value) {
            continue;
        }
        let rendered = series.iter().map(value_inline).collect::<Vec<_>>();
        writeln!(out, "  {key}: {}", rendered.join(" | ")).ok();
    }
}

fn write_table(rows: &[Vec<String>], out: &mut String) {
    let cols = rows.first().map_or(0, Vec::len);
    let widths: Vec<usize> = (0..cols)
        .map(|c| {
            rows.iter()
                .filter_map(|r| r.get(c))
                .map(String::len)
                .max()
                .unwrap_or(0)
        })
        .collect();

    for row in rows {
        out.push(' ');
        for (cell, width) in row.iter().zip(&widths) {
            write!(out, " {cell:>width$}").ok();
        }
        out.push('\n');
    }
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn value_inline(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}={}", value_inline(v)))
            .collect::<Vec<_>>()
            .join(","),
        Value::Array(items) => items
            .iter()
            .map(value_inline)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}
