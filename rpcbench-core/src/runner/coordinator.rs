use std::collections::HashSet;
use std::time::Instant;

use indexmap::IndexMap;

use super::error::{Error, Result};
use super::progress::ProgressUpdate;
use super::run::{LoadTestOutput, Runner};
use crate::executor::{AttackExecutor, RemoteExecutor};
use crate::load_test::LoadTest;
use crate::node::Node;

/// Outputs keyed by run label, in the order the runs executed.
pub type ResultMapping = IndexMap<String, LoadTestOutput>;

/// Separator between node and test names when both sides are keyed.
pub const RUN_KEY_SEPARATOR: &str = "__";

#[derive(Debug, Clone)]
pub enum NodeSelection {
    Single(Node),
    Many(IndexMap<String, Node>),
}

impl NodeSelection {
    /// Exactly one of `node` or `nodes` must be given.
    pub fn from_parts(node: Option<Node>, nodes: Option<IndexMap<String, Node>>) -> Result<Self> {
        Self::check_presence(node.is_some(), nodes.is_some())?;
        match (node, nodes) {
            (Some(node), None) => Ok(Self::Single(node)),
            (None, Some(nodes)) => Ok(Self::Many(nodes)),
            _ => Err(Error::config("must specify either node or nodes")),
        }
    }

    /// The `from_parts` shape check, for callers that have not built their nodes yet.
    pub fn check_presence(node: bool, nodes: bool) -> Result<()> {
        if node == nodes {
            return Err(Error::config("must specify either node or nodes"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum TestSelection {
    Single(LoadTest),
    Many(IndexMap<String, LoadTest>),
}

impl TestSelection {
    /// Exactly one of `test` or `tests` must be given.
    pub fn from_parts(
        test: Option<LoadTest>,
        tests: Option<IndexMap<String, LoadTest>>,
    ) -> Result<Self> {
        Self::check_presence(test.is_some(), tests.is_some())?;
        match (test, tests) {
            (Some(test), None) => Ok(Self::Single(test)),
            (None, Some(tests)) => Ok(Self::Many(tests)),
            _ => Err(Error::config("must specify either test or tests")),
        }
    }

    /// The `from_parts` shape check, for callers that have not generated their tests yet.
    pub fn check_presence(test: bool, tests: bool) -> Result<()> {
        if test == tests {
            return Err(Error::config("must specify either test or tests"));
        }
        Ok(())
    }
}

/// One (node, test) pairing and the key its output is stored under.
#[derive(Debug, Clone, Copy)]
pub struct PlannedRun<'a> {
    pub label: &'a str,
    pub node: &'a Node,
    pub test: &'a LoadTest,
}

/// The full set of runs implied by a node selection and a test selection.
///
/// Keys follow the shape of the inputs:
/// - single node, single test: the node's name
/// - many nodes, single test: each node key
/// - single node, many tests: each test key
/// - many nodes, many tests: `{node}__{test}`, nodes outermost
#[derive(Debug, Clone)]
pub struct RunMatrix {
    nodes: NodeSelection,
    tests: TestSelection,
    labels: Vec<String>,
}

impl RunMatrix {
    pub fn new(nodes: NodeSelection, tests: TestSelection) -> Result<Self> {
        if matches!(&nodes, NodeSelection::Many(m) if m.is_empty()) {
            return Err(Error::config("`nodes` must not be empty"));
        }
        if matches!(&tests, TestSelection::Many(m) if m.is_empty()) {
            return Err(Error::config("`tests` must not be empty"));
        }

        let labels = match (&nodes, &tests) {
            (NodeSelection::Single(node), TestSelection::Single(_)) => vec![node.name.clone()],
            (NodeSelection::Many(nodes), TestSelection::Single(_)) => nodes.keys().cloned().collect(),
            (NodeSelection::Single(_), TestSelection::Many(tests)) => tests.keys().cloned().collect(),
            (NodeSelection::Many(nodes), TestSelection::Many(tests)) => nodes
                .keys()
                .flat_map(|n| {
                    tests
                        .keys()
                        .map(move |t| format!("{n}{RUN_KEY_SEPARATOR}{t}"))
                })
                .collect(),
        };

        let mut seen = HashSet::with_capacity(labels.len());
        if let Some(dup) = labels.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(Error::config(format!("duplicate run key `{dup}`")));
        }

        Ok(Self {
            nodes,
            tests,
            labels,
        })
    }

    /// Validate the mutually exclusive pairs, then build the matrix.
    pub fn from_parts(
        node: Option<Node>,
        nodes: Option<IndexMap<String, Node>>,
        test: Option<LoadTest>,
        tests: Option<IndexMap<String, LoadTest>>,
    ) -> Result<Self> {
        let nodes = NodeSelection::from_parts(node, nodes)?;
        let tests = TestSelection::from_parts(test, tests)?;
        Self::new(nodes, tests)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Runs in execution order.
    pub fn runs(&self) -> Vec<PlannedRun<'_>> {
        let pairs: Vec<(&Node, &LoadTest)> = match (&self.nodes, &self.tests) {
            (NodeSelection::Single(node), TestSelection::Single(test)) => vec![(node, test)],
            (NodeSelection::Many(nodes), TestSelection::Single(test)) => {
                nodes.values().map(|n| (n, test)).collect()
            }
            (NodeSelection::Single(node), TestSelection::Many(tests)) => {
                tests.values().map(|t| (node, t)).collect()
            }
            (NodeSelection::Many(nodes), TestSelection::Many(tests)) => nodes
                .values()
                .flat_map(|n| tests.values().map(move |t| (n, t)))
                .collect(),
        };

        self.labels
            .iter()
            .zip(pairs)
            .map(|(label, (node, test))| PlannedRun {
                label: label.as_str(),
                node,
                test,
            })
            .collect()
    }

    /// Sum of attack durations across every run, in seconds.
    pub fn total_duration(&self) -> u64 {
        self.runs()
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.test.total_duration()))
    }
}

impl<E: AttackExecutor, R: RemoteExecutor> Runner<E, R> {
    /// Run every pairing of the matrix, one after another.
    ///
    /// The first failing run aborts the rest; nothing collected so far is returned.
    pub async fn run_load_tests(&self, matrix: &RunMatrix) -> Result<ResultMapping> {
        let runs = matrix.runs();
        let total = runs.len();
        let mut results = ResultMapping::with_capacity(total);

        tracing::info!(runs = total, "starting load tests");

        for (idx, run) in runs.into_iter().enumerate() {
            let started = Instant::now();
            let output = self.run_labeled(run.label, run.node, run.test).await?;
            let elapsed = started.elapsed();

            tracing::info!(
                run = run.label,
                elapsed_ms = elapsed.as_millis() as u64,
                "load test finished"
            );
            self.emit(ProgressUpdate::RunFinished {
                run: run.label.to_string(),
                index: idx + 1,
                runs: total,
                elapsed,
            });
            results.insert(run.label.to_string(), output);
        }

        Ok(results)
    }
}
