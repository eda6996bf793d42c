use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use indexmap::IndexMap;
use serde::Deserialize;

use rpcbench_core::{
    AttackOptions, BlockByHashGenerator, BlockByNumberGenerator, LoadTest, Node, NodeSelection,
    Remote, RunMatrix, TestSelection, generate_load_test,
};

/// A plan file: which nodes to hit and which load tests to run against them.
///
/// Exactly one of `node`/`nodes` and one of `test`/`tests` must be present. The check runs before
/// any call is generated and reads the same as [`RunMatrix::from_parts`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct PlanYaml {
    #[serde(default)]
    pub node: Option<NodeYaml>,
    #[serde(default)]
    pub nodes: Option<IndexMap<String, NodeYaml>>,
    #[serde(default)]
    pub test: Option<TestYaml>,
    #[serde(default)]
    pub tests: Option<IndexMap<String, TestYaml>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct NodeYaml {
    /// Defaults to the map key, or the URL host for a single `node`.
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    /// Opaque remote execution descriptor.
    #[serde(default)]
    pub remote: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub(crate) enum MethodYaml {
    #[serde(rename = "eth_getBlockByNumber")]
    GetBlockByNumber,
    #[serde(rename = "eth_getBlockByHash")]
    GetBlockByHash,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct BlockRangeYaml {
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct TestYaml {
    pub method: MethodYaml,
    pub rates: Vec<u64>,

    #[serde(default)]
    pub duration: Option<YamlDuration>,
    #[serde(default)]
    pub durations: Option<Vec<YamlDuration>>,

    // eth_getBlockByNumber
    #[serde(default)]
    pub blocks: Option<BlockRangeYaml>,

    // eth_getBlockByHash
    #[serde(default)]
    pub hashes: Option<Vec<String>>,

    #[serde(default)]
    pub full_transactions: bool,

    /// Executor options; a key with no value becomes a bare flag.
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: AttackOptions,
}

/// Whole seconds, written as an integer or a humantime string (`30s`, `2m`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct YamlDuration(u64);

impl YamlDuration {
    pub(crate) fn secs(self) -> u64 {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as integer seconds or a string of whole seconds (e.g. 30s, 2m)")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(YamlDuration)
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 || v.fract() != 0.0 {
                    return Err(E::custom("duration must be a whole number of seconds"));
                }
                Ok(YamlDuration(v as u64))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v).map_err(E::custom)?;
                if d.subsec_nanos() != 0 {
                    return Err(E::custom(format!(
                        "duration `{v}` is not a whole number of seconds"
                    )));
                }
                Ok(YamlDuration(d.as_secs()))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&v)
            }
        }

        deserializer.deserialize_any(V)
    }
}

fn deserialize_options<'de, D>(deserializer: D) -> Result<AttackOptions, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;
    let mut out = AttackOptions::new();

    for (k, v) in raw {
        let value = match v {
            serde_yaml::Value::Null => None,
            serde_yaml::Value::Bool(b) => Some(b.to_string()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            serde_yaml::Value::String(s) => Some(s),
            _ => {
                return Err(serde::de::Error::custom(format!(
                    "option `{k}` must be a scalar or empty"
                )));
            }
        };
        out.insert(k, value);
    }

    Ok(out)
}

impl NodeYaml {
    fn build(self, key: Option<&str>) -> anyhow::Result<Node> {
        let name = self
            .name
            .clone()
            .or_else(|| key.map(str::to_string))
            .unwrap_or_else(|| "node".to_string());
        let mut node = Node::new(name, &self.url)?;

        if self.name.is_none()
            && key.is_none()
            && let Some(host) = node.url.host_str()
        {
            node.name = host.to_string();
        }
        if let Some(remote) = self.remote {
            node = node.with_remote(Remote::new(remote));
        }
        Ok(node)
    }
}

impl TestYaml {
    fn build(self, seed: Option<u64>) -> anyhow::Result<LoadTest> {
        let duration = self.duration.map(YamlDuration::secs);
        let durations: Option<Vec<u64>> = self
            .durations
            .map(|ds| ds.into_iter().map(YamlDuration::secs).collect());
        let options = Some(self.options);

        let test = match (self.method, self.blocks, self.hashes) {
            (MethodYaml::GetBlockByNumber, Some(blocks), None) => {
                let mut generator = BlockByNumberGenerator::new(blocks.start..=blocks.end, seed)?
                    .with_full_transactions(self.full_transactions);
                generate_load_test(
                    &mut generator,
                    &self.rates,
                    duration,
                    durations.as_deref(),
                    options,
                )?
            }
            (MethodYaml::GetBlockByHash, None, Some(hashes)) => {
                let mut generator = BlockByHashGenerator::new(hashes, seed)?
                    .with_full_transactions(self.full_transactions);
                generate_load_test(
                    &mut generator,
                    &self.rates,
                    duration,
                    durations.as_deref(),
                    options,
                )?
            }
            (MethodYaml::GetBlockByNumber, _, Some(_)) => {
                anyhow::bail!("`hashes` is only valid with eth_getBlockByHash")
            }
            (MethodYaml::GetBlockByNumber, None, None) => {
                anyhow::bail!("eth_getBlockByNumber needs `blocks: {{start, end}}`")
            }
            (MethodYaml::GetBlockByHash, Some(_), _) => {
                anyhow::bail!("`blocks` is only valid with eth_getBlockByNumber")
            }
            (MethodYaml::GetBlockByHash, None, None) => {
                anyhow::bail!("eth_getBlockByHash needs `hashes`")
            }
        };

        Ok(test)
    }
}

impl PlanYaml {
    /// Generate every load test and pair them with the nodes.
    ///
    /// `only` keeps the named entries of `tests`; each test draws its calls from `seed + index`.
    pub(crate) fn into_matrix(self, seed: Option<u64>, only: &[String]) -> anyhow::Result<RunMatrix> {
        NodeSelection::check_presence(self.node.is_some(), self.nodes.is_some())?;
        TestSelection::check_presence(self.test.is_some(), self.tests.is_some())?;

        let node = self.node.map(|n| n.build(None)).transpose()?;
        let nodes = self
            .nodes
            .map(|nodes| {
                nodes
                    .into_iter()
                    .map(|(key, n)| {
                        let node = n
                            .build(Some(&key))
                            .with_context(|| format!("invalid node `{key}`"))?;
                        Ok((key, node))
                    })
                    .collect::<anyhow::Result<IndexMap<_, _>>>()
            })
            .transpose()?;

        if !only.is_empty() && self.tests.is_none() {
            anyhow::bail!("--only needs a plan with named `tests`");
        }

        let test = self.test.map(|t| t.build(seed)).transpose()?;
        let tests = self
            .tests
            .map(|tests| select_tests(tests, only))
            .transpose()?
            .map(|tests| {
                tests
                    .into_iter()
                    .enumerate()
                    .map(|(idx, (key, t))| {
                        let seed = seed.map(|s| s.wrapping_add(idx as u64));
                        let test = t
                            .build(seed)
                            .with_context(|| format!("invalid test `{key}`"))?;
                        Ok((key, test))
                    })
                    .collect::<anyhow::Result<IndexMap<_, _>>>()
            })
            .transpose()?;

        Ok(RunMatrix::from_parts(node, nodes, test, tests)?)
    }
}

fn select_tests(
    tests: IndexMap<String, TestYaml>,
    only: &[String],
) -> anyhow::Result<IndexMap<String, TestYaml>> {
    if only.is_empty() {
        return Ok(tests);
    }

    if let Some(unknown) = only.iter().find(|name| !tests.contains_key(name.as_str())) {
        anyhow::bail!(
            "--only `{unknown}` does not name a test in the plan (available: {})",
            tests.keys().cloned().collect::<Vec<_>>().join(", ")
        );
    }

    Ok(tests
        .into_iter()
        .filter(|(key, _)| only.contains(key))
        .collect())
}

pub(crate) fn parse_plan(raw: &str) -> anyhow::Result<PlanYaml> {
    Ok(serde_yaml::from_str(raw)?)
}

pub(crate) async fn load_plan(path: &Path) -> anyhow::Result<PlanYaml> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read plan: {}", path.display()))?;

    parse_plan(&raw).with_context(|| format!("failed to parse plan YAML: {}", path.display()))
}
