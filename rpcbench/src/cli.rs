use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress bars and a per-run table.
    HumanReadable,
    /// Emit JSON progress lines (NDJSON) and a final summary line to stdout.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExecutorKind {
    /// Built-in HTTP load generator.
    Native,
    /// External `vegeta` binary.
    Vegeta,
}

#[derive(Debug, Parser)]
#[command(
    name = "rpcbench",
    author,
    version,
    about = "Rate-controlled load testing for JSON-RPC nodes",
    long_about = "rpcbench fires JSON-RPC calls at one or more nodes at fixed request rates and collects latency, throughput and success metrics per rate.\n\nA plan file (YAML) names the nodes and the load tests to run. Every load test is a sequence of attacks, one per rate, run back to back; runs never overlap.",
    after_help = "Examples:\n  rpcbench init\n  rpcbench run rpcbench.yaml\n  rpcbench run rpcbench.yaml --output json --out results.json\n  rpcbench run rpcbench.yaml --executor vegeta --only by_number"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every load test of a plan against its nodes
    #[command(
        long_about = "Run a plan file.\n\nWith several nodes and several tests, every test runs against every node (nodes outermost) and results are keyed `node__test`."
    )]
    Run(RunArgs),

    /// Write a sample plan file
    Init(InitArgs),
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Target directory (created if missing)
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,

    /// Plan filename to create in the target directory
    #[arg(long, default_value = "rpcbench.yaml")]
    pub plan: String,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the plan (.yaml)
    pub plan: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Load generator used for local nodes
    #[arg(long, value_enum, default_value_t = ExecutorKind::Native)]
    pub executor: ExecutorKind,

    /// Path to the vegeta binary (with --executor vegeta)
    #[arg(
        long,
        value_name = "PATH",
        env = "RPCBENCH_VEGETA_BIN",
        default_value = "vegeta"
    )]
    pub vegeta_bin: PathBuf,

    /// Seed for call generation; the same seed and plan produce the same calls
    #[arg(long)]
    pub seed: Option<u64>,

    /// Only run the named tests from the plan's `tests` (repeatable)
    #[arg(long = "only", value_name = "TEST")]
    pub only: Vec<String>,

    /// Also write the full results (JSON) to this file
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_with_flags() {
        let parsed = Cli::try_parse_from([
            "rpcbench",
            "run",
            "plan.yaml",
            "--output",
            "json",
            "--executor",
            "vegeta",
            "--vegeta-bin",
            "/opt/vegeta",
            "--seed",
            "42",
            "--only",
            "light",
            "--only",
            "heavy",
            "--out",
            "results.json",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.plan, PathBuf::from("plan.yaml"));
                assert_eq!(args.output, OutputFormat::Json);
                assert_eq!(args.executor, ExecutorKind::Vegeta);
                assert_eq!(args.vegeta_bin, PathBuf::from("/opt/vegeta"));
                assert_eq!(args.seed, Some(42));
                assert_eq!(args.only, vec!["light".to_string(), "heavy".to_string()]);
                assert_eq!(args.out, Some(PathBuf::from("results.json")));
            }
            Command::Init(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_run_defaults() {
        let cli = match Cli::try_parse_from(["rpcbench", "run", "plan.yaml"]) {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.output, OutputFormat::HumanReadable);
                assert_eq!(args.executor, ExecutorKind::Native);
                assert_eq!(args.seed, None);
                assert!(args.only.is_empty());
                assert!(args.out.is_none());
            }
            Command::Init(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_parses_init_defaults() {
        let cli = match Cli::try_parse_from(["rpcbench", "init"]) {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        match cli.command {
            Command::Init(args) => {
                assert_eq!(args.dir, PathBuf::from("."));
                assert!(!args.force);
                assert_eq!(args.plan, "rpcbench.yaml");
            }
            Command::Run(_) => panic!("expected init command"),
        }
    }

    #[test]
    fn cli_rejects_unknown_executor() {
        assert!(Cli::try_parse_from(["rpcbench", "run", "p.yaml", "--executor", "wrk"]).is_err());
    }
}
