use anyhow::Context as _;

use crate::cli::InitArgs;
use crate::fs::write_file;

pub async fn init(args: InitArgs) -> anyhow::Result<()> {
    let root = &args.dir;
    tokio::fs::create_dir_all(root)
        .await
        .with_context(|| format!("failed to create dir: {}", root.display()))?;

    let path = root.join(&args.plan);
    write_file(&path, SAMPLE_PLAN, args.force).await?;
    eprintln!("wrote {}", path.display());

    Ok(())
}

pub(crate) const SAMPLE_PLAN: &str = r#"# rpcbench plan
#
# Give exactly one of `node` / `nodes` and one of `test` / `tests`.
# With several nodes and several tests every test runs against every node and
# results are keyed `node__test`.

nodes:
  local:
    url: http://127.0.0.1:8545
  # archive:
  #   url: https://archive.example.org
  #   remote: runner-eu-1   # remote execution descriptor (not implemented yet)

tests:
  by_number:
    method: eth_getBlockByNumber
    # One attack per rate (requests/second), run back to back.
    rates: [10, 50, 100]
    # Either one `duration` for every rate or one entry per rate in `durations`.
    # Integer seconds or whole-second strings such as 30s or 1m.
    duration: 10s
    blocks:
      start: 1
      end: 1000000
    fullTransactions: false
    # Executor options. native: timeout, max_in_flight. vegeta: any `vegeta attack` flag.
    options:
      timeout: 5s

  by_hash:
    method: eth_getBlockByHash
    rates: [10, 50]
    durations: [10, 20]
    hashes:
      - "0xd4e56740f876aef8c010b86a40d5f56745a118d0906a34e69aec8c0db1cb8fa3"
"#;
