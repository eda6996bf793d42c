use anyhow::Result;
use indexmap::IndexMap;
use rpcbench_core::{
    BlockByHashGenerator, BlockByNumberGenerator, ErrorKind, NativeExecutor, Node, Remote,
    RunMatrix, Runner, generate_load_test,
};
use rpcbench_testserver::{HEAD_BLOCK, TestServer, block_hash};

#[tokio::test]
async fn native_runner_covers_every_node_and_test() -> Result<()> {
    let primary = TestServer::start().await?;
    let replica = TestServer::start().await?;

    let mut by_number = BlockByNumberGenerator::new(1..=HEAD_BLOCK, Some(11))?;
    let mut by_hash = BlockByHashGenerator::new(
        (1..=16).map(block_hash).collect(),
        Some(11),
    )?;

    let nodes = IndexMap::from([
        ("primary".to_string(), Node::new("primary", primary.rpc_url())?),
        ("replica".to_string(), Node::new("replica", replica.rpc_url())?),
    ]);
    let tests = IndexMap::from([
        (
            "by_number".to_string(),
            generate_load_test(&mut by_number, &[5, 10], Some(1), None, None)?,
        ),
        (
            "by_hash".to_string(),
            generate_load_test(&mut by_hash, &[4], Some(1), None, None)?,
        ),
    ]);

    let matrix = RunMatrix::from_parts(None, Some(nodes), None, Some(tests))?;
    let results = Runner::new(NativeExecutor::new())
        .run_load_tests(&matrix)
        .await?;

    assert_eq!(
        results.keys().map(String::as_str).collect::<Vec<_>>(),
        ["primary__by_number", "primary__by_hash", "replica__by_number", "replica__by_hash"]
    );

    let by_number = &results["primary__by_number"];
    assert_eq!(by_number["target_rate"], vec![5, 10]);
    assert_eq!(by_number["requests"], vec![5, 10]);
    assert_eq!(by_number["success"], vec![1.0, 1.0]);
    assert_eq!(results["replica__by_hash"]["requests"], vec![4]);

    for server in [&primary, &replica] {
        assert_eq!(server.stats().get_block_by_number(), 15);
        assert_eq!(server.stats().get_block_by_hash(), 4);
    }

    primary.shutdown().await;
    replica.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn remote_node_is_unsupported_without_touching_the_network() -> Result<()> {
    let server = TestServer::start().await?;
    let node = Node::new("remote", server.rpc_url())?.with_remote(Remote::new("eu-west"));
    let mut generator = BlockByNumberGenerator::new(1..=10, Some(1))?;
    let test = generate_load_test(&mut generator, &[1], Some(1), None, None)?;

    let matrix = RunMatrix::from_parts(Some(node), None, Some(test), None)?;
    let err = match Runner::new(NativeExecutor::new())
        .run_load_tests(&matrix)
        .await
    {
        Ok(results) => anyhow::bail!("expected unsupported, got {results:?}"),
        Err(err) => err,
    };

    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert_eq!(server.stats().requests_total(), 0);

    server.shutdown().await;
    Ok(())
}
