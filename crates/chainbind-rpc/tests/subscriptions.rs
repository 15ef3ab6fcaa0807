//! Historical log chunking and live filter subscriptions against a scripted node.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use chainbind_rpc::testing::MockTransport;
use chainbind_rpc::{
    BlockId, Invoker, InvokerConfig, JsonRpcError, LogFilter, LogSubscription, OverflowPolicy,
    RetryConfig, SubscriptionError,
};
use futures::StreamExt;
use serde_json::{json, Value};

const TOKEN: Address = Address::new([0x70; 20]);

fn config(capacity: usize, overflow_policy: OverflowPolicy) -> InvokerConfig {
    InvokerConfig {
        retry: RetryConfig {
            max_retries: 1,
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
            multiplier: 1.0,
            jitter_fraction: 0.0,
        },
        poll_interval_ms: 5,
        log_chunk_size: 2_000,
        subscription_capacity: capacity,
        overflow_policy,
        chain_id: Some(1),
        ..InvokerConfig::default()
    }
}

fn setup(capacity: usize, policy: OverflowPolicy) -> (Arc<MockTransport>, Invoker<Arc<MockTransport>>) {
    let mock = Arc::new(MockTransport::new());
    let invoker = Invoker::new(Arc::clone(&mock), config(capacity, policy));
    mock.set_result("eth_getFilterChanges", json!([]));
    mock.set_result("eth_uninstallFilter", json!(true));
    (mock, invoker)
}

fn log_json(block: u64) -> Value {
    json!({
        "address": TOKEN,
        "topics": [],
        "data": "0x",
        "blockNumber": format!("0x{block:x}"),
        "blockHash": null,
        "transactionHash": null,
        "transactionIndex": "0x0",
        "logIndex": "0x0",
        "removed": false
    })
}

fn logs_json(blocks: &[u64]) -> Value {
    Value::Array(blocks.iter().map(|b| log_json(*b)).collect())
}

async fn next_block(sub: &mut LogSubscription) -> u64 {
    let item = tokio::time::timeout(Duration::from_secs(2), sub.next())
        .await
        .expect("subscription stalled")
        .expect("subscription ended")
        .expect("subscription failed");
    item.block_number.unwrap()
}

#[tokio::test]
async fn historical_logs_are_chunked() {
    let (mock, invoker) = setup(16, OverflowPolicy::DropOldest);
    mock.push_result("eth_getLogs", logs_json(&[5]));
    mock.push_result("eth_getLogs", logs_json(&[]));
    mock.push_result("eth_getLogs", logs_json(&[4500, 4600]));

    let filter = LogFilter::new().address(TOKEN).from_block(0u64).to_block(4_999u64);
    let logs = invoker.logs(&filter).await.unwrap();
    let blocks: Vec<_> = logs.iter().filter_map(|l| l.block_number).collect();
    assert_eq!(blocks, vec![5, 4500, 4600]);

    let ranges: Vec<(Value, Value)> = mock
        .calls("eth_getLogs")
        .iter()
        .map(|p| (p[0]["fromBlock"].clone(), p[0]["toBlock"].clone()))
        .collect();
    assert_eq!(
        ranges,
        vec![
            (json!("0x0"), json!("0x7cf")),
            (json!("0x7d0"), json!("0xf9f")),
            (json!("0xfa0"), json!("0x1387")),
        ]
    );
}

#[tokio::test]
async fn latest_bound_is_resolved_once() {
    let (mock, invoker) = setup(16, OverflowPolicy::DropOldest);
    mock.push_result("eth_blockNumber", json!("0x12c"));
    mock.push_result("eth_getLogs", logs_json(&[250]));

    let filter = LogFilter::new().from_block(100u64).to_block(BlockId::Latest);
    let logs = invoker.logs(&filter).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(mock.count("eth_blockNumber"), 1);
    assert_eq!(mock.calls("eth_getLogs")[0][0]["toBlock"], json!("0x12c"));
}

#[tokio::test]
async fn historical_stream_ends_after_error() {
    let (mock, invoker) = setup(16, OverflowPolicy::DropOldest);
    mock.push_result("eth_getLogs", logs_json(&[1, 2]));
    mock.push_error("eth_getLogs", JsonRpcError::new(-32005, "query returned more than 10000 results"));
    mock.push_result("eth_getLogs", logs_json(&[4000]));

    let filter = LogFilter::new().from_block(0u64).to_block(5_000u64);
    let items: Vec<_> = invoker.historical_stream(filter).collect().await;
    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok() && items[1].is_ok());
    assert!(items[2].is_err());
    assert_eq!(mock.count("eth_getLogs"), 2);
}

#[tokio::test]
async fn live_subscription_delivers_and_uninstalls_on_cancel() {
    let (mock, invoker) = setup(16, OverflowPolicy::DropOldest);
    mock.push_result("eth_newFilter", json!("0x1"));
    mock.push_result("eth_getFilterChanges", logs_json(&[7, 8]));

    let mut sub = invoker.subscribe(LogFilter::new().address(TOKEN)).await.unwrap();
    assert_eq!(next_block(&mut sub).await, 7);
    assert_eq!(next_block(&mut sub).await, 8);

    sub.cancel().await;
    assert_eq!(mock.calls("eth_uninstallFilter"), vec![vec![json!("0x1")]]);
    assert_eq!(mock.calls("eth_newFilter")[0][0]["address"], json!(TOKEN));
}

#[tokio::test]
async fn dropping_subscription_uninstalls_filter() {
    let (mock, invoker) = setup(16, OverflowPolicy::DropOldest);
    mock.push_result("eth_newFilter", json!("0xabc"));

    let sub = invoker.subscribe(LogFilter::new()).await.unwrap();
    drop(sub);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mock.calls("eth_uninstallFilter"), vec![vec![json!("0xabc")]]);
}

#[tokio::test]
async fn drop_oldest_counts_dropped_logs() {
    let (mock, invoker) = setup(2, OverflowPolicy::DropOldest);
    mock.push_result("eth_newFilter", json!("0x1"));
    mock.push_result("eth_getFilterChanges", logs_json(&[1, 2, 3, 4, 5]));

    let mut sub = invoker.subscribe(LogFilter::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(sub.dropped(), 3);
    assert_eq!(sub.buffered(), 2);
    assert_eq!(next_block(&mut sub).await, 4);
    assert_eq!(next_block(&mut sub).await, 5);
    sub.cancel().await;
}

#[tokio::test]
async fn fail_policy_terminates_subscription() {
    let (mock, invoker) = setup(1, OverflowPolicy::Fail);
    mock.push_result("eth_newFilter", json!("0x1"));
    mock.push_result("eth_getFilterChanges", logs_json(&[1, 2]));

    let sub = invoker.subscribe(LogFilter::new()).await.unwrap();
    let items: Vec<_> = tokio::time::timeout(Duration::from_secs(2), sub.into_stream().collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().block_number, Some(1));
    assert!(matches!(
        items[1],
        Err(SubscriptionError::Overflow { capacity: 1 })
    ));
    assert_eq!(mock.count("eth_uninstallFilter"), 1);
}

#[tokio::test]
async fn forgotten_filter_is_reinstalled_without_gaps() {
    let (mock, invoker) = setup(16, OverflowPolicy::DropOldest);
    mock.push_result("eth_newFilter", json!("0x1"));
    mock.push_result("eth_newFilter", json!("0x2"));
    mock.push_result("eth_getFilterChanges", logs_json(&[10]));
    mock.push_error("eth_getFilterChanges", JsonRpcError::new(-32000, "filter not found"));
    mock.push_result("eth_getFilterChanges", logs_json(&[12, 13]));
    mock.push_result("eth_blockNumber", json!("0xc"));
    mock.push_result("eth_getLogs", logs_json(&[11, 12]));

    let mut sub = invoker.subscribe(LogFilter::new().address(TOKEN)).await.unwrap();
    let mut blocks = Vec::new();
    for _ in 0..4 {
        blocks.push(next_block(&mut sub).await);
    }
    assert_eq!(blocks, vec![10, 11, 12, 13]);

    let reinstall = &mock.calls("eth_newFilter")[1][0];
    assert_eq!(reinstall["fromBlock"], json!("0xb"));
    let backfill = &mock.calls("eth_getLogs")[0][0];
    assert_eq!(backfill["fromBlock"], json!("0xb"));
    assert_eq!(backfill["toBlock"], json!("0xc"));

    sub.cancel().await;
    assert_eq!(mock.calls("eth_uninstallFilter"), vec![vec![json!("0x2")]]);
}
