//! Historical log queries and live log subscriptions.
//!
//! Historical queries split the block range into fixed-size chunks so no
//! single `eth_getLogs` exceeds provider limits. Live subscriptions poll an
//! installed filter from a background task into a bounded buffer.

use chainbind_abi::Log;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::error::{SubscriptionError, TransportError};
use crate::eth::{BlockId, EthRpc, LogFilter};
use crate::transport::RpcTransport;

// ─── Historical ───────────────────────────────────────────────────────────────

enum Cursor {
    Start,
    Range { next: u64, to: u64 },
    Done,
}

/// Numeric `[from, to]` of `filter`, resolving `latest` with one
/// `eth_blockNumber`. `None` when a bound cannot be pinned to a number
/// (`pending`, `safe`, `finalized`); such filters are sent unchunked.
async fn resolve_range<T: RpcTransport>(
    rpc: &EthRpc<T>,
    filter: &LogFilter,
) -> Result<Option<(u64, u64)>, TransportError> {
    let from = filter.from_block.unwrap_or(BlockId::Latest);
    let to = filter.to_block.unwrap_or(BlockId::Latest);
    let head = if from == BlockId::Latest || to == BlockId::Latest {
        Some(rpc.block_number().await?)
    } else {
        None
    };
    let pin = |b: BlockId| match b {
        BlockId::Number(n) => Some(n),
        BlockId::Earliest => Some(0),
        BlockId::Latest => head,
        BlockId::Pending | BlockId::Safe | BlockId::Finalized => None,
    };
    Ok(pin(from).zip(pin(to)))
}

async fn fetch_chunk<T: RpcTransport>(
    rpc: &EthRpc<T>,
    filter: &LogFilter,
    next: u64,
    to: u64,
    chunk_size: u64,
) -> (Result<Vec<Log>, TransportError>, Cursor) {
    let end = next.saturating_add(chunk_size - 1).min(to);
    tracing::debug!(from = next, to = end, "eth_getLogs chunk");
    let res = rpc.logs(&filter.with_range(next, end)).await;
    let cursor = if res.is_err() || end >= to {
        Cursor::Done
    } else {
        Cursor::Range { next: end + 1, to }
    };
    (res, cursor)
}

/// Logs matching `filter` as a finite stream, one chunk request at a time.
/// The stream ends after the first error.
pub fn historical_stream<T: RpcTransport>(
    rpc: &EthRpc<T>,
    filter: LogFilter,
    chunk_size: u64,
) -> impl Stream<Item = Result<Log, TransportError>> + '_ {
    let chunk_size = chunk_size.max(1);
    stream::unfold(Cursor::Start, move |cursor| {
        let filter = filter.clone();
        async move {
            match cursor {
                Cursor::Done => None,
                Cursor::Start => match resolve_range(rpc, &filter).await {
                    Err(e) => Some((Err(e), Cursor::Done)),
                    Ok(None) => Some((rpc.logs(&filter).await, Cursor::Done)),
                    Ok(Some((from, to))) if from > to => None,
                    Ok(Some((from, to))) => {
                        Some(fetch_chunk(rpc, &filter, from, to, chunk_size).await)
                    }
                },
                Cursor::Range { next, to } => {
                    Some(fetch_chunk(rpc, &filter, next, to, chunk_size).await)
                }
            }
        }
    })
    .flat_map(|chunk| match chunk {
        Ok(logs) => stream::iter(logs.into_iter().map(Ok)).left_stream(),
        Err(e) => stream::iter(vec![Err(e)]).right_stream(),
    })
}

/// Collect [`historical_stream`].
pub async fn fetch_logs<T: RpcTransport>(
    rpc: &EthRpc<T>,
    filter: &LogFilter,
    chunk_size: u64,
) -> Result<Vec<Log>, TransportError> {
    historical_stream(rpc, filter.clone(), chunk_size)
        .try_collect()
        .await
}

// ─── Live ─────────────────────────────────────────────────────────────────────

/// What to do when the consumer falls behind a full buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest buffered log and count it in
    /// [`LogSubscription::dropped`].
    #[default]
    DropOldest,
    /// End the subscription with [`SubscriptionError::Overflow`].
    Fail,
}

#[derive(Debug, Clone)]
pub struct SubscriptionOptions {
    pub capacity: usize,
    pub overflow: OverflowPolicy,
    pub poll_interval: Duration,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            capacity: 1_024,
            overflow: OverflowPolicy::DropOldest,
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Default)]
struct Buffer {
    logs: VecDeque<Log>,
    dropped: u64,
    error: Option<SubscriptionError>,
    closed: bool,
}

struct Shared {
    buffer: Mutex<Buffer>,
    notify: Notify,
    capacity: usize,
    overflow: OverflowPolicy,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, log: Log) -> Result<(), SubscriptionError> {
        {
            let mut buf = self.lock();
            if buf.logs.len() >= self.capacity {
                match self.overflow {
                    OverflowPolicy::DropOldest => {
                        buf.logs.pop_front();
                        buf.dropped += 1;
                    }
                    OverflowPolicy::Fail => {
                        return Err(SubscriptionError::Overflow {
                            capacity: self.capacity,
                        })
                    }
                }
            }
            buf.logs.push_back(log);
        }
        self.notify.notify_one();
        Ok(())
    }

    fn close(&self, error: Option<SubscriptionError>) {
        {
            let mut buf = self.lock();
            if buf.error.is_none() {
                buf.error = error;
            }
            buf.closed = true;
        }
        self.notify.notify_one();
    }
}

/// A live feed of logs matching a filter.
///
/// Cancelling (or dropping) the subscription stops the polling task, which
/// then uninstalls the node-side filter. Logs already buffered are still
/// returned by [`next`](Self::next) after the feed ends.
pub struct LogSubscription {
    shared: Arc<Shared>,
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl LogSubscription {
    /// Next log; `None` once the subscription ended cleanly.
    pub async fn next(&mut self) -> Option<Result<Log, SubscriptionError>> {
        loop {
            {
                let mut buf = self.shared.lock();
                if let Some(log) = buf.logs.pop_front() {
                    return Some(Ok(log));
                }
                if let Some(err) = buf.error.take() {
                    return Some(Err(err));
                }
                if buf.closed {
                    return None;
                }
            }
            self.shared.notify.notified().await;
        }
    }

    /// Logs evicted under [`OverflowPolicy::DropOldest`].
    pub fn dropped(&self) -> u64 {
        self.shared.lock().dropped
    }

    /// Logs waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.shared.lock().logs.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Stop polling and wait until the filter is uninstalled.
    pub async fn cancel(mut self) {
        let _ = self.cancel.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Log, SubscriptionError>> {
        stream::unfold(self, |mut sub| async move {
            let item = sub.next().await?;
            Some((item, sub))
        })
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

/// Install `filter` and start polling it.
pub async fn subscribe<T: RpcTransport>(
    rpc: Arc<EthRpc<T>>,
    filter: LogFilter,
    opts: SubscriptionOptions,
) -> Result<LogSubscription, TransportError> {
    let id = rpc.new_filter(&filter).await?;
    tracing::info!(filter_id = %id, "log subscription started");

    let shared = Arc::new(Shared {
        buffer: Mutex::new(Buffer::default()),
        notify: Notify::new(),
        capacity: opts.capacity.max(1),
        overflow: opts.overflow,
    });
    let (cancel, cancelled) = watch::channel(false);
    let task = tokio::spawn(poll_filter(
        rpc,
        filter,
        id,
        opts.poll_interval,
        Arc::clone(&shared),
        cancelled,
    ));
    Ok(LogSubscription {
        shared,
        cancel,
        task: Some(task),
    })
}

async fn poll_filter<T: RpcTransport>(
    rpc: Arc<EthRpc<T>>,
    filter: LogFilter,
    mut filter_id: String,
    interval: Duration,
    shared: Arc<Shared>,
    mut cancelled: watch::Receiver<bool>,
) {
    // Highest block delivered so far, and the block up to which a backfill
    // after reinstalling already delivered logs.
    let mut last_block: Option<u64> = None;
    let mut backfilled_to: Option<u64> = None;

    let error = loop {
        tokio::select! {
            _ = cancelled.changed() => break None,
            _ = tokio::time::sleep(interval) => {}
        }
        if *cancelled.borrow() {
            break None;
        }

        // Backfilled logs are delivered as-is; only later filter changes
        // can repeat them.
        let (logs, backfill) = match rpc.filter_changes(&filter_id).await {
            Ok(logs) => (logs, false),
            Err(TransportError::Rpc(e)) if e.is_filter_not_found() => {
                match reinstall(&rpc, &filter, last_block).await {
                    Ok((id, logs, head)) => {
                        tracing::warn!(
                            old = %filter_id,
                            new = %id,
                            backfilled = logs.len(),
                            "log filter reinstalled"
                        );
                        filter_id = id;
                        backfilled_to = head;
                        (logs, true)
                    }
                    Err(e) => break Some(SubscriptionError::Transport(e)),
                }
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(filter_id = %filter_id, error = %e, "filter poll failed, will retry");
                continue;
            }
            Err(e) => break Some(SubscriptionError::Transport(e)),
        };

        let mut overflow = None;
        for log in logs {
            if !backfill && is_backfilled(&log, backfilled_to) {
                continue;
            }
            if let Some(n) = log.block_number {
                last_block = Some(last_block.map_or(n, |b| b.max(n)));
            }
            if let Err(e) = shared.push(log) {
                overflow = Some(e);
                break;
            }
        }
        if let Some(e) = overflow {
            tracing::error!(filter_id = %filter_id, capacity = shared.capacity, "subscription buffer overflow");
            break Some(e);
        }
    };

    if let Err(e) = rpc.uninstall_filter(&filter_id).await {
        tracing::debug!(filter_id = %filter_id, error = %e, "failed to uninstall filter");
    }
    tracing::info!(filter_id = %filter_id, "log subscription stopped");
    shared.close(error);
}

/// Whether `log` was already delivered by a backfill reaching `limit`.
fn is_backfilled(log: &Log, limit: Option<u64>) -> bool {
    match (log.block_number, limit) {
        (Some(n), Some(limit)) => n <= limit && !log.removed,
        _ => false,
    }
}

/// Install a fresh filter and fetch what was missed since `last_block`.
/// Returns the new id, the backfilled logs and the backfill's upper block.
async fn reinstall<T: RpcTransport>(
    rpc: &EthRpc<T>,
    filter: &LogFilter,
    last_block: Option<u64>,
) -> Result<(String, Vec<Log>, Option<u64>), TransportError> {
    let Some(last) = last_block else {
        return Ok((rpc.new_filter(filter).await?, Vec::new(), None));
    };
    let restart = filter.clone().from_block(last + 1);
    let id = rpc.new_filter(&restart).await?;
    let head = rpc.block_number().await?;
    if head <= last {
        return Ok((id, Vec::new(), None));
    }
    let backfill = rpc.logs(&filter.with_range(last + 1, head)).await?;
    Ok((id, backfill, Some(head)))
}
