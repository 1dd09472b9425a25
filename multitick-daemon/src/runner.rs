//! Drives a ticker from the daemon config and streams what its subscribers see

use anyhow::{Context, Result};
use multitick::{wall_clock_seed, Tick, Ticker};
use std::future::Future;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::config::DaemonConfig;
use crate::events::TickEvent;

/// What a run observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks received by subscriber 0
    pub ticks: u64,
    /// Ticks that missed at least one subscriber
    pub dropped: u64,
}

/// Build the ticker described by `config`, with sampling applied
pub fn build_ticker(config: &DaemonConfig) -> Result<Ticker> {
    let ticker = if config.random_offset {
        Ticker::randomly_offset(config.interval(), config.seed)
    } else {
        Ticker::new(config.interval(), config.offset())
    }
    .context("Failed to create ticker")?;

    if config.sample_interval_ms > 0 {
        let seed = config.seed.unwrap_or_else(wall_clock_seed);
        ticker.sample(config.sample_interval(), seed);
    }

    Ok(ticker)
}

/// Run until `shutdown` resolves or subscriber 0 has seen `limit` ticks.
///
/// Every received tick and every periodic stats report is written to `out` as a JSON
/// line; a final stats line is written after the ticker stops.
pub async fn run<W, F>(
    config: &DaemonConfig,
    limit: Option<u64>,
    shutdown: F,
    out: &mut W,
) -> Result<RunSummary>
where
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    let ticker = build_ticker(config)?;
    info!(
        "Ticker configured: interval {:?}, offset {:?}, sampling factor {}",
        ticker.interval(),
        ticker.offset(),
        ticker.sampling_factor()
    );

    let (events_tx, mut events_rx) = mpsc::channel(config.subscribers.max(1));
    let readers: Vec<JoinHandle<()>> = (0..config.subscribers)
        .map(|subscriber| spawn_reader(subscriber, ticker.subscribe(), events_tx.clone()))
        .collect();
    drop(events_tx);

    let mut stats = config
        .stats_interval()
        .map(|every| time::interval_at(Instant::now() + every, every));

    tokio::pin!(shutdown);
    let mut ticks = 0u64;

    while !limit.is_some_and(|limit| ticks >= limit) {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            event = events_rx.recv() => {
                let Some(event) = event else { break };
                if matches!(event, TickEvent::Tick { subscriber: 0, .. }) {
                    ticks += 1;
                }
                write_event(out, &event).await?;
            }
            _ = next_stats(&mut stats) => {
                write_event(out, &stats_event(&ticker)).await?;
            }
        }
    }

    if limit.is_some_and(|limit| ticks >= limit) {
        debug!("Tick limit reached");
    }
    ticker.stop();
    for reader in readers {
        reader.abort();
    }
    write_event(out, &stats_event(&ticker)).await?;
    out.flush().await.context("Failed to flush output")?;

    Ok(RunSummary {
        ticks,
        dropped: ticker.dropped(),
    })
}

/// Forward one subscriber's ticks into the shared event queue.
///
/// The queue is bounded; while the writer is behind, the reader waits here and stops
/// draining its subscriber channel, so the ticker counts the missed ticks as dropped.
fn spawn_reader(
    subscriber: usize,
    mut ticks: mpsc::Receiver<Tick>,
    events: mpsc::Sender<TickEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(tick) = ticks.recv().await {
            if events.send(TickEvent::tick(subscriber, tick)).await.is_err() {
                break;
            }
        }
    })
}

fn stats_event(ticker: &Ticker) -> TickEvent {
    TickEvent::Stats {
        dropped: ticker.dropped(),
        subscribers: ticker.subscriber_count(),
        sampling_factor: ticker.sampling_factor(),
    }
}

async fn next_stats(stats: &mut Option<time::Interval>) {
    match stats {
        Some(stats) => {
            stats.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn write_event<W: AsyncWrite + Unpin>(out: &mut W, event: &TickEvent) -> Result<()> {
    let line = event.to_json_line().context("Failed to serialize event")?;
    out.write_all(line.as_bytes())
        .await
        .context("Failed to write event")?;
    Ok(())
}
