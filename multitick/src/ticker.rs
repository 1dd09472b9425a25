use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::align::{alignment_delay, normalize_offset, random_offset};
use crate::clock::{Tick, WallAnchor};
use crate::error::{Result, TickerError};
use crate::sampler::Sampler;
use crate::subscribers::SubscriberSet;

/// Lifecycle of a ticker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerState {
    /// Waiting for the aligned start instant; no timer exists yet
    Pending,
    /// Timer created, ticks are being dispatched
    Running,
    /// Stopped; no further ticks will be delivered
    Stopped,
}

struct Control {
    state: TickerState,
    sampler: Sampler,
}

/// State shared between the handle and the dispatch task
struct Shared {
    subscribers: SubscriberSet,
    control: Mutex<Control>,
    shutdown: watch::Sender<bool>,
    dropped: AtomicU64,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_tick(&self, tick: Tick) {
        let admitted = {
            let mut control = self.control();
            if control.state == TickerState::Stopped {
                return;
            }
            control.sampler.admit()
        };

        if !admitted {
            tracing::trace!("Tick {} suppressed by sampler", tick);
            return;
        }

        let delivery = self.subscribers.broadcast(tick);
        if delivery.missed_any() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(
                "Tick {} missed {} subscriber(s) (dropped total: {})",
                tick,
                delivery.skipped,
                dropped
            );
        } else {
            tracing::trace!("Tick {} delivered to {} subscriber(s)", tick, delivery.delivered);
        }
    }
}

/// Broadcasts one periodic timer to any number of subscribers.
///
/// Every subscriber receives the same wall-clock timestamp for a given tick. Delivery
/// never waits: a subscriber whose channel is still holding the previous tick simply
/// misses the new one. Dropping the ticker stops it.
pub struct Ticker {
    shared: Arc<Shared>,
    interval: Duration,
    offset: Option<Duration>,
}

impl Ticker {
    /// Create and start a ticker.
    ///
    /// With `Some(offset)` the first tick is delayed until the wall clock is `offset`
    /// past an interval boundary (boundaries counted from the Unix epoch), and every
    /// later tick keeps that phase. With `None` ticking begins immediately.
    ///
    /// Returns immediately; the alignment wait happens on the dispatch task.
    pub fn new(interval: Duration, offset: Option<Duration>) -> Result<Self> {
        if interval.is_zero() {
            return Err(TickerError::InvalidInterval(interval));
        }
        let runtime = Handle::try_current().map_err(|_| TickerError::NoRuntime)?;

        let offset = offset.map(|offset| normalize_offset(offset, interval));
        let anchor = WallAnchor::now();
        let delay = offset
            .map(|offset| alignment_delay(anchor.wall(), interval, offset))
            .unwrap_or(Duration::ZERO);
        let start = anchor
            .instant()
            .checked_add(delay)
            .ok_or(TickerError::InvalidInterval(interval))?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            subscribers: SubscriberSet::new(),
            control: Mutex::new(Control {
                state: TickerState::Pending,
                sampler: Sampler::disabled(),
            }),
            shutdown,
            dropped: AtomicU64::new(0),
        });

        tracing::debug!(
            "Ticker aligning: interval {:?}, offset {:?}, first tick in {:?}",
            interval,
            offset,
            delay
        );
        runtime.spawn(dispatch(
            Arc::clone(&shared),
            anchor,
            start,
            interval,
            shutdown_rx,
        ));

        Ok(Self {
            shared,
            interval,
            offset,
        })
    }

    /// Create a ticker whose offset is drawn uniformly from `[0, interval)`.
    ///
    /// Without a seed the offset generator is seeded from the wall clock.
    pub fn randomly_offset(interval: Duration, seed: Option<u64>) -> Result<Self> {
        if interval.is_zero() {
            return Err(TickerError::InvalidInterval(interval));
        }
        Self::new(interval, Some(random_offset(interval, seed)))
    }

    /// Register a subscriber.
    ///
    /// Ticks the channel is not ready to accept are discarded. There is no way to
    /// unsubscribe; drop the receiver to stop listening.
    pub fn subscribe(&self) -> mpsc::Receiver<Tick> {
        self.shared.subscribers.subscribe()
    }

    /// Only forward one tick, chosen at random, out of every `sample_interval`.
    ///
    /// Ticks still fire at the base interval and offset; sampling picks which of them
    /// reach subscribers. `sample_interval` is rounded down to a whole number of base
    /// intervals, and anything shorter than one base interval (including zero) turns
    /// sampling off. Takes effect from the next tick.
    ///
    /// Reconfiguring restarts window counting at the next tick, so the same seed
    /// always yields the same positions relative to the call.
    pub fn sample(&self, sample_interval: Duration, seed: u64) {
        let sampler = Sampler::for_interval(sample_interval, self.interval, seed);
        let factor = sampler.factor();
        self.shared.control().sampler = sampler;

        if factor == 0 {
            tracing::debug!("Sampling disabled");
        } else {
            tracing::debug!("Sampling 1 of every {} ticks (seed {})", factor, seed);
        }
    }

    /// Stop the ticker. Like a plain timer, it does not close subscriber channels.
    ///
    /// Calling it more than once, or before the first tick, is harmless.
    pub fn stop(&self) {
        {
            let mut control = self.shared.control();
            if control.state == TickerState::Stopped {
                return;
            }
            control.state = TickerState::Stopped;
        }

        self.shared.subscribers.seal();
        self.shared.shutdown.send_replace(true);

        tracing::info!(
            "Ticker stopped ({} subscribers, {} dropped ticks)",
            self.shared.subscribers.len(),
            self.dropped()
        );
    }

    /// Number of ticks that could not be delivered to at least one subscriber
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Phase offset within each interval, if aligned
    pub fn offset(&self) -> Option<Duration> {
        self.offset
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }

    /// Active sampling factor; 0 when sampling is off
    pub fn sampling_factor(&self) -> u64 {
        self.shared.control().sampler.factor()
    }

    pub fn state(&self) -> TickerState {
        self.shared.control().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == TickerState::Running
    }
}

impl fmt::Debug for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticker")
            .field("interval", &self.interval)
            .field("offset", &self.offset)
            .field("state", &self.state())
            .field("subscribers", &self.subscriber_count())
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background task: wait for the aligned start, then forward timer ticks until stopped
async fn dispatch(
    shared: Arc<Shared>,
    anchor: WallAnchor,
    start: Instant,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::select! {
        biased;
        _ = shutdown.wait_for(|stopped| *stopped) => {
            tracing::debug!("Ticker stopped before its first tick");
            return;
        }
        _ = time::sleep_until(start) => {}
    }

    let mut timer = {
        let mut control = shared.control();
        if control.state == TickerState::Stopped {
            return;
        }
        control.state = TickerState::Running;

        let mut timer = time::interval_at(start, interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        timer
    };

    tracing::info!(
        "Ticker started at {} (interval {:?})",
        anchor.wall_time(start),
        interval
    );

    loop {
        let at = tokio::select! {
            biased;
            _ = shutdown.wait_for(|stopped| *stopped) => break,
            at = timer.tick() => at,
        };
        shared.on_tick(anchor.wall_time(at));
    }

    tracing::debug!("Ticker dispatch task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_requires_runtime() {
        let err = assert_err!(Ticker::new(Duration::from_secs(1), None));
        assert_eq!(err, TickerError::NoRuntime);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_zero_interval() {
        let err = assert_err!(Ticker::new(Duration::ZERO, None));
        assert_eq!(err, TickerError::InvalidInterval(Duration::ZERO));

        let err = assert_err!(Ticker::randomly_offset(Duration::ZERO, Some(1)));
        assert_eq!(err, TickerError::InvalidInterval(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_unreachable_start() {
        let interval = Duration::from_secs(u64::MAX);
        let err = assert_err!(Ticker::new(interval, Some(Duration::ZERO)));
        assert_eq!(err, TickerError::InvalidInterval(interval));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_create() {
        let ticker = assert_ok!(Ticker::new(
            Duration::from_secs(1),
            Some(Duration::from_millis(250))
        ));
        assert_eq!(ticker.interval(), Duration::from_secs(1));
        assert_eq!(ticker.offset(), Some(Duration::from_millis(250)));
        assert_eq!(ticker.subscriber_count(), 0);
        assert_eq!(ticker.sampling_factor(), 0);
        assert_eq!(ticker.dropped(), 0);
        assert_eq!(ticker.state(), TickerState::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offset_normalized() {
        let ticker = assert_ok!(Ticker::new(
            Duration::from_secs(1),
            Some(Duration::from_millis(3250))
        ));
        assert_eq!(ticker.offset(), Some(Duration::from_millis(250)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_states() {
        let ticker = assert_ok!(Ticker::new(Duration::from_millis(100), None));
        let mut rx = ticker.subscribe();

        assert_ok!(rx.recv().await.ok_or("closed"));
        assert!(ticker.is_running());

        ticker.stop();
        assert_eq!(ticker.state(), TickerState::Stopped);
        assert!(!ticker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let ticker = assert_ok!(Ticker::new(Duration::from_millis(100), None));
        ticker.stop();
        ticker.stop();
        assert_eq!(ticker.state(), TickerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_timer_exists() {
        let ticker = assert_ok!(Ticker::new(
            Duration::from_secs(1),
            Some(Duration::from_millis(500))
        ));
        let mut rx = ticker.subscribe();
        ticker.stop();

        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(ticker.state(), TickerState::Stopped);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_reports_factor() {
        let ticker = assert_ok!(Ticker::new(Duration::from_secs(1), None));

        ticker.sample(Duration::from_millis(2999), 0);
        assert_eq!(ticker.sampling_factor(), 2);

        ticker.sample(Duration::from_millis(500), 0);
        assert_eq!(ticker.sampling_factor(), 0);

        ticker.sample(Duration::from_secs(4), 0);
        assert_eq!(ticker.sampling_factor(), 4);

        ticker.sample(Duration::ZERO, 0);
        assert_eq!(ticker.sampling_factor(), 0);
    }

    async fn admitted_after_sample(ticker: &Ticker, rx: &mut mpsc::Receiver<Tick>) -> Vec<u64> {
        ticker.sample(Duration::from_millis(300), 0);
        let mut admitted = Vec::new();
        for position in 0..6 {
            time::sleep(Duration::from_millis(100)).await;
            if rx.try_recv().is_ok() {
                admitted.push(position);
            }
        }
        admitted
    }

    #[tokio::test(start_paused = true)]
    async fn test_resample_restarts_window() {
        let ticker = assert_ok!(Ticker::new(Duration::from_millis(100), None));
        let mut rx = ticker.subscribe();

        // Land between ticks so each sleep covers exactly one tick
        time::sleep(Duration::from_millis(50)).await;
        assert_ok!(rx.try_recv());

        let first = admitted_after_sample(&ticker, &mut rx).await;
        time::sleep(Duration::from_millis(100)).await;
        let _ = rx.try_recv();
        let second = admitted_after_sample(&ticker, &mut rx).await;

        assert_eq!(first, vec![2, 5]);
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_dispatch() {
        let ticker = assert_ok!(Ticker::new(Duration::from_millis(100), None));
        let shared = Arc::clone(&ticker.shared);
        drop(ticker);

        time::sleep(Duration::from_secs(1)).await;

        assert_eq!(shared.control().state, TickerState::Stopped);
        // Only our clone remains once the dispatch task has exited
        assert_eq!(Arc::strong_count(&shared), 1);
    }
}
