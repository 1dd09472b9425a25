//! Broadcast a single periodic ticker to many subscribers
//!
//! This crate provides [`Ticker`], which owns one periodic timer and fans each of its
//! ticks out to any number of subscriber channels. All subscribers receive the same
//! wall-clock timestamp for a given tick.
//!
//! # Features
//!
//! - Phase alignment: ticks land at a fixed offset past each interval boundary of the
//!   absolute wall clock, so separately created tickers stay in step
//! - Random offsets: pick the phase uniformly from the interval, optionally seeded
//! - Non-blocking fan-out: a subscriber that is not ready misses the tick, and nobody
//!   else waits for it
//! - Sampling: forward only one randomly chosen tick out of every N, reproducible
//!   from a seed
//! - Dropped tick accounting
//!
//! # Example Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use multitick::Ticker;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Tick every second, 250ms past the second
//!     let ticker = Ticker::new(Duration::from_secs(1), Some(Duration::from_millis(250)))?;
//!     let mut ticks = ticker.subscribe();
//!
//!     // Only pass on one random tick out of every 5 seconds
//!     ticker.sample(Duration::from_secs(5), 42);
//!
//!     for _ in 0..3 {
//!         if let Some(tick) = ticks.recv().await {
//!             println!("tick at {}", tick);
//!         }
//!     }
//!
//!     ticker.stop();
//!     Ok(())
//! }
//! ```

pub mod align;
pub mod clock;
pub mod error;
pub mod sampler;
pub mod subscribers;
pub mod ticker;

// Re-exports
pub use align::wall_clock_seed;
pub use clock::Tick;
pub use error::{Result, TickerError};
pub use sampler::Sampler;
pub use ticker::{Ticker, TickerState};
