//! Mapping between the timer's monotonic instants and wall-clock ticks

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Wall-clock timestamp delivered to subscribers
pub type Tick = DateTime<Utc>;

/// Wall time and monotonic time captured together.
///
/// Timer instants are converted to wall time by offsetting from this pair, so the
/// phase computed against the wall clock at construction carries over to every tick
/// even though the timer itself only knows monotonic time.
#[derive(Debug, Clone, Copy)]
pub struct WallAnchor {
    wall: DateTime<Utc>,
    instant: Instant,
}

impl WallAnchor {
    /// Capture the current wall and monotonic time
    pub fn now() -> Self {
        Self {
            wall: Utc::now(),
            instant: Instant::now(),
        }
    }

    pub fn wall(&self) -> DateTime<Utc> {
        self.wall
    }

    pub fn instant(&self) -> Instant {
        self.instant
    }

    /// Wall time corresponding to a monotonic instant
    pub fn wall_time(&self, at: Instant) -> Tick {
        let elapsed = at.saturating_duration_since(self.instant);
        match chrono::Duration::from_std(elapsed) {
            Ok(delta) => self.wall + delta,
            Err(_) => DateTime::<Utc>::MAX_UTC,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_wall_time_follows_monotonic_clock() {
        let anchor = WallAnchor::now();
        let later = anchor.instant() + Duration::from_millis(1250);

        let wall = anchor.wall_time(later);
        assert_eq!(wall - anchor.wall(), chrono::Duration::milliseconds(1250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_time_never_precedes_anchor() {
        let anchor = WallAnchor::now();
        tokio::time::advance(Duration::from_secs(1)).await;
        let anchor_later = WallAnchor {
            wall: anchor.wall(),
            instant: Instant::now(),
        };

        assert_eq!(anchor_later.wall_time(anchor.instant()), anchor.wall());
    }
}
