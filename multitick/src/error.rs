use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TickerError {
    #[error("Invalid interval: {0:?} (must be greater than zero and fit the runtime clock)")]
    InvalidInterval(Duration),

    #[error("No tokio runtime available to drive the ticker")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, TickerError>;
