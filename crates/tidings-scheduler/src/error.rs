//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur while configuring the scheduler or talking to the
/// dispatcher.
///
/// Store operations themselves never fail; they log and degrade instead.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dispatcher error: {0}")]
    Dispatcher(String),

    #[error("state store error: {0}")]
    State(#[from] tidings_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
