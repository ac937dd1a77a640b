use thiserror::Error;

/// Errors raised while building a collection or a test harness.
///
/// Full and empty collections are not errors: `push` hands the value back and
/// `pop` returns `None`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("capacity must be at least 1")]
    ZeroCapacity,

    #[error("capacity {capacity} leaves no room for the sentinel slot")]
    CapacityOverflow { capacity: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
