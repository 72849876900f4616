use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, simulating, evolving or persisting walkers.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid run configuration, or a request that has no valid state to work from
    /// (such as reconstructing from an empty lineage).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The physics world lost track of a body/joint or produced a non-finite state.
    #[error("physics failure: {0}")]
    Physics(String),

    #[error("trajectory I/O failed for {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trajectory encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "parallel")]
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
