use platform::PlatformError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PurgeError {
    /// None of the path columns exist; nothing can be protected
    #[error("Could not find any valid path column in '{0}'. Aborting to prevent data loss.")]
    NoPathColumn(String),

    #[error("Query failed on '{table}': {source}")]
    AllowListQuery {
        table: String,
        #[source]
        source: PlatformError,
    },

    #[error(transparent)]
    Platform(#[from] PlatformError),
}
