//! Error types for registry-interest.

/// Result type alias for registry-interest operations.
pub type Result<T> = std::result::Result<T, InterestError>;

/// Errors that can occur while managing interest subscriptions.
#[derive(Debug, thiserror::Error)]
pub enum InterestError {
    /// The handler was shut down before the call was made.
    #[error("InterestHandler has shut down")]
    ShutDown,

    /// The channel factory failed to produce a channel.
    #[error("Failed to create interest channel: {0}")]
    ChannelCreation(String),

    /// The remote session behind a channel failed.
    #[error("Interest channel failed: {0}")]
    ChannelFailure(String),

    /// The remote session behind a channel ended without an error.
    #[error("Interest channel completed unexpectedly")]
    ChannelCompleted,

    /// The remote side refused an interest update.
    #[error("Interest update rejected: {0}")]
    ChangeRejected(String),

    /// Evicting stale registry entries failed.
    #[error("Eviction failed: {0}")]
    Eviction(String),

    /// The reconnect policy gave up.
    #[error("Reconnect attempts exhausted after {attempts} attempts")]
    ConnectionExhausted {
        /// Number of consecutive failed attempts
        attempts: u32,
    },

    /// The registry view reported a failure.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Failed to load handler configuration.
    #[error("Failed to load configuration: {0}")]
    Config(String),

    /// Handler configuration was loaded but is not usable.
    #[error("Invalid configuration: {field} {reason}")]
    InvalidConfig {
        /// The offending field
        field: &'static str,
        /// Why the value was rejected
        reason: &'static str,
    },

    /// Generic error for other cases.
    #[error("Interest error: {0}")]
    Other(String),
}

impl From<config::ConfigError> for InterestError {
    fn from(err: config::ConfigError) -> Self {
        InterestError::Config(err.to_string())
    }
}
