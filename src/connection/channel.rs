//! Traits implemented by the transport layer.

use crate::error::Result;
use crate::model::{Interest, Source};
use async_trait::async_trait;

/// One logical connection to the registry service.
///
/// Implementations wrap whatever transport session carries interest updates.
/// All methods take `&self`; a channel is shared between the reconnect loop
/// and observers through an `Arc`.
#[async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Resolves once the underlying session has ended.
    ///
    /// `Ok(())` means the session completed, `Err` means it failed. Either
    /// way the channel is dead and will be replaced.
    async fn closed(&self) -> Result<()>;

    /// Release the session. Must be safe to call more than once.
    async fn close(&self);

    /// Source of the state this channel delivers into the registry.
    ///
    /// Channels that cannot attribute their state return `None` and no
    /// eviction happens when they take over.
    fn source(&self) -> Option<Source> {
        None
    }
}

/// A channel that carries an interest subscription.
#[async_trait]
pub trait InterestChannel: Channel {
    /// Replace the interest registered on the remote session.
    async fn change(&self, interest: Interest) -> Result<()>;
}

/// Creates channels on demand, once initially and once per reconnect.
#[async_trait]
pub trait ChannelFactory<C>: Send + Sync + 'static {
    /// Open a new channel.
    async fn create(&self) -> Result<C>;
}
