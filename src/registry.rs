//! The registry view the handler reads from and evicts stale state in.

use crate::error::Result;
use crate::model::{Interest, RegistryNotification, Source};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Local view of the registry, fed by the transport.
///
/// The view owns matching of instances against interests. The handler only
/// asks it for change streams and tells it when a connection generation has
/// been superseded.
#[async_trait]
pub trait RegistryView<I>: Send + Sync + 'static {
    /// Changes to instances matching `interest`, possibly tagged with their
    /// source. Must support concurrent calls for different interests.
    ///
    /// The stream ends when the view is shut down.
    fn for_interest(&self, interest: &Interest) -> BoxStream<'static, RegistryNotification<I>>;

    /// Remove every entry whose source is not `source`, returning how many
    /// entries were removed.
    async fn evict_all_except(&self, source: &Source) -> Result<u64>;

    /// Stop producing notifications and release resources.
    async fn shutdown(&self);
}
