//! The per-caller notification stream.

use crate::core::tracker::Registration;
use crate::error::Result;
use crate::model::{ChangeNotification, Interest};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;

/// Notifications for one interest, with source tags removed.
///
/// The stream holds one registration in the handler's interest tracker.
/// Dropping it stops the forwarding task and removes exactly that
/// registration; other subscribers with an equal interest are unaffected.
///
/// # Examples
///
/// ```rust,no_run
/// use futures::StreamExt;
/// # use registry_interest::prelude::*;
/// # async fn example<I, C>(handler: InterestHandler<I, C>) -> Result<()>
/// # where I: Clone + Send + Sync + 'static, C: InterestChannel {
/// let mut stream = handler.for_interest(Interest::application("billing"))?;
/// while let Some(change) = stream.next().await {
///     let change = change?;
///     println!("{:?}", change.kind());
/// }
/// # Ok(())
/// # }
/// ```
pub struct InterestStream<I> {
    notifications: mpsc::Receiver<Result<ChangeNotification<I>>>,
    registration: Registration,
    _forwarder: DropGuard,
}

impl<I> InterestStream<I> {
    pub(crate) fn new(
        notifications: mpsc::Receiver<Result<ChangeNotification<I>>>,
        registration: Registration,
        forwarder: DropGuard,
    ) -> Self {
        Self {
            notifications,
            registration,
            _forwarder: forwarder,
        }
    }

    /// The interest this stream was opened for.
    pub fn interest(&self) -> &Interest {
        self.registration.interest()
    }
}

impl<I> Stream for InterestStream<I> {
    type Item = Result<ChangeNotification<I>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().notifications.poll_recv(cx)
    }
}

impl<I> std::fmt::Debug for InterestStream<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterestStream")
            .field("interest", self.interest())
            .finish_non_exhaustive()
    }
}
