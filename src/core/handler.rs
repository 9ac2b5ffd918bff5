//! The interest handler: one resilient channel shared by every subscriber.

use crate::Telemetry;
use crate::connection::{
    Binding, Channel, ChannelFactory, ConnectionState, InterestChannel, RetryableConnection,
};
use crate::core::stream::InterestStream;
use crate::core::tracker::{InterestTracker, Registration};
use crate::core::{HandlerConfig, InterestHandlerBuilder};
use crate::error::{InterestError, Result};
use crate::model::{ChangeNotification, Interest, RegistryNotification, translate};
use crate::registry::RegistryView;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};


/// Client-side entry point for interest subscriptions.
///
/// The handler keeps a single interest channel to the registry service whose
/// interest is the union of everything callers currently ask for. When that
/// channel dies it is replaced after a fixed delay, the union is replayed onto
/// the replacement, and registry entries left behind by earlier channels are
/// evicted. Callers receive plain [`ChangeNotification`]s read from the local
/// [`RegistryView`].
///
/// Eviction runs once per generation the eviction task gets to. If channels
/// are replaced faster than the registry view evicts, the generations that
/// were superseded in the meantime get no round of their own and only the
/// newest one is evicted against.
///
/// Creating a handler spawns background tasks and must happen inside a Tokio
/// runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use registry_interest::prelude::*;
/// use std::sync::Arc;
///
/// # async fn example<I, C, R, F>(registry: Arc<R>, factory: F) -> Result<()>
/// # where I: Clone + Send + Sync + 'static, C: InterestChannel, R: RegistryView<I>, F: ChannelFactory<C> {
/// let handler = InterestHandler::new(registry, factory);
///
/// let mut billing = handler.for_interest(Interest::application("billing"))?;
/// if let Some(change) = billing.next().await {
///     println!("{:?}", change?.kind());
/// }
///
/// // Dropping the stream withdraws the interest.
/// drop(billing);
/// handler.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct InterestHandler<I, C> {
    registry: Arc<dyn RegistryView<I>>,
    tracker: Arc<InterestTracker>,
    connection: RetryableConnection<C, Interest>,
    lifecycle: watch::Receiver<ConnectionState>,
    is_shutdown: AtomicBool,
    tasks: CancellationToken,
    stream_buffer: usize,
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    telemetry: Telemetry,
}

impl<I, C> InterestHandler<I, C>
where
    I: Clone + Send + Sync + 'static,
    C: InterestChannel,
{
    /// Create a handler with default settings and start connecting.
    pub fn new<R, F>(registry: Arc<R>, factory: F) -> Self
    where
        R: RegistryView<I>,
        F: ChannelFactory<C>,
    {
        Self::start(
            registry,
            factory,
            HandlerConfig::default(),
            <Telemetry as Default>::default(),
        )
    }

    /// Wire the tracker, connection and background tasks together.
    ///
    /// `config` must already be validated.
    pub(crate) fn start<R, F>(
        registry: Arc<R>,
        factory: F,
        config: HandlerConfig,
        telemetry: Telemetry,
    ) -> Self
    where
        R: RegistryView<I>,
        F: ChannelFactory<C>,
    {
        let registry: Arc<dyn RegistryView<I>> = registry;
        let tracker = Arc::new(InterestTracker::new());

        let binding: Binding<C, Interest> = Arc::new(
            |channel: Arc<C>, interest: Interest| -> BoxFuture<'static, Result<()>> {
                Box::pin(async move { channel.change(interest).await })
            },
        );
        let connection = RetryableConnection::with_telemetry(
            factory,
            tracker.interest_changes(),
            binding,
            config.channel_history,
            telemetry.clone(),
        );

        let tasks = CancellationToken::new();

        // Subscribe before starting so the first generation is not missed.
        tokio::spawn(evict_superseded(
            Arc::clone(&registry),
            connection.channels(),
            tasks.clone(),
            telemetry.clone(),
        ));

        let lifecycle = connection.start(config.retry_policy());
        tokio::spawn(follow_lifecycle(lifecycle.clone(), tasks.clone()));

        Self {
            registry,
            tracker,
            connection,
            lifecycle,
            is_shutdown: AtomicBool::new(false),
            tasks,
            stream_buffer: config.stream_buffer,
            telemetry,
        }
    }

    /// Subscribe to changes of instances matching `interest`.
    ///
    /// The interest joins the channel's union before this returns. The
    /// returned stream yields notifications without source tags; dropping it
    /// withdraws exactly this registration.
    ///
    /// If the connection's retry policy gives up, the stream yields one
    /// [`InterestError::ConnectionExhausted`] and ends.
    ///
    /// # Errors
    ///
    /// Returns [`InterestError::ShutDown`] after [`InterestHandler::shutdown`];
    /// no registration is made in that case.
    pub fn for_interest(&self, interest: Interest) -> Result<InterestStream<I>> {
        if self.is_shutdown.load(Ordering::Acquire) {
            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.telemetry {
                metrics.record_rejected_subscription();
            }
            return Err(InterestError::ShutDown);
        }

        let registration = Registration::new(Arc::clone(&self.tracker), interest);
        let upstream = self.registry.for_interest(registration.interest());

        let (tx, rx) = mpsc::channel(self.stream_buffer);
        let cancel = CancellationToken::new();
        tokio::spawn(forward_notifications(
            upstream,
            tx,
            cancel.clone(),
            self.lifecycle.clone(),
        ));

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.telemetry {
            metrics.record_subscription();
        }

        Ok(InterestStream::new(rx, registration, cancel.drop_guard()))
    }

    /// Shut the handler down. Only the first call has an effect.
    ///
    /// Releases the live channel, stops reconnecting and shuts down the
    /// registry view. Streams already handed out are not cut off; they end
    /// once the registry view stops producing.
    pub async fn shutdown(&self) {
        if self
            .is_shutdown
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        info!("Shutting down InterestHandler");
        self.connection.close().await;
        self.tasks.cancel();
        self.registry.shutdown().await;
    }

    /// Whether [`InterestHandler::shutdown`] has been called.
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::Acquire)
    }

    /// Union of all live interests, as last sent to the channel.
    pub fn current_interest(&self) -> Interest {
        self.tracker.current_union()
    }

    /// Number of open interest streams.
    pub fn registration_count(&self) -> usize {
        self.tracker.registration_count()
    }

    /// Current connection lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Follow connection lifecycle transitions.
    pub fn lifecycle(&self) -> watch::Receiver<ConnectionState> {
        self.connection.lifecycle()
    }

    /// The live channel generation, if any.
    pub fn current_channel(&self) -> Option<Arc<C>> {
        self.connection.current()
    }
}

impl InterestHandler<(), ()> {
    /// Create a new builder for constructing a handler.
    pub fn builder() -> InterestHandlerBuilder {
        InterestHandlerBuilder::new()
    }
}

impl<I, C> Drop for InterestHandler<I, C> {
    fn drop(&mut self) {
        self.tasks.cancel();
    }
}

/// Evict registry state not sourced by the newest established channel.
///
/// Rounds run one at a time. Generations announced while a round is in
/// flight are collapsed into the newest of them, so a generation that is
/// already superseded when the task gets to it has no eviction round of its
/// own; the newest generation's round removes its state too. The same holds
/// for generations skipped after falling more than `channel_history` behind.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
async fn evict_superseded<I, C>(
    registry: Arc<dyn RegistryView<I>>,
    mut channels: broadcast::Receiver<Arc<C>>,
    stop: CancellationToken,
    telemetry: Telemetry,
) where
    I: Send + Sync + 'static,
    C: Channel,
{
    loop {
        let mut channel = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            received = channels.recv() => match received {
                Ok(channel) => channel,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "eviction fell behind channel generations");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        let mut superseded: u64 = 0;
        loop {
            match channels.try_recv() {
                Ok(newer) => {
                    channel = newer;
                    superseded += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => superseded += skipped,
                Err(_) => break,
            }
        }
        if superseded > 0 {
            debug!(superseded, "skipping eviction for superseded channel generations");
        }

        let Some(source) = channel.source() else {
            debug!("new interest channel has no source, skipping eviction");
            continue;
        };
        drop(channel);

        match registry.evict_all_except(&source).await {
            Ok(evicted) => {
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &telemetry {
                    metrics.record_eviction(evicted);
                }
                info!(
                    evicted,
                    source = %source,
                    "Evicted instances in one round of eviction due to a new interest channel"
                );
            }
            Err(e) => {
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &telemetry {
                    metrics.record_eviction_failure();
                }
                warn!(
                    error = %e,
                    source = %source,
                    "Eviction round after a new interest channel failed"
                );
            }
        }
    }
}

/// Log connection lifecycle transitions until the connection settles.
async fn follow_lifecycle(mut lifecycle: watch::Receiver<ConnectionState>, stop: CancellationToken) {
    loop {
        let state = lifecycle.borrow_and_update().clone();
        match &state {
            ConnectionState::Backoff { attempt, reason, .. } => {
                debug!(attempt, reason = %reason, "interest channel reconnecting");
            }
            ConnectionState::Exhausted { attempts } => {
                warn!(attempts, "interest channel gave up; open streams are now stale");
            }
            ConnectionState::Closed => info!("interest channel closed"),
            other => debug!(state = %other, "interest channel lifecycle"),
        }

        if state.is_terminal() {
            break;
        }

        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            changed = lifecycle.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

/// Copy one registry stream to one subscriber, stripping source tags.
async fn forward_notifications<I>(
    mut upstream: BoxStream<'static, RegistryNotification<I>>,
    tx: mpsc::Sender<Result<ChangeNotification<I>>>,
    cancel: CancellationToken,
    mut lifecycle: watch::Receiver<ConnectionState>,
) where
    I: Send + 'static,
{
    let mut watching_lifecycle = true;

    loop {
        if watching_lifecycle {
            let exhausted = match &*lifecycle.borrow_and_update() {
                ConnectionState::Exhausted { attempts } => Some(*attempts),
                _ => None,
            };
            if let Some(attempts) = exhausted {
                let _ = tx.send(Err(InterestError::ConnectionExhausted { attempts })).await;
                break;
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = lifecycle.changed(), if watching_lifecycle => {
                if changed.is_err() {
                    watching_lifecycle = false;
                }
            }
            next = upstream.next() => match next {
                Some(notification) => {
                    if tx.send(Ok(translate(notification))).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }
}
