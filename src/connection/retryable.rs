//! The reconnect loop owning the live channel generation.

use super::{Channel, ChannelFactory, ConnectionState, RetryPolicy};
use crate::Telemetry;
use crate::error::{InterestError, Result};
use arc_swap::ArcSwapOption;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Operation applied to the live channel for every operand value.
pub type Binding<C, T> = Arc<dyn Fn(Arc<C>, T) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A connection that keeps exactly one channel alive under a retry policy.
///
/// The connection follows a `watch` stream of operand values. Every new
/// channel first receives the most recent operand; afterwards each operand
/// change is applied to the live channel in order. When the channel's session
/// ends the channel is released and, after the policy's delay, a fresh one is
/// requested from the factory.
///
/// Nothing happens until [`RetryableConnection::start`] is called. Subscribe
/// to [`RetryableConnection::channels`] before starting to observe the first
/// generation.
pub struct RetryableConnection<C, T> {
    inner: Arc<Inner<C, T>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Inner<C, T> {
    factory: Arc<dyn ChannelFactory<C>>,
    operands: watch::Receiver<T>,
    binding: Binding<C, T>,
    current: ArcSwapOption<C>,
    channels: broadcast::Sender<Arc<C>>,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    telemetry: Telemetry,
}

enum Ended {
    Stopped,
    Failed(InterestError),
}

impl<C, T> RetryableConnection<C, T>
where
    C: Channel,
    T: Clone + Send + Sync + 'static,
{
    /// Create a connection that is not started yet.
    ///
    /// # Arguments
    ///
    /// * `factory` - Produces a channel per connection attempt
    /// * `operands` - Stream of values to apply to the live channel
    /// * `binding` - Applies one operand to one channel
    /// * `history` - How many announced channels a slow observer may lag behind
    ///
    /// # Panics
    ///
    /// Panics if `history` is zero.
    pub fn new<F>(factory: F, operands: watch::Receiver<T>, binding: Binding<C, T>, history: usize) -> Self
    where
        F: ChannelFactory<C>,
    {
        Self::with_telemetry(
            factory,
            operands,
            binding,
            history,
            <Telemetry as Default>::default(),
        )
    }

    /// Like [`RetryableConnection::new`], recording generations and
    /// reconnects into `telemetry`.
    pub(crate) fn with_telemetry<F>(
        factory: F,
        operands: watch::Receiver<T>,
        binding: Binding<C, T>,
        history: usize,
        telemetry: Telemetry,
    ) -> Self
    where
        F: ChannelFactory<C>,
    {
        let (channels, _) = broadcast::channel(history);
        let (state, _) = watch::channel(ConnectionState::Idle);

        Self {
            inner: Arc::new(Inner {
                factory: Arc::new(factory),
                operands,
                binding,
                current: ArcSwapOption::empty(),
                channels,
                state,
                cancel: CancellationToken::new(),
                telemetry,
            }),
            task: Mutex::new(None),
        }
    }

    /// Start the reconnect loop. Later calls only return a new lifecycle
    /// receiver.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, policy: RetryPolicy) -> watch::Receiver<ConnectionState> {
        let mut task = self.task.lock();
        if task.is_none() && !self.inner.cancel.is_cancelled() {
            let inner = Arc::clone(&self.inner);
            *task = Some(tokio::spawn(inner.run(policy)));
        }
        self.inner.state.subscribe()
    }

    /// Channels in the order they were established, one per generation.
    pub fn channels(&self) -> broadcast::Receiver<Arc<C>> {
        self.inner.channels.subscribe()
    }

    /// Lifecycle transitions of the connection.
    pub fn lifecycle(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// The live channel, if a generation is established.
    pub fn current(&self) -> Option<Arc<C>> {
        self.inner.current.load_full()
    }

    /// Stop retrying and release the live channel.
    ///
    /// Waits for the reconnect loop to finish. Calling this more than once
    /// is a no-op.
    pub async fn close(&self) {
        self.inner.cancel.cancel();

        let task = self.task.lock().take();
        match task {
            Some(handle) => {
                if let Err(e) = handle.await {
                    warn!(error = %e, "reconnect loop ended abnormally");
                }
            }
            None => {
                self.inner.state.send_if_modified(|state| {
                    if state.is_terminal() {
                        false
                    } else {
                        *state = ConnectionState::Closed;
                        true
                    }
                });
            }
        }
    }
}

impl<C, T> Drop for RetryableConnection<C, T> {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl<C, T> Inner<C, T>
where
    C: Channel,
    T: Clone + Send + Sync + 'static,
{
    async fn run(self: Arc<Self>, policy: RetryPolicy) {
        let mut operands = self.operands.clone();
        let mut failures: u32 = 0;
        let mut generation: u64 = 0;

        loop {
            self.transition(ConnectionState::Connecting {
                attempt: failures + 1,
            });

            let created = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                created = self.factory.create() => created,
            };

            let reason = match created {
                Ok(channel) => {
                    let channel = Arc::new(channel);
                    match self
                        .serve(&channel, &mut operands, &mut generation, &mut failures)
                        .await
                    {
                        Ended::Stopped => break,
                        Ended::Failed(reason) => reason,
                    }
                }
                Err(reason) => reason,
            };

            failures = failures.saturating_add(1);
            if !policy.should_retry(failures) {
                warn!(attempts = failures, error = %reason, "reconnect attempts exhausted");
                self.transition(ConnectionState::Exhausted { attempts: failures });
                return;
            }

            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.telemetry {
                metrics.record_reconnect();
            }

            let delay = policy.delay();
            warn!(
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %reason,
                "interest channel lost, scheduling reconnect"
            );
            self.transition(ConnectionState::Backoff {
                attempt: failures,
                delay,
                reason: reason.to_string(),
            });

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.transition(ConnectionState::Closed);
    }

    /// Drive one channel generation until it dies or the connection stops.
    async fn serve(
        &self,
        channel: &Arc<C>,
        operands: &mut watch::Receiver<T>,
        generation: &mut u64,
        failures: &mut u32,
    ) -> Ended {
        let latest = operands.borrow_and_update().clone();
        let applied = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(None),
            applied = (self.binding)(Arc::clone(channel), latest) => applied.map_err(Some),
        };
        match applied {
            Ok(()) => {}
            Err(reason) => {
                channel.close().await;
                return reason.map_or(Ended::Stopped, Ended::Failed);
            }
        }

        *generation += 1;
        *failures = 0;
        self.current.store(Some(Arc::clone(channel)));
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.telemetry {
            metrics.record_generation();
        }
        info!(
            generation = *generation,
            source = ?channel.source(),
            "interest channel established"
        );
        // Err only means nobody is observing.
        let _ = self.channels.send(Arc::clone(channel));
        self.transition(ConnectionState::Connected {
            generation: *generation,
        });

        let mut closed = channel.closed();
        let ended = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Ended::Stopped,
                result = &mut closed => {
                    break Ended::Failed(result.err().unwrap_or(InterestError::ChannelCompleted));
                }
                changed = operands.changed() => {
                    if changed.is_err() {
                        debug!("operand source dropped, stopping connection");
                        break Ended::Stopped;
                    }
                    let operand = operands.borrow_and_update().clone();
                    // A change that never completes must not hide a dead session or block close().
                    let applied = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break Ended::Stopped,
                        result = &mut closed => {
                            break Ended::Failed(result.err().unwrap_or(InterestError::ChannelCompleted));
                        }
                        applied = (self.binding)(Arc::clone(channel), operand) => applied,
                    };
                    if let Err(reason) = applied {
                        break Ended::Failed(reason);
                    }
                }
            }
        };
        drop(closed);

        self.current.store(None);
        channel.close().await;
        ended
    }

    fn transition(&self, next: ConnectionState) {
        debug!(state = %next, "connection lifecycle");
        self.state.send_replace(next);
    }
}
