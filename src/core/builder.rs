//! Builder for constructing InterestHandler instances.

use crate::Telemetry;
use crate::connection::{ChannelFactory, InterestChannel};
use crate::core::{HandlerConfig, InterestHandler};
use crate::error::Result;
use crate::registry::RegistryView;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::InterestMetrics;

/// Builder for constructing an `InterestHandler`.
///
/// Starts from [`HandlerConfig::default`]; individual settings can be
/// overridden or a loaded config supplied wholesale.
///
/// # Examples
///
/// ```rust,no_run
/// use registry_interest::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example<I, C, R, F>(registry: Arc<R>, factory: F) -> Result<InterestHandler<I, C>>
/// # where I: Clone + Send + Sync + 'static, C: InterestChannel, R: RegistryView<I>, F: ChannelFactory<C> {
/// let handler = InterestHandler::builder()
///     .with_retry_wait(Duration::from_secs(1))
///     .with_max_reconnect_attempts(30)
///     .build(registry, factory)?;
/// # Ok(handler)
/// # }
/// ```
pub struct InterestHandlerBuilder {
    config: HandlerConfig,
    #[cfg(feature = "metrics")]
    metrics: Option<InterestMetrics>,
}

impl InterestHandlerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: HandlerConfig::default(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Replace all settings, e.g. with ones from [`HandlerConfig::load`].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use registry_interest::prelude::*;
    ///
    /// # fn example() -> Result<()> {
    /// let config = HandlerConfig::load(Some("interest.yaml"), Some("RIQ"))?;
    /// let builder = InterestHandler::builder().with_config(config);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_config(mut self, config: HandlerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the delay between reconnect attempts.
    ///
    /// Default is 500ms.
    pub fn with_retry_wait(mut self, wait: Duration) -> Self {
        self.config.retry_wait_ms = wait.as_millis() as u64;
        self
    }

    /// Stop reconnecting after this many consecutive failures.
    ///
    /// By default the handler retries forever.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Set how many notifications are buffered per subscriber.
    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.config.stream_buffer = capacity;
        self
    }

    /// Set how many channel generations the eviction task may lag behind.
    pub fn with_channel_history(mut self, capacity: usize) -> Self {
        self.config.channel_history = capacity;
        self
    }

    /// Record OpenTelemetry metrics through `meter`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(InterestMetrics::new(meter));
        self
    }

    /// Build the handler and start connecting.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings fail [`HandlerConfig::validate`].
    pub fn build<I, C, R, F>(self, registry: Arc<R>, factory: F) -> Result<InterestHandler<I, C>>
    where
        I: Clone + Send + Sync + 'static,
        C: InterestChannel,
        R: RegistryView<I>,
        F: ChannelFactory<C>,
    {
        self.config.validate()?;

        #[cfg(feature = "metrics")]
        let telemetry: Telemetry = self.metrics;
        #[cfg(not(feature = "metrics"))]
        let telemetry: Telemetry = ();

        Ok(InterestHandler::start(
            registry,
            factory,
            self.config,
            telemetry,
        ))
    }
}

impl Default for InterestHandlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
