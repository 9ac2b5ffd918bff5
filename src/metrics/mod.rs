//! Built-in metrics for interest handling.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Subscriptions opened and rejected
//! - Channel generations and reconnect attempts
//! - Evicted instances and eviction failures
//! - Age of the live channel generation
//!
//! # Examples
//!
//! ```rust,no_run
//! use registry_interest::prelude::*;
//! use opentelemetry::global;
//!
//! # fn example<I, C, R, F>(registry: std::sync::Arc<R>, factory: F) -> Result<InterestHandler<I, C>>
//! # where I: Clone + Send + Sync + 'static, C: InterestChannel, R: RegistryView<I>, F: ChannelFactory<C> {
//! let meter = global::meter("my-app");
//!
//! let handler = InterestHandler::builder()
//!     .with_metrics(meter)
//!     .build(registry, factory)?;
//! # Ok(handler)
//! # }
//! ```

mod interest_metrics;

pub use interest_metrics::InterestMetrics;
