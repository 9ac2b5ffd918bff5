//! # registry-interest
//!
//! Client-side interest subscriptions for a service-discovery registry.
//!
//! ## Overview
//!
//! Callers ask to be told about changes to the service instances matching an
//! [`Interest`](model::Interest). `registry-interest` multiplexes all of those
//! requests over a single channel to the registry service:
//! - The channel always carries the union of every live interest
//! - A dead channel is replaced after a fixed delay and receives the latest union
//! - State left behind by a replaced channel is evicted from the local registry view
//! - Each caller gets its own stream, with source tags stripped
//!
//! The transport and the registry store are supplied by the caller through
//! the [`ChannelFactory`](connection::ChannelFactory),
//! [`InterestChannel`](connection::InterestChannel) and
//! [`RegistryView`](registry::RegistryView) traits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use registry_interest::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example<I, C, R, F>(registry: Arc<R>, factory: F) -> Result<()>
//! # where I: Clone + Send + Sync + 'static, C: InterestChannel, R: RegistryView<I>, F: ChannelFactory<C> {
//! let handler = InterestHandler::builder()
//!     .with_retry_wait(Duration::from_millis(500))
//!     .build(registry, factory)?;
//!
//! let mut stream = handler.for_interest(Interest::application("billing"))?;
//! while let Some(change) = stream.next().await {
//!     let change = change?;
//!     println!("{:?}", change.kind());
//! }
//!
//! handler.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `yaml`, `toml`, `json` (default): file formats accepted by
//!   [`HandlerConfig::load`](core::HandlerConfig::load)
//! - `metrics`: OpenTelemetry counters for subscriptions, reconnects and evictions

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod connection;
pub mod core;
pub mod error;
pub mod model;
pub mod registry;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Metrics sink handed to background tasks.
#[cfg(feature = "metrics")]
pub(crate) type Telemetry = Option<metrics::InterestMetrics>;
#[cfg(not(feature = "metrics"))]
pub(crate) type Telemetry = ();

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::connection::{
        Channel, ChannelFactory, ConnectionState, InterestChannel, RetryPolicy,
    };
    pub use crate::core::{HandlerConfig, InterestHandler, InterestHandlerBuilder, InterestStream};
    pub use crate::error::{InterestError, Result};
    pub use crate::model::{ChangeKind, ChangeNotification, Interest, RegistryNotification, Source};
    pub use crate::registry::RegistryView;
}
