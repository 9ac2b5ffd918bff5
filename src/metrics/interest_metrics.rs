//! Interest handler metrics using OpenTelemetry.

use opentelemetry::metrics::{Counter, Gauge, Meter};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector for interest handling.
///
/// Tracks subscriptions, channel generations, reconnects and evictions
/// using OpenTelemetry metrics.
///
/// # Examples
///
/// ```rust,no_run
/// use registry_interest::metrics::InterestMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("registry-interest");
/// let metrics = InterestMetrics::new(meter);
///
/// metrics.record_generation();
/// metrics.record_eviction(12);
/// ```
#[derive(Clone)]
pub struct InterestMetrics {
    subscriptions_opened: Counter<u64>,
    subscriptions_rejected: Counter<u64>,
    channel_generations: Counter<u64>,
    reconnect_attempts: Counter<u64>,
    evicted_instances: Counter<u64>,
    eviction_failures: Counter<u64>,
    generation_age_seconds: Gauge<i64>,
    last_generation: Arc<parking_lot::Mutex<Instant>>,
}

impl InterestMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let subscriptions_opened = meter
            .u64_counter("registry_interest.subscriptions.opened")
            .with_description("Number of interest streams handed out")
            .build();

        let subscriptions_rejected = meter
            .u64_counter("registry_interest.subscriptions.rejected")
            .with_description("Number of interest requests refused after shutdown")
            .build();

        let channel_generations = meter
            .u64_counter("registry_interest.channel.generations")
            .with_description("Number of interest channels established")
            .build();

        let reconnect_attempts = meter
            .u64_counter("registry_interest.channel.reconnects")
            .with_description("Number of scheduled reconnect attempts")
            .build();

        let evicted_instances = meter
            .u64_counter("registry_interest.eviction.instances")
            .with_description("Registry entries evicted after a channel change")
            .build();

        let eviction_failures = meter
            .u64_counter("registry_interest.eviction.failures")
            .with_description("Number of failed eviction rounds")
            .build();

        let generation_age_seconds = meter
            .i64_gauge("registry_interest.channel.age")
            .with_description("Time since the live channel was established in seconds")
            .with_unit("s")
            .build();

        Self {
            subscriptions_opened,
            subscriptions_rejected,
            channel_generations,
            reconnect_attempts,
            evicted_instances,
            eviction_failures,
            generation_age_seconds,
            last_generation: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    /// Record a successful `for_interest` call.
    pub fn record_subscription(&self) {
        self.subscriptions_opened.add(1, &[]);
    }

    /// Record a `for_interest` call refused because the handler shut down.
    pub fn record_rejected_subscription(&self) {
        self.subscriptions_rejected.add(1, &[]);
    }

    /// Record a newly established channel generation.
    pub fn record_generation(&self) {
        self.channel_generations.add(1, &[]);
        *self.last_generation.lock() = Instant::now();
    }

    /// Record a scheduled reconnect.
    pub fn record_reconnect(&self) {
        self.reconnect_attempts.add(1, &[]);
    }

    /// Record a completed eviction round.
    pub fn record_eviction(&self, evicted: u64) {
        self.evicted_instances.add(evicted, &[]);
    }

    /// Record a failed eviction round.
    pub fn record_eviction_failure(&self) {
        self.eviction_failures.add(1, &[]);
    }

    /// Update the generation age gauge.
    ///
    /// Call periodically to see how long the current channel has survived.
    pub fn update_generation_age(&self) {
        let age_secs = self.last_generation.lock().elapsed().as_secs() as i64;
        self.generation_age_seconds.record(age_secs, &[]);
    }
}
