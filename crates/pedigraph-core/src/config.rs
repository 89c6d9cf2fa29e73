use std::time::Duration;

/// Tuning for the write coalescer.
#[derive(Debug, Clone)]
pub struct CoalescerConfig {
    /// Pending-build count above which `submit` callers are held back.
    pub high_water_mark: usize,
    /// How often a backpressured caller re-checks the queue depth.
    pub backpressure_poll: Duration,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            high_water_mark: 10_000,
            backpressure_poll: Duration::from_millis(25),
        }
    }
}

/// Tuning for the crawl/build pipeline.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Concurrent source lookups across all recursive tasks.
    pub max_concurrent_lookups: usize,
    /// Bounded wait applied to interactive `import` calls. The background
    /// import keeps running after a timeout.
    pub wait_timeout: Duration,
    /// Backoff before the single retry of a failed source lookup.
    pub lookup_retry_backoff: Duration,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: 32,
            wait_timeout: Duration::from_secs(60),
            lookup_retry_backoff: Duration::from_millis(250),
        }
    }
}

/// Tuning for the read-side analytics.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Generation depth for inbreeding and completeness computations.
    pub generations: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self { generations: 3 }
    }
}
