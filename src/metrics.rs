// Prometheus metrics for the scoring loop.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Targets in the most recently loaded config.
    pub static ref TARGETS_CONFIGURED: IntGauge =
        IntGauge::new("propane_targets_configured", "Targets in the current config").unwrap();

    /// Fetches currently in flight.
    pub static ref POLLS_IN_FLIGHT: IntGauge =
        IntGauge::new("propane_polls_in_flight", "Target fetches currently in flight").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Cycles started.
    pub static ref CYCLES_TOTAL: IntCounter =
        IntCounter::new("propane_cycles_total", "Scoring cycles started").unwrap();

    /// Cycles aborted, by failure kind (config, score_file, persistence, render).
    pub static ref CYCLE_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("propane_cycle_failures_total", "Scoring cycles aborted"),
        &["kind"],
    )
    .unwrap();

    /// Per-target poll outcomes (scored, unreachable, no_claim, not_allowed).
    pub static ref POLLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("propane_polls_total", "Target evaluations by outcome"),
        &["outcome"],
    )
    .unwrap();

    /// Points credited, by target.
    pub static ref POINTS_AWARDED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("propane_points_awarded_total", "Points credited"),
        &["target"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Wall time of one cycle, from config load to scoreboard write.
    pub static ref CYCLE_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("propane_cycle_duration_seconds", "Scoring cycle duration in seconds")
            .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with the custom registry. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(TARGETS_CONFIGURED.clone()),
            Box::new(POLLS_IN_FLIGHT.clone()),
            Box::new(CYCLES_TOTAL.clone()),
            Box::new(CYCLE_FAILURES_TOTAL.clone()),
            Box::new(POLLS_TOTAL.clone()),
            Box::new(POINTS_AWARDED_TOTAL.clone()),
            Box::new(CYCLE_DURATION_SECONDS.clone()),
        ];

        for c in collectors {
            if let Err(e) = REGISTRY.register(c) {
                tracing::warn!("failed to register metric: {e}");
            }
        }
    });
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice_does_not_panic() {
        register_metrics();
        register_metrics();
    }

    #[test]
    fn test_gather_contains_counters() {
        register_metrics();
        CYCLES_TOTAL.inc();
        POLLS_TOTAL.with_label_values(&["scored"]).inc();
        let output = gather_metrics();
        assert!(output.contains("propane_cycles_total"));
        assert!(output.contains("propane_polls_total"));
    }

    #[test]
    fn test_gauge_set() {
        TARGETS_CONFIGURED.set(3);
        assert_eq!(TARGETS_CONFIGURED.get(), 3);
        POLLS_IN_FLIGHT.inc();
        POLLS_IN_FLIGHT.dec();
    }
}
