//! Prometheus metrics for the field node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`] covering command dispatch
//! and bootstrap progress. [`NodeMetrics::render`] encodes it in the
//! Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::NodeError;

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Requests answered by a command handler.
    pub commands_dispatched: IntCounter,
    /// Unknown-command responses sent.
    pub unknown_commands: IntCounter,
    /// Commands dropped because their signature did not verify.
    pub authorization_rejections: IntCounter,
    /// Stored certificates served to requesters.
    pub certificates_served: IntCounter,
    pub certificate_requests_sent: IntCounter,
    pub capability_announcements_sent: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Bootstrap state code: 0 unregistered, 1 certificate pending,
    /// 2 capabilities pending, 3 ready, -1 failed.
    pub bootstrap_state: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent in a command handler, in milliseconds.
    pub handler_time_ms: Histogram,
}

impl NodeMetrics {
    pub fn new() -> Result<Self, NodeError> {
        let registry = Registry::new();

        // Counters
        let commands_dispatched = register_int_counter_with_registry!(
            Opts::new(
                "fieldnode_commands_dispatched_total",
                "Requests answered by a command handler"
            ),
            registry
        )?;

        let unknown_commands = register_int_counter_with_registry!(
            Opts::new(
                "fieldnode_unknown_commands_total",
                "Unknown-command responses sent"
            ),
            registry
        )?;

        let authorization_rejections = register_int_counter_with_registry!(
            Opts::new(
                "fieldnode_authorization_rejections_total",
                "Commands dropped after failed signature verification"
            ),
            registry
        )?;

        let certificates_served = register_int_counter_with_registry!(
            Opts::new(
                "fieldnode_certificates_served_total",
                "Stored certificates served to requesters"
            ),
            registry
        )?;

        let certificate_requests_sent = register_int_counter_with_registry!(
            Opts::new(
                "fieldnode_certificate_requests_sent_total",
                "Certificate requests sent to the trust root"
            ),
            registry
        )?;

        let capability_announcements_sent = register_int_counter_with_registry!(
            Opts::new(
                "fieldnode_capability_announcements_sent_total",
                "Capability announcements sent to the controller"
            ),
            registry
        )?;

        // Gauges
        let bootstrap_state = register_int_gauge_with_registry!(
            Opts::new("fieldnode_bootstrap_state", "Current bootstrap state code"),
            registry
        )?;

        // Histograms – exponential buckets covering 0.1 ms → ~1.6 s.
        let handler_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "fieldnode_handler_time_ms",
                "Command handler execution time in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(0.1, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            commands_dispatched,
            unknown_commands,
            authorization_rejections,
            certificates_served,
            certificate_requests_sent,
            capability_announcements_sent,
            bootstrap_state,
            handler_time_ms,
        })
    }

    /// Encode every metric in the text exposition format.
    pub fn render(&self) -> Result<String, NodeError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))?)
    }
}
