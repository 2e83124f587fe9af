//! Prometheus metrics for riskctl.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration
//! failure means duplicate metric names, a fatal configuration error
//! that only surfaces during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge_vec, CounterVec, Encoder,
    HistogramVec, IntGaugeVec, TextEncoder,
};

/// Job instances started.
pub static JOB_RUNS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "riskctl_job_runs_total",
        "Job instances started",
        &["job"]
    )
    .unwrap()
});

/// Job instances by outcome (completed/skipped/failed/panicked).
pub static JOB_OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "riskctl_job_outcomes_total",
        "Job instances by outcome",
        &["job", "outcome"]
    )
    .unwrap()
});

/// Triggers dropped because the job was at its instance cap.
pub static TRIGGERS_SKIPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "riskctl_triggers_skipped_total",
        "Triggers skipped because max instances were running",
        &["job"]
    )
    .unwrap()
});

/// Job instances currently running.
pub static JOB_IN_FLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "riskctl_job_in_flight",
        "Job instances currently running",
        &["job"]
    )
    .unwrap()
});

/// Job instance duration in milliseconds.
pub static JOB_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "riskctl_job_duration_ms",
        "Job instance duration in milliseconds",
        &["job"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 15000.0]
    )
    .unwrap()
});

/// Kill-switch activations by tier and result.
pub static KILL_SWITCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "riskctl_kill_switch_total",
        "Kill-switch activation attempts",
        &["tier", "result"]
    )
    .unwrap()
});

/// Protective orders by kind and result.
pub static PROTECTIVE_ORDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "riskctl_protective_orders_total",
        "Protective orders placed or cancelled",
        &["kind", "result"]
    )
    .unwrap()
});

/// Broker call failures by error kind.
pub static BROKER_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "riskctl_broker_errors_total",
        "Broker call failures",
        &["kind"]
    )
    .unwrap()
});

/// Users skipped because another instance of the same job held them.
pub static USER_BUSY_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "riskctl_user_busy_total",
        "Users skipped because they were already being processed",
        &["job"]
    )
    .unwrap()
});

/// Per-user evaluation failures.
pub static USER_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "riskctl_user_failures_total",
        "Per-user evaluation failures",
        &["job"]
    )
    .unwrap()
});

/// Records written to the audit sink.
pub static RECORDS_WRITTEN_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "riskctl_records_written_total",
        "Records written to the audit sink",
        &["kind"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn job_started(job: &str) {
        JOB_RUNS_TOTAL.with_label_values(&[job]).inc();
        JOB_IN_FLIGHT.with_label_values(&[job]).inc();
    }

    /// Record the end of a job instance.
    pub fn job_finished(job: &str, outcome: &str, duration_ms: f64) {
        JOB_IN_FLIGHT.with_label_values(&[job]).dec();
        JOB_OUTCOMES_TOTAL.with_label_values(&[job, outcome]).inc();
        JOB_DURATION_MS.with_label_values(&[job]).observe(duration_ms);
    }

    pub fn trigger_skipped(job: &str) {
        TRIGGERS_SKIPPED_TOTAL.with_label_values(&[job]).inc();
    }

    pub fn kill_switch(tier: &str, success: bool) {
        KILL_SWITCH_TOTAL
            .with_label_values(&[tier, result_label(success)])
            .inc();
    }

    pub fn protective_order(kind: &str, success: bool) {
        PROTECTIVE_ORDERS_TOTAL
            .with_label_values(&[kind, result_label(success)])
            .inc();
    }

    pub fn broker_error(kind: &str) {
        BROKER_ERRORS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn user_busy(job: &str) {
        USER_BUSY_TOTAL.with_label_values(&[job]).inc();
    }

    pub fn user_failed(job: &str) {
        USER_FAILURES_TOTAL.with_label_values(&[job]).inc();
    }

    pub fn record_written(kind: &str) {
        RECORDS_WRITTEN_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            tracing::warn!(?e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

fn result_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
