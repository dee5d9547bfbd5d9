use crate::error::AppError;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Recorder facade for money-movement metrics.
///
/// Cheap to clone; services receive it through their constructors. Without an
/// installed recorder every call is a no-op.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    _private: (),
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_deposit(&self, duration_ms: f64) {
        counter!("bank_deposits_total").increment(1);
        histogram!("bank_unit_of_work_duration_ms", "operation" => "deposit").record(duration_ms);
    }

    pub fn record_withdrawal(&self, duration_ms: f64) {
        counter!("bank_withdrawals_total").increment(1);
        histogram!("bank_unit_of_work_duration_ms", "operation" => "withdraw").record(duration_ms);
    }

    pub fn record_transfer(&self, duration_ms: f64) {
        counter!("bank_transfers_total").increment(1);
        histogram!("bank_unit_of_work_duration_ms", "operation" => "transfer").record(duration_ms);
    }

    pub fn record_account_created(&self) {
        counter!("bank_accounts_created_total").increment(1);
    }

    /// Counts a failed operation by error kind; conflicts are also counted separately.
    pub fn record_failure(&self, operation: &'static str, error: &AppError) {
        counter!("bank_operation_failures_total", "operation" => operation, "reason" => error.label()).increment(1);
        if error.is_retryable() {
            counter!("bank_lock_conflicts_total", "operation" => operation).increment(1);
        }
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the Prometheus recorder once and returns its handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();

    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

fn describe_metrics() {
    describe_counter!("bank_deposits_total", Unit::Count, "Total number of committed deposits");
    describe_counter!("bank_withdrawals_total", Unit::Count, "Total number of committed withdrawals");
    describe_counter!("bank_transfers_total", Unit::Count, "Total number of committed transfers");
    describe_counter!("bank_accounts_created_total", Unit::Count, "Total number of accounts created");
    describe_counter!("bank_operation_failures_total", Unit::Count, "Failed operations by reason");
    describe_counter!("bank_lock_conflicts_total", Unit::Count, "Operations aborted by lock timeouts or deadlocks");
    describe_histogram!("bank_unit_of_work_duration_ms", Unit::Milliseconds, "Unit of work latency in milliseconds");
}
