use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static PAYMENTS_RECORDED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static PAYMENTS_DELETED_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static INVOICES_ISSUED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static CONVERSION_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static WRITE_CONFLICTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }

    let registry = Registry::new();

    let payments_recorded = IntCounterVec::new(
        Opts::new(
            "settlement_payments_recorded_total",
            "Partial payments recorded, by payment method",
        ),
        &["payment_method"],
    )
    .expect("Failed to create settlement_payments_recorded_total metric");

    let payments_deleted = IntCounter::new(
        "settlement_payments_deleted_total",
        "Partial payments deleted from the ledger",
    )
    .expect("Failed to create settlement_payments_deleted_total metric");

    let invoices_issued = IntCounterVec::new(
        Opts::new(
            "settlement_invoices_issued_total",
            "Invoices issued, by company currency",
        ),
        &["currency"],
    )
    .expect("Failed to create settlement_invoices_issued_total metric");

    let conversion_requests = IntCounterVec::new(
        Opts::new(
            "settlement_conversion_requests_total",
            "Exchange gateway calls, by direction and outcome",
        ),
        &["direction", "outcome"],
    )
    .expect("Failed to create settlement_conversion_requests_total metric");

    let write_conflicts = IntCounterVec::new(
        Opts::new(
            "settlement_write_conflicts_total",
            "Optimistic-concurrency conflicts on the payment aggregate",
        ),
        &["operation"],
    )
    .expect("Failed to create settlement_write_conflicts_total metric");

    registry
        .register(Box::new(payments_recorded.clone()))
        .expect("Failed to register settlement_payments_recorded_total");
    registry
        .register(Box::new(payments_deleted.clone()))
        .expect("Failed to register settlement_payments_deleted_total");
    registry
        .register(Box::new(invoices_issued.clone()))
        .expect("Failed to register settlement_invoices_issued_total");
    registry
        .register(Box::new(conversion_requests.clone()))
        .expect("Failed to register settlement_conversion_requests_total");
    registry
        .register(Box::new(write_conflicts.clone()))
        .expect("Failed to register settlement_write_conflicts_total");

    PROMETHEUS_REGISTRY
        .set(registry)
        .expect("Failed to set prometheus registry");
    PAYMENTS_RECORDED_TOTAL
        .set(payments_recorded)
        .expect("Failed to set settlement_payments_recorded_total");
    PAYMENTS_DELETED_TOTAL
        .set(payments_deleted)
        .expect("Failed to set settlement_payments_deleted_total");
    INVOICES_ISSUED_TOTAL
        .set(invoices_issued)
        .expect("Failed to set settlement_invoices_issued_total");
    CONVERSION_REQUESTS_TOTAL
        .set(conversion_requests)
        .expect("Failed to set settlement_conversion_requests_total");
    WRITE_CONFLICTS_TOTAL
        .set(write_conflicts)
        .expect("Failed to set settlement_write_conflicts_total");
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

/// Record a partial payment for metering.
pub fn record_payment(payment_method: &str) {
    if let Some(counter) = PAYMENTS_RECORDED_TOTAL.get() {
        counter.with_label_values(&[payment_method]).inc();
    }
}

/// Record a payment deletion.
pub fn record_payment_deleted() {
    if let Some(counter) = PAYMENTS_DELETED_TOTAL.get() {
        counter.inc();
    }
}

/// Record an issued invoice.
pub fn record_invoice_issued(currency: &str) {
    if let Some(counter) = INVOICES_ISSUED_TOTAL.get() {
        counter.with_label_values(&[currency]).inc();
    }
}

/// Record an exchange gateway call outcome.
pub fn record_conversion(direction: &str, outcome: &str) {
    if let Some(counter) = CONVERSION_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[direction, outcome]).inc();
    }
}

/// Record an optimistic-concurrency conflict.
pub fn record_write_conflict(operation: &str) {
    if let Some(counter) = WRITE_CONFLICTS_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}
