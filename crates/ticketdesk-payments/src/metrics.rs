//! Payment pipeline metrics.
//!
//! Prometheus-compatible metrics for the checkout and fulfillment pipeline.
//!
//! # Metrics
//!
//! - `ticketdesk_webhooks_processed_total` - Webhooks by event type and outcome
//! - `ticketdesk_tickets_issued_total` - Tickets issued upstream, by path
//! - `ticketdesk_pending_orders_total` - Pending-order transitions
//! - `ticketdesk_operation_duration_seconds` - Pipeline operation latencies
//!
//! Nothing is exported unless a recorder such as
//! `metrics-exporter-prometheus` is installed.

use std::time::Instant;

use metrics::{counter, histogram};

/// Metric name for processed webhooks.
pub const WEBHOOKS_PROCESSED_TOTAL: &str = "ticketdesk_webhooks_processed_total";

/// Metric name for issued tickets.
pub const TICKETS_ISSUED_TOTAL: &str = "ticketdesk_tickets_issued_total";

/// Metric name for pending-order transitions.
pub const PENDING_ORDERS_TOTAL: &str = "ticketdesk_pending_orders_total";

/// Metric name for operation durations.
pub const OPERATION_DURATION_SECONDS: &str = "ticketdesk_operation_duration_seconds";

/// Pipeline operations for metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateCheckout,
    FreeOrder,
    Webhook,
    RetryPending,
}

impl Operation {
    /// Label value
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateCheckout => "create_checkout",
            Self::FreeOrder => "free_order",
            Self::Webhook => "webhook",
            Self::RetryPending => "retry_pending",
        }
    }
}

/// Outcome labels for webhooks and operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Fulfilled,
    Pending,
    Duplicate,
    Ignored,
    Error,
}

impl Outcome {
    /// Label value
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fulfilled => "fulfilled",
            Self::Pending => "pending",
            Self::Duplicate => "duplicate",
            Self::Ignored => "ignored",
            Self::Error => "error",
        }
    }
}

/// Record a handled webhook.
pub fn record_webhook(event_type: &str, outcome: Outcome) {
    counter!(
        WEBHOOKS_PROCESSED_TOTAL,
        "event_type" => event_type.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record tickets issued upstream.
pub fn record_issued(operation: Operation, count: u32) {
    counter!(TICKETS_ISSUED_TOTAL, "operation" => operation.as_str()).increment(u64::from(count));
}

/// Record a pending-order transition ("created", "updated", "resolved").
pub fn record_pending(transition: &'static str) {
    counter!(PENDING_ORDERS_TOTAL, "transition" => transition).increment(1);
}

/// Records an operation's duration when dropped.
#[must_use]
pub struct OperationTimer {
    operation: Operation,
    start: Instant,
}

impl OperationTimer {
    /// Start timing
    pub fn start(operation: Operation) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        histogram!(OPERATION_DURATION_SECONDS, "operation" => self.operation.as_str())
            .record(self.start.elapsed().as_secs_f64());
    }
}

/// Describe all metrics for registration with a recorder.
pub fn describe_metrics() {
    use metrics::{describe_counter, describe_histogram, Unit};

    describe_counter!(
        WEBHOOKS_PROCESSED_TOTAL,
        Unit::Count,
        "Stripe webhooks handled, by event type and outcome"
    );
    describe_counter!(
        TICKETS_ISSUED_TOTAL,
        Unit::Count,
        "Tickets issued on the ticketing provider"
    );
    describe_counter!(
        PENDING_ORDERS_TOTAL,
        Unit::Count,
        "Pending order transitions"
    );
    describe_histogram!(
        OPERATION_DURATION_SECONDS,
        Unit::Seconds,
        "Duration of payment pipeline operations in seconds"
    );
}
