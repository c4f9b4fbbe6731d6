use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

// ============================================================================
// Metrics Module - Prometheus metrics for the order engine
// ============================================================================
//
// Provides metrics for:
// - Checkout outcomes and latency
// - Units sold and units returned to stock
// - Order and payment status transitions
//
// The embedding front end serves `encode_text()` wherever it exposes
// metrics; this crate does not run an HTTP listener.
// ============================================================================

pub struct ShopMetrics {
    registry: Registry,

    // Checkout Metrics
    pub checkouts_total: IntCounterVec,
    pub checkout_duration: Histogram,

    // Inventory Metrics
    pub units_sold: IntCounter,
    pub stock_restored: IntCounter,

    // Lifecycle Metrics
    pub order_transitions: IntCounterVec,
    pub payment_transitions: IntCounterVec,
}

impl ShopMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        // Checkout Metrics
        let checkouts_total = IntCounterVec::new(
            Opts::new("shop_checkouts_total", "Checkout attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(checkouts_total.clone()))?;

        let checkout_duration = Histogram::with_opts(
            HistogramOpts::new("shop_checkout_duration_seconds", "Checkout duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(checkout_duration.clone()))?;

        // Inventory Metrics
        let units_sold = IntCounter::new("shop_units_sold_total", "Units taken from stock by checkout")?;
        registry.register(Box::new(units_sold.clone()))?;

        let stock_restored = IntCounter::new(
            "shop_stock_restored_total",
            "Units returned to stock by cancellation",
        )?;
        registry.register(Box::new(stock_restored.clone()))?;

        // Lifecycle Metrics
        let order_transitions = IntCounterVec::new(
            Opts::new("shop_order_transitions_total", "Order status transitions"),
            &["from_status", "to_status"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let payment_transitions = IntCounterVec::new(
            Opts::new("shop_payment_transitions_total", "Payment status transitions"),
            &["from_status", "to_status"],
        )?;
        registry.register(Box::new(payment_transitions.clone()))?;

        Ok(Self {
            registry,
            checkouts_total,
            checkout_duration,
            units_sold,
            stock_restored,
            order_transitions,
            payment_transitions,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition format of everything registered.
    pub fn encode_text(&self) -> prometheus::Result<String> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }

    /// `outcome` is "success" or the rejection reason.
    pub fn record_checkout(&self, outcome: &str, duration_secs: f64) {
        self.checkouts_total.with_label_values(&[outcome]).inc();
        self.checkout_duration.observe(duration_secs);
    }

    pub fn record_units_sold(&self, units: u64) {
        self.units_sold.inc_by(units);
    }

    pub fn record_stock_restored(&self, units: u64) {
        self.stock_restored.inc_by(units);
    }

    pub fn record_order_transition(&self, from: &str, to: &str) {
        self.order_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_payment_transition(&self, from: &str, to: &str) {
        self.payment_transitions.with_label_values(&[from, to]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = ShopMetrics::new().unwrap();
        metrics.record_checkout("success", 0.01);
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_record_checkout_outcomes() {
        let metrics = ShopMetrics::new().unwrap();
        metrics.record_checkout("success", 0.02);
        metrics.record_checkout("out_of_stock", 0.01);
        metrics.record_checkout("success", 0.03);

        let gathered = metrics.registry.gather();
        let checkouts = gathered.iter().find(|m| m.name() == "shop_checkouts_total").unwrap();
        assert_eq!(checkouts.metric.len(), 2); // Two different outcome labels

        let duration = gathered
            .iter()
            .find(|m| m.name() == "shop_checkout_duration_seconds")
            .unwrap();
        assert_eq!(duration.metric[0].histogram.sample_count, Some(3));
    }

    #[test]
    fn test_record_inventory() {
        let metrics = ShopMetrics::new().unwrap();
        metrics.record_units_sold(3);
        metrics.record_units_sold(2);
        metrics.record_stock_restored(4);

        let gathered = metrics.registry.gather();
        let sold = gathered.iter().find(|m| m.name() == "shop_units_sold_total").unwrap();
        assert_eq!(sold.metric[0].counter.value, Some(5.0));
        let restored = gathered.iter().find(|m| m.name() == "shop_stock_restored_total").unwrap();
        assert_eq!(restored.metric[0].counter.value, Some(4.0));
    }

    #[test]
    fn test_encode_text() {
        let metrics = ShopMetrics::new().unwrap();
        metrics.record_order_transition("pending", "confirmed");
        metrics.record_payment_transition("pending", "paid");

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("shop_order_transitions_total{from_status=\"pending\",to_status=\"confirmed\"} 1"));
        assert!(text.contains("shop_payment_transitions_total"));
    }
}
