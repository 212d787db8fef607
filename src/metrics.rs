//! Prometheus counters and gauges for the workspace service, labeled by
//! JSON-RPC method. Compiled out entirely when the `prometheus` feature is
//! disabled, in which case every function below is a no-op.

#[cfg(feature = "prometheus")]
mod imp {
    use lazy_static::lazy_static;
    use prometheus::{opts, register_int_counter_vec, register_int_gauge, IntCounterVec, IntGauge};

    lazy_static! {
        static ref WS_METHOD_TOTAL: IntCounterVec =
            register_int_counter_vec!("ws_method_total", "Total number of JSON-RPC method invocations.", &["method"]).unwrap();
        static ref WS_METHOD_ERROR_TOTAL: IntCounterVec = register_int_counter_vec!(
            "ws_method_error_total",
            "Total number of JSON-RPC method invocations that errored.",
            &["method"]
        )
        .unwrap();
        static ref WS_RECONCILE_TICKS_TOTAL: IntCounterVec =
            register_int_counter_vec!("ws_reconcile_ticks_total", "Total number of pending-upload reconciler ticks.", &["outcome"]).unwrap();
        static ref WS_PENDING_UPLOADS: IntGauge =
            register_int_gauge!(opts!("ws_pending_uploads", "Current number of pending uploads awaiting a checksum.")).unwrap();
        static ref WS_LANE_QUEUE_DEPTH: IntCounterVec =
            register_int_counter_vec!("ws_lane_posts_total", "Total number of units of work posted to a lane.", &["lane"]).unwrap();
    }

    pub fn add_method_metric(method: &str) {
        WS_METHOD_TOTAL.with_label_values(&[method]).inc();
    }

    pub fn add_method_error_metric(method: &str) {
        WS_METHOD_ERROR_TOTAL.with_label_values(&[method]).inc();
    }

    pub fn add_reconcile_tick_metric(found_updates: bool) {
        let outcome = if found_updates { "updated" } else { "idle" };
        WS_RECONCILE_TICKS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn set_pending_uploads_metric(count: i64) {
        WS_PENDING_UPLOADS.set(count);
    }

    pub fn add_lane_post_metric(lane: &str) {
        WS_LANE_QUEUE_DEPTH.with_label_values(&[lane]).inc();
    }
}

#[cfg(not(feature = "prometheus"))]
mod imp {
    pub fn add_method_metric(_method: &str) {}
    pub fn add_method_error_metric(_method: &str) {}
    pub fn add_reconcile_tick_metric(_found_updates: bool) {}
    pub fn set_pending_uploads_metric(_count: i64) {}
    pub fn add_lane_post_metric(_lane: &str) {}
}

/// Records an invocation of `method`.
pub fn add_method_metric(method: &str) {
    imp::add_method_metric(method);
}

/// Records that invoking `method` ended in an envelope-level error.
pub fn add_method_error_metric(method: &str) {
    imp::add_method_error_metric(method);
}

/// Records one reconciler tick, labeled by whether it found anything to reconcile.
pub fn add_reconcile_tick_metric(found_updates: bool) {
    imp::add_reconcile_tick_metric(found_updates);
}

/// Sets the current pending-upload gauge to `count`.
pub fn set_pending_uploads_metric(count: i64) {
    imp::set_pending_uploads_metric(count);
}

/// Records a unit of work posted to `lane` (`"general"`, `"serialization"`, or `"blob"`).
pub fn add_lane_post_metric(lane: &str) {
    imp::add_lane_post_metric(lane);
}
