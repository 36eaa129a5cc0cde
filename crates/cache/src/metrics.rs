//! 缓存指标

use crate::config::CacheStrategy;
use metrics::counter;

pub(crate) fn record_request(strategy: CacheStrategy, result: &'static str) {
    counter!(
        "cache_requests_total",
        "strategy" => strategy.as_str(),
        "result" => result
    )
    .increment(1);
}

pub(crate) fn record_stale_served() {
    counter!("cache_stale_served_total").increment(1);
}

pub(crate) fn record_rebuild_failure() {
    counter!("cache_rebuild_failures_total").increment(1);
}
