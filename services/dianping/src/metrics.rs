//! 秒杀业务指标

use metrics::counter;

/// 记录一次下单请求的结果（accepted / sold_out / duplicate / throttled ...）
pub fn record_reservation(outcome: &'static str) {
    counter!("seckill_reservations_total", "outcome" => outcome).increment(1);
}

/// 记录队列中订单的落库结果
pub fn record_order(outcome: &'static str) {
    counter!("seckill_orders_total", "outcome" => outcome).increment(1);
}

/// Redis 已预扣但数据库扣减失败
pub fn record_divergence() {
    counter!("seckill_persistence_divergence_total").increment(1);
}
