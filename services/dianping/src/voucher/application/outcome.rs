//! 下单结果

use hmdp_common::{OrderId, UserId, VoucherId};
use serde::Serialize;
use std::fmt;

/// 下单被拒绝的原因（业务结果，不是错误）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// 库存不足
    SoldOut,
    /// 该买家已购买过
    Duplicate,
    /// 订单队列已满
    Throttled,
    /// 秒杀尚未开始
    NotStarted,
    /// 秒杀已经结束
    Ended,
    /// 秒杀券不存在
    VoucherNotFound,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SoldOut => "sold_out",
            Self::Duplicate => "duplicate",
            Self::Throttled => "throttled",
            Self::NotStarted => "not_started",
            Self::Ended => "ended",
            Self::VoucherNotFound => "voucher_not_found",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `submit_purchase` 的返回值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PurchaseOutcome {
    /// 已预扣库存并进入队列，订单号提前返回
    Accepted { order_id: OrderId },
    Rejected { reason: RejectReason },
}

impl PurchaseOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            Self::Accepted { order_id } => Some(*order_id),
            Self::Rejected { .. } => None,
        }
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected { reason } => Some(*reason),
        }
    }
}

/// 队列中的下单任务，只存在于内存
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTask {
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub voucher_id: VoucherId,
}

/// worker 处理一个任务后的结果，通过广播通道发布
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    /// 订单已落库
    Persisted(OrderTask),
    /// 数据库中已有该买家的订单，放弃
    DuplicateAbandoned(OrderTask),
    /// Redis 预扣成功但数据库库存不足，两边计数已不一致
    StockDiverged(OrderTask),
    /// 未能获取买家锁
    LockUnavailable(OrderTask),
    /// 落库失败，不自动重试
    Failed { task: OrderTask, error: String },
}

impl OrderOutcome {
    pub fn task(&self) -> &OrderTask {
        match self {
            Self::Persisted(task)
            | Self::DuplicateAbandoned(task)
            | Self::StockDiverged(task)
            | Self::LockUnavailable(task)
            | Self::Failed { task, .. } => task,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Persisted(_) => "persisted",
            Self::DuplicateAbandoned(_) => "duplicate_abandoned",
            Self::StockDiverged(_) => "stock_diverged",
            Self::LockUnavailable(_) => "lock_unavailable",
            Self::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_outcome_wire_format() {
        let accepted = PurchaseOutcome::Accepted {
            order_id: OrderId::new(42),
        };
        assert_eq!(
            serde_json::to_value(accepted).unwrap(),
            serde_json::json!({ "status": "accepted", "order_id": 42 })
        );

        let rejected = PurchaseOutcome::Rejected {
            reason: RejectReason::SoldOut,
        };
        assert_eq!(
            serde_json::to_value(rejected).unwrap(),
            serde_json::json!({ "status": "rejected", "reason": "SOLD_OUT" })
        );
        assert_eq!(rejected.reject_reason(), Some(RejectReason::SoldOut));
        assert_eq!(rejected.order_id(), None);
    }
}
