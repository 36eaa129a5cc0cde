//! 秒杀券与订单

use chrono::{DateTime, Utc};
use hmdp_common::{OrderId, ShopId, UserId, VoucherId};
use serde::{Deserialize, Serialize};

use crate::error::VoucherError;

/// 秒杀券
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeckillVoucher {
    pub voucher_id: VoucherId,
    pub shop_id: ShopId,
    pub title: String,
    /// 支付金额（分）
    pub pay_value: i64,
    /// 抵扣金额（分）
    pub actual_value: i64,
    pub stock: i32,
    pub begin_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// 相对于秒杀时间窗口的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleWindow {
    NotStarted,
    Open,
    Ended,
}

impl SeckillVoucher {
    pub fn validate(&self) -> Result<(), VoucherError> {
        if self.title.trim().is_empty() {
            return Err(VoucherError::MissingTitle);
        }
        if self.stock < 0 {
            return Err(VoucherError::NegativeStock);
        }
        if self.begin_time >= self.end_time {
            return Err(VoucherError::InvalidTimeWindow);
        }
        Ok(())
    }

    pub fn window_at(&self, now: DateTime<Utc>) -> SaleWindow {
        if now < self.begin_time {
            SaleWindow::NotStarted
        } else if now > self.end_time {
            SaleWindow::Ended
        } else {
            SaleWindow::Open
        }
    }
}

/// 订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum OrderStatus {
    Unpaid = 1,
    Paid = 2,
    Used = 3,
    Cancelled = 4,
    Refunding = 5,
    Refunded = 6,
}

impl OrderStatus {
    pub fn code(self) -> i16 {
        self as i16
    }
}

/// 秒杀订单，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub voucher_id: VoucherId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl VoucherOrder {
    pub fn new(id: OrderId, user_id: UserId, voucher_id: VoucherId) -> Self {
        Self {
            id,
            user_id,
            voucher_id,
            status: OrderStatus::Unpaid,
            created_at: Utc::now(),
        }
    }
}
