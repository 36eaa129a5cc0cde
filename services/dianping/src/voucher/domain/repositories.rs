//! 秒杀券仓储接口

use async_trait::async_trait;
use hmdp_common::{UserId, VoucherId};
use hmdp_errors::AppResult;

use super::voucher::{SeckillVoucher, VoucherOrder};

/// 秒杀券读写（不参与下单事务）
#[async_trait]
pub trait VoucherRepository: Send + Sync {
    async fn find_seckill_voucher(&self, id: VoucherId) -> AppResult<Option<SeckillVoucher>>;

    /// 新增或覆盖秒杀券
    async fn save_seckill_voucher(&self, voucher: &SeckillVoucher) -> AppResult<()>;
}

/// 事务内的库存操作
#[async_trait]
pub trait VoucherStockRepository: Send + Sync {
    /// `stock > 0` 时扣减一件，返回是否扣减成功
    async fn decrement_stock(&self, id: VoucherId) -> AppResult<bool>;
}

/// 事务内的订单操作
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn count_by_buyer_and_voucher(&self, buyer: UserId, voucher: VoucherId) -> AppResult<i64>;

    /// 违反 (user_id, voucher_id) 唯一约束时返回 `AppError::Conflict`
    async fn insert(&self, order: &VoucherOrder) -> AppResult<()>;
}
