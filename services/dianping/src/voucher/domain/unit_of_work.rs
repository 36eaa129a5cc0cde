//! Unit of Work
//!
//! 下单落库的事务边界：查重、扣库存、写订单在同一事务中完成。
//!
//! ```ignore
//! let uow = uow_factory.begin().await?;
//! if uow.vouchers().decrement_stock(voucher_id).await? {
//!     uow.orders().insert(&order).await?;
//!     uow.commit().await?;
//! } else {
//!     uow.rollback().await?;
//! }
//! ```

use async_trait::async_trait;
use hmdp_errors::AppResult;

use super::repositories::{OrderRepository, VoucherStockRepository};

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn orders(&self) -> &dyn OrderRepository;

    fn vouchers(&self) -> &dyn VoucherStockRepository;

    /// 提交事务
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// 回滚事务，撤销所有未提交的更改
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    /// 开始新的事务
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;
}
