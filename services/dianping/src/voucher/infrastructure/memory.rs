//! 进程内秒杀券仓储（本地运行与测试）
//!
//! 事务通过持有整张表的互斥锁实现串行化，修改先写入副本，提交时整体替换。

use async_trait::async_trait;
use hmdp_common::{UserId, VoucherId};
use hmdp_errors::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::voucher::domain::{
    OrderRepository, SeckillVoucher, UnitOfWork, UnitOfWorkFactory, VoucherOrder,
    VoucherRepository, VoucherStockRepository,
};

#[derive(Debug, Clone, Default)]
struct VoucherTables {
    vouchers: HashMap<VoucherId, SeckillVoucher>,
    orders: Vec<VoucherOrder>,
}

/// 进程内秒杀券存储，同时实现仓储与 Unit of Work 工厂
#[derive(Clone, Default)]
pub struct InMemoryVoucherStore {
    tables: Arc<Mutex<VoucherTables>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryVoucherStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绕过下单流程直接修改库存
    pub async fn set_stock(&self, id: VoucherId, stock: i32) {
        if let Some(voucher) = self.tables.lock().await.vouchers.get_mut(&id) {
            voucher.stock = stock;
        }
    }

    pub async fn stock_of(&self, id: VoucherId) -> Option<i32> {
        self.tables.lock().await.vouchers.get(&id).map(|v| v.stock)
    }

    pub async fn orders(&self) -> Vec<VoucherOrder> {
        self.tables.lock().await.orders.clone()
    }

    /// 模拟数据库不可达
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> AppResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::unavailable("In-memory database is offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl VoucherRepository for InMemoryVoucherStore {
    async fn find_seckill_voucher(&self, id: VoucherId) -> AppResult<Option<SeckillVoucher>> {
        self.check_online()?;
        Ok(self.tables.lock().await.vouchers.get(&id).cloned())
    }

    async fn save_seckill_voucher(&self, voucher: &SeckillVoucher) -> AppResult<()> {
        self.check_online()?;
        self.tables
            .lock()
            .await
            .vouchers
            .insert(voucher.voucher_id, voucher.clone());
        Ok(())
    }
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryVoucherStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        self.check_online()?;
        let guard = self.tables.clone().lock_owned().await;
        let staged = Arc::new(parking_lot::Mutex::new(guard.clone()));
        Ok(Box::new(InMemoryUnitOfWork {
            guard,
            orders: StagedOrders {
                staged: staged.clone(),
            },
            stock: StagedStock {
                staged: staged.clone(),
            },
            staged,
        }))
    }
}

type Staged = Arc<parking_lot::Mutex<VoucherTables>>;

struct StagedOrders {
    staged: Staged,
}

#[async_trait]
impl OrderRepository for StagedOrders {
    async fn count_by_buyer_and_voucher(&self, buyer: UserId, voucher: VoucherId) -> AppResult<i64> {
        let count = self
            .staged
            .lock()
            .orders
            .iter()
            .filter(|o| o.user_id == buyer && o.voucher_id == voucher)
            .count();
        Ok(count as i64)
    }

    async fn insert(&self, order: &VoucherOrder) -> AppResult<()> {
        let mut tables = self.staged.lock();
        let duplicate = tables
            .orders
            .iter()
            .any(|o| o.id == order.id || (o.user_id == order.user_id && o.voucher_id == order.voucher_id));
        if duplicate {
            return Err(AppError::conflict(format!(
                "Order already exists for buyer {} and voucher {}",
                order.user_id, order.voucher_id
            )));
        }
        tables.orders.push(order.clone());
        Ok(())
    }
}

struct StagedStock {
    staged: Staged,
}

#[async_trait]
impl VoucherStockRepository for StagedStock {
    async fn decrement_stock(&self, id: VoucherId) -> AppResult<bool> {
        let mut tables = self.staged.lock();
        match tables.vouchers.get_mut(&id) {
            Some(voucher) if voucher.stock > 0 => {
                voucher.stock -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<VoucherTables>,
    staged: Staged,
    orders: StagedOrders,
    stock: StagedStock,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    fn orders(&self) -> &dyn OrderRepository {
        &self.orders
    }

    fn vouchers(&self) -> &dyn VoucherStockRepository {
        &self.stock
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let Self {
            mut guard, staged, ..
        } = *self;
        *guard = staged.lock().clone();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use hmdp_common::{OrderId, ShopId};

    fn voucher(stock: i32) -> SeckillVoucher {
        SeckillVoucher {
            voucher_id: VoucherId::new(1),
            shop_id: ShopId::new(1),
            title: "voucher".to_string(),
            pay_value: 100,
            actual_value: 200,
            stock,
            begin_time: Utc::now() - Duration::hours(1),
            end_time: Utc::now() + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let store = InMemoryVoucherStore::new();
        store.save_seckill_voucher(&voucher(1)).await.unwrap();

        let uow = store.begin().await.unwrap();
        assert!(uow.vouchers().decrement_stock(VoucherId::new(1)).await.unwrap());
        uow.rollback().await.unwrap();

        assert_eq!(store.stock_of(VoucherId::new(1)).await, Some(1));
    }

    #[tokio::test]
    async fn test_commit_applies_changes() {
        let store = InMemoryVoucherStore::new();
        store.save_seckill_voucher(&voucher(1)).await.unwrap();

        let uow = store.begin().await.unwrap();
        assert!(uow.vouchers().decrement_stock(VoucherId::new(1)).await.unwrap());
        assert!(!uow.vouchers().decrement_stock(VoucherId::new(1)).await.unwrap());
        let order = VoucherOrder::new(OrderId::new(10), UserId::new(7), VoucherId::new(1));
        uow.orders().insert(&order).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(store.stock_of(VoucherId::new(1)).await, Some(0));
        assert_eq!(store.orders().await, vec![order]);
    }

    #[tokio::test]
    async fn test_unique_buyer_per_voucher() {
        let store = InMemoryVoucherStore::new();
        let uow = store.begin().await.unwrap();
        let first = VoucherOrder::new(OrderId::new(1), UserId::new(7), VoucherId::new(1));
        let second = VoucherOrder::new(OrderId::new(2), UserId::new(7), VoucherId::new(1));

        uow.orders().insert(&first).await.unwrap();
        let err = uow.orders().insert(&second).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
