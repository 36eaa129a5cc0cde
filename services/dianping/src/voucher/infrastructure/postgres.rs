//! PostgreSQL 秒杀券仓储与 Unit of Work
//!
//! 事务感知的仓储共享同一个 `Transaction`，由 Unit of Work 统一提交或回滚。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmdp_adapter_postgres::map_sqlx_error;
use hmdp_common::{ShopId, UserId, VoucherId};
use hmdp_errors::{AppError, AppResult};
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::voucher::domain::{
    OrderRepository, SeckillVoucher, UnitOfWork, UnitOfWorkFactory, VoucherOrder,
    VoucherRepository, VoucherStockRepository,
};

#[derive(sqlx::FromRow)]
struct SeckillVoucherRow {
    voucher_id: i64,
    shop_id: i64,
    title: String,
    pay_value: i64,
    actual_value: i64,
    stock: i32,
    begin_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl From<SeckillVoucherRow> for SeckillVoucher {
    fn from(row: SeckillVoucherRow) -> Self {
        Self {
            voucher_id: VoucherId::new(row.voucher_id),
            shop_id: ShopId::new(row.shop_id),
            title: row.title,
            pay_value: row.pay_value,
            actual_value: row.actual_value,
            stock: row.stock,
            begin_time: row.begin_time,
            end_time: row.end_time,
        }
    }
}

pub struct PostgresVoucherRepository {
    pool: PgPool,
}

impl PostgresVoucherRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoucherRepository for PostgresVoucherRepository {
    async fn find_seckill_voucher(&self, id: VoucherId) -> AppResult<Option<SeckillVoucher>> {
        let row = sqlx::query_as::<_, SeckillVoucherRow>(
            r#"
            SELECT voucher_id, shop_id, title, pay_value, actual_value, stock, begin_time, end_time
            FROM tb_seckill_voucher
            WHERE voucher_id = $1
            "#,
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SeckillVoucher::from))
    }

    async fn save_seckill_voucher(&self, voucher: &SeckillVoucher) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tb_seckill_voucher
                (voucher_id, shop_id, title, pay_value, actual_value, stock, begin_time, end_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (voucher_id) DO UPDATE
            SET shop_id = EXCLUDED.shop_id, title = EXCLUDED.title,
                pay_value = EXCLUDED.pay_value, actual_value = EXCLUDED.actual_value,
                stock = EXCLUDED.stock, begin_time = EXCLUDED.begin_time,
                end_time = EXCLUDED.end_time, updated_at = NOW()
            "#,
        )
        .bind(voucher.voucher_id.value())
        .bind(voucher.shop_id.value())
        .bind(&voucher.title)
        .bind(voucher.pay_value)
        .bind(voucher.actual_value)
        .bind(voucher.stock)
        .bind(voucher.begin_time)
        .bind(voucher.end_time)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

/// 共享事务类型
type SharedTx = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

fn consumed() -> AppError {
    AppError::internal("Transaction consumed")
}

pub struct TxVoucherStockRepository {
    tx: SharedTx,
}

#[async_trait]
impl VoucherStockRepository for TxVoucherStockRepository {
    async fn decrement_stock(&self, id: VoucherId) -> AppResult<bool> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(consumed)?;

        let result = sqlx::query(
            "UPDATE tb_seckill_voucher SET stock = stock - 1, updated_at = NOW() \
             WHERE voucher_id = $1 AND stock > 0",
        )
        .bind(id.value())
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}

pub struct TxOrderRepository {
    tx: SharedTx,
}

#[async_trait]
impl OrderRepository for TxOrderRepository {
    async fn count_by_buyer_and_voucher(&self, buyer: UserId, voucher: VoucherId) -> AppResult<i64> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(consumed)?;

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tb_voucher_order WHERE user_id = $1 AND voucher_id = $2",
        )
        .bind(buyer.value())
        .bind(voucher.value())
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn insert(&self, order: &VoucherOrder) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(consumed)?;

        sqlx::query(
            r#"
            INSERT INTO tb_voucher_order (id, user_id, voucher_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id.value())
        .bind(order.user_id.value())
        .bind(order.voucher_id.value())
        .bind(order.status.code())
        .bind(order.created_at)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

/// PostgreSQL Unit of Work 工厂
pub struct PostgresUnitOfWorkFactory {
    pool: PgPool,
}

impl PostgresUnitOfWorkFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWorkFactory for PostgresUnitOfWorkFactory {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PostgresUnitOfWork::new(tx)))
    }
}

pub struct PostgresUnitOfWork {
    tx: SharedTx,
    order_repo: TxOrderRepository,
    stock_repo: TxVoucherStockRepository,
}

impl PostgresUnitOfWork {
    fn new(tx: Transaction<'static, Postgres>) -> Self {
        let tx = Arc::new(Mutex::new(Some(tx)));
        Self {
            order_repo: TxOrderRepository { tx: tx.clone() },
            stock_repo: TxVoucherStockRepository { tx: tx.clone() },
            tx,
        }
    }

    async fn take(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.tx.lock().await.take().ok_or_else(consumed)
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    fn orders(&self) -> &dyn OrderRepository {
        &self.order_repo
    }

    fn vouchers(&self) -> &dyn VoucherStockRepository {
        &self.stock_repo
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.take().await?.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.take().await?.rollback().await.map_err(map_sqlx_error)
    }
}
