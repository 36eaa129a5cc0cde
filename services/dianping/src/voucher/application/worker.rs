//! 订单落库 worker

use hmdp_errors::{AppError, AppResult};
use hmdp_lock::run_locked;
use hmdp_ports::{DistributedLock, LockLease};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::outcome::{OrderOutcome, OrderTask};
use crate::keys;
use crate::voucher::domain::{UnitOfWork, UnitOfWorkFactory, VoucherOrder};

/// 事务内的处理结论
enum Decision {
    Insert,
    Duplicate,
    Diverged,
}

/// 买家锁参数
#[derive(Debug, Clone)]
pub(crate) struct BuyerLockPolicy {
    pub ttl: Duration,
    pub attempts: u32,
    pub backoff: Duration,
}

pub(crate) struct OrderWorker {
    lock: Arc<dyn DistributedLock>,
    uow_factory: Arc<dyn UnitOfWorkFactory>,
    policy: BuyerLockPolicy,
}

impl OrderWorker {
    pub fn new(
        lock: Arc<dyn DistributedLock>,
        uow_factory: Arc<dyn UnitOfWorkFactory>,
        policy: BuyerLockPolicy,
    ) -> Self {
        Self {
            lock,
            uow_factory,
            policy,
        }
    }

    /// 在买家锁内落库一个任务，错误不向外传播
    pub async fn process(&self, task: OrderTask) -> OrderOutcome {
        let lease = match self.acquire_buyer_lock(&task).await {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                error!(
                    order_id = %task.order_id,
                    buyer_id = %task.buyer_id,
                    "Buyer lock unavailable, order abandoned"
                );
                return OrderOutcome::LockUnavailable(task);
            }
            Err(e) => {
                error!(order_id = %task.order_id, error = %e, "Failed to acquire buyer lock");
                return OrderOutcome::Failed {
                    task,
                    error: e.to_string(),
                };
            }
        };

        run_locked(self.lock.as_ref(), lease, async {
            match self.persist(&task).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        order_id = %task.order_id,
                        buyer_id = %task.buyer_id,
                        voucher_id = %task.voucher_id,
                        error = %e,
                        "Failed to persist seckill order"
                    );
                    OrderOutcome::Failed {
                        task,
                        error: e.to_string(),
                    }
                }
            }
        })
        .await
    }

    async fn acquire_buyer_lock(&self, task: &OrderTask) -> AppResult<Option<LockLease>> {
        let name = keys::buyer_lock_name(task.buyer_id);
        let attempts = self.policy.attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(lease) = self.lock.try_acquire(&name, self.policy.ttl).await? {
                return Ok(Some(lease));
            }
            debug!(lock = %name, attempt, "Buyer lock busy");
            if attempt < attempts {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }
        Ok(None)
    }

    async fn persist(&self, task: &OrderTask) -> AppResult<OrderOutcome> {
        let uow = self.uow_factory.begin().await?;
        let decision = Self::decide(uow.as_ref(), task).await;

        match decision {
            Ok(Decision::Insert) => {
                uow.commit().await?;
                info!(
                    order_id = %task.order_id,
                    buyer_id = %task.buyer_id,
                    voucher_id = %task.voucher_id,
                    "Seckill order persisted"
                );
                Ok(OrderOutcome::Persisted(*task))
            }
            Ok(Decision::Duplicate) => {
                rollback_quietly(uow).await;
                warn!(
                    order_id = %task.order_id,
                    buyer_id = %task.buyer_id,
                    voucher_id = %task.voucher_id,
                    "Buyer already has an order for this voucher, task abandoned"
                );
                Ok(OrderOutcome::DuplicateAbandoned(*task))
            }
            Ok(Decision::Diverged) => {
                rollback_quietly(uow).await;
                crate::metrics::record_divergence();
                error!(
                    order_id = %task.order_id,
                    buyer_id = %task.buyer_id,
                    voucher_id = %task.voucher_id,
                    "Durable stock exhausted after cache reservation, counters diverged"
                );
                Ok(OrderOutcome::StockDiverged(*task))
            }
            Err(e) => {
                rollback_quietly(uow).await;
                Err(e)
            }
        }
    }

    async fn decide(uow: &dyn UnitOfWork, task: &OrderTask) -> AppResult<Decision> {
        let existing = uow
            .orders()
            .count_by_buyer_and_voucher(task.buyer_id, task.voucher_id)
            .await?;
        if existing > 0 {
            return Ok(Decision::Duplicate);
        }

        if !uow.vouchers().decrement_stock(task.voucher_id).await? {
            return Ok(Decision::Diverged);
        }

        let order = VoucherOrder::new(task.order_id, task.buyer_id, task.voucher_id);
        match uow.orders().insert(&order).await {
            Ok(()) => Ok(Decision::Insert),
            // 唯一约束兜底
            Err(AppError::Conflict(_)) => Ok(Decision::Duplicate),
            Err(e) => Err(e),
        }
    }
}

async fn rollback_quietly(uow: Box<dyn UnitOfWork>) {
    if let Err(e) = uow.rollback().await {
        error!(error = %e, "Failed to rollback order transaction");
    }
}
