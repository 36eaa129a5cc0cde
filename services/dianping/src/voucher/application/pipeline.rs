//! 秒杀下单流水线
//!
//! ```text
//! submit_purchase ─► 时间窗口检查 ─► 占用队列槽位 ─► 预扣脚本 ─► 入队 ─► 返回订单号
//!                                                                  │
//!                                  worker ◄────────── 有界队列 ◄───┘
//!                                    │
//!                                    └─► 买家锁 ─► Unit of Work（查重 / 扣库存 / 写订单）
//! ```
//!
//! 队列只在内存中，进程崩溃时已接受但未落库的订单会丢失；`stop` 会排空队列。

use chrono::Utc;
use hmdp_cache::CacheClient;
use hmdp_common::{OrderIdGenerator, UserId, VoucherId};
use hmdp_errors::{AppError, AppResult};
use hmdp_ports::{DistributedLock, KeyValueStore};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::outcome::{OrderOutcome, OrderTask, PurchaseOutcome, RejectReason};
use super::publish::load_seckill_voucher;
use super::reservation::{RESERVE_SCRIPT, ReservationResult};
use super::worker::{BuyerLockPolicy, OrderWorker};
use crate::keys;
use crate::metrics;
use crate::voucher::domain::{SaleWindow, UnitOfWorkFactory, VoucherRepository};

/// 流水线配置
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 队列容量，满时新请求被拒绝为 `Throttled`
    pub queue_capacity: usize,
    /// worker 数量
    pub worker_count: usize,
    pub buyer_lock_ttl: Duration,
    pub buyer_lock_attempts: u32,
    pub buyer_lock_backoff: Duration,
    /// 秒杀券缓存 TTL
    pub voucher_cache_ttl: Duration,
    /// 订单号节点标识
    pub node_id: u16,
    /// 结果广播通道容量
    pub outcome_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024 * 1024,
            worker_count: 1,
            buyer_lock_ttl: Duration::from_secs(10),
            buyer_lock_attempts: 3,
            buyer_lock_backoff: Duration::from_millis(50),
            voucher_cache_ttl: Duration::from_secs(30 * 60),
            node_id: 0,
            outcome_buffer: 1024,
        }
    }
}

/// 秒杀下单流水线
pub struct SeckillOrderPipeline {
    store: Arc<dyn KeyValueStore>,
    cache: Arc<CacheClient>,
    vouchers: Arc<dyn VoucherRepository>,
    config: PipelineConfig,
    id_generator: OrderIdGenerator,
    worker: Arc<OrderWorker>,
    sender: RwLock<Option<mpsc::Sender<OrderTask>>>,
    receiver: Arc<Mutex<mpsc::Receiver<OrderTask>>>,
    outcomes: broadcast::Sender<OrderOutcome>,
    workers: TaskTracker,
    started: AtomicBool,
}

impl SeckillOrderPipeline {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        lock: Arc<dyn DistributedLock>,
        uow_factory: Arc<dyn UnitOfWorkFactory>,
        cache: Arc<CacheClient>,
        vouchers: Arc<dyn VoucherRepository>,
        config: PipelineConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (outcomes, _) = broadcast::channel(config.outcome_buffer.max(1));
        let worker = Arc::new(OrderWorker::new(
            lock,
            uow_factory,
            BuyerLockPolicy {
                ttl: config.buyer_lock_ttl,
                attempts: config.buyer_lock_attempts,
                backoff: config.buyer_lock_backoff,
            },
        ));

        Self {
            store,
            cache,
            vouchers,
            id_generator: OrderIdGenerator::new(config.node_id),
            config,
            worker,
            sender: RwLock::new(Some(sender)),
            receiver: Arc::new(Mutex::new(receiver)),
            outcomes,
            workers: TaskTracker::new(),
            started: AtomicBool::new(false),
        }
    }

    /// 订阅 worker 处理结果
    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<OrderOutcome> {
        self.outcomes.subscribe()
    }

    /// 启动 worker，重复调用无效
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Seckill pipeline already started");
            return;
        }

        let worker_count = self.config.worker_count.max(1);
        for index in 0..worker_count {
            let receiver = self.receiver.clone();
            let worker = self.worker.clone();
            let outcomes = self.outcomes.clone();
            self.workers.spawn(async move {
                debug!(worker = index, "Order worker started");
                loop {
                    let task = receiver.lock().await.recv().await;
                    let Some(task) = task else {
                        break;
                    };
                    let outcome = worker.process(task).await;
                    metrics::record_order(outcome.label());
                    // 没有订阅者时发送失败，忽略
                    let _ = outcomes.send(outcome);
                }
                debug!(worker = index, "Order worker stopped");
            });
        }
        self.workers.close();

        info!(
            workers = worker_count,
            queue_capacity = self.config.queue_capacity,
            "Seckill pipeline started"
        );
    }

    /// 停止接收新订单，等待队列中的任务全部处理完
    pub async fn stop(&self) {
        let sender = self.sender.write().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        if self.started.load(Ordering::SeqCst) {
            self.workers.wait().await;
        }
        info!("Seckill pipeline stopped");
    }

    /// 提交购买请求
    ///
    /// 业务拒绝通过 `PurchaseOutcome::Rejected` 返回；存储不可用等错误以
    /// `Err` 返回，调用方可重试。
    pub async fn submit_purchase(
        &self,
        voucher_id: VoucherId,
        buyer_id: UserId,
    ) -> AppResult<PurchaseOutcome> {
        let voucher = load_seckill_voucher(
            &self.cache,
            &self.vouchers,
            voucher_id,
            self.config.voucher_cache_ttl,
        )
        .await?;
        let Some(voucher) = voucher else {
            return Ok(reject(voucher_id, buyer_id, RejectReason::VoucherNotFound));
        };
        match voucher.window_at(Utc::now()) {
            SaleWindow::NotStarted => {
                return Ok(reject(voucher_id, buyer_id, RejectReason::NotStarted));
            }
            SaleWindow::Ended => return Ok(reject(voucher_id, buyer_id, RejectReason::Ended)),
            SaleWindow::Open => {}
        }

        // 先占队列槽位再预扣，队列满时不修改任何 Redis 数据
        let sender = self
            .sender
            .read()
            .clone()
            .ok_or_else(stopped)?;
        let permit = match sender.try_reserve_owned() {
            Ok(permit) => permit,
            Err(TrySendError::Full(_)) => {
                return Ok(reject(voucher_id, buyer_id, RejectReason::Throttled));
            }
            Err(TrySendError::Closed(_)) => return Err(stopped()),
        };

        let stock_key = keys::seckill_stock_key(voucher_id);
        let order_key = keys::seckill_order_key(voucher_id);
        let buyer = buyer_id.to_string();
        let code = self
            .store
            .eval_script(
                &RESERVE_SCRIPT,
                &[stock_key.as_str(), order_key.as_str()],
                &[buyer.as_str()],
            )
            .await?;

        if let Some(reason) = ReservationResult::from_code(code)?.reject_reason() {
            return Ok(reject(voucher_id, buyer_id, reason));
        }

        let order_id = self.id_generator.next_id();
        permit.send(OrderTask {
            order_id,
            buyer_id,
            voucher_id,
        });

        metrics::record_reservation("accepted");
        debug!(
            order_id = %order_id,
            voucher_id = %voucher_id,
            buyer_id = %buyer_id,
            "Seckill reservation accepted"
        );
        Ok(PurchaseOutcome::Accepted { order_id })
    }
}

fn reject(voucher_id: VoucherId, buyer_id: UserId, reason: RejectReason) -> PurchaseOutcome {
    metrics::record_reservation(reason.as_str());
    debug!(
        voucher_id = %voucher_id,
        buyer_id = %buyer_id,
        reason = %reason,
        "Seckill purchase rejected"
    );
    PurchaseOutcome::Rejected { reason }
}

fn stopped() -> AppError {
    AppError::unavailable("Seckill pipeline is not accepting orders")
}
