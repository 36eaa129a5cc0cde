//! 秒杀下单流水线端到端测试（进程内存储）

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use dianping::voucher::infrastructure::InMemoryVoucherStore;
use dianping::voucher::{
    OrderOutcome, PipelineConfig, PurchaseOutcome, RejectReason, SeckillOrderPipeline,
    SeckillVoucher, UnitOfWorkFactory, VoucherOrder, VoucherService,
};
use hmdp_adapter_memory::InMemoryKeyValueStore;
use hmdp_cache::{CacheClient, CacheConfig};
use hmdp_common::{OrderId, ShopId, UserId, VoucherId};
use hmdp_errors::{AppError, AppResult};
use hmdp_lock::StoreDistributedLock;
use hmdp_ports::{DistributedLock, KeyValueStore, LockLease};
use mockall::mock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const VOUCHER: VoucherId = VoucherId(1);

struct Harness {
    kv: Arc<InMemoryKeyValueStore>,
    db: InMemoryVoucherStore,
    vouchers: VoucherService,
    pipeline: Arc<SeckillOrderPipeline>,
}

fn harness(config: PipelineConfig) -> Harness {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let lock = Arc::new(StoreDistributedLock::new(kv.clone()));
    harness_with_lock(kv, lock, config)
}

fn harness_with_lock(
    kv: Arc<InMemoryKeyValueStore>,
    pipeline_lock: Arc<dyn DistributedLock>,
    config: PipelineConfig,
) -> Harness {
    let db = InMemoryVoucherStore::new();
    let cache_lock = Arc::new(StoreDistributedLock::new(kv.clone()));
    let cache = Arc::new(CacheClient::new(kv.clone(), cache_lock, CacheConfig::default()));
    let vouchers = VoucherService::new(
        Arc::new(db.clone()),
        kv.clone(),
        cache.clone(),
        config.voucher_cache_ttl,
    );
    let pipeline = Arc::new(SeckillOrderPipeline::new(
        kv.clone(),
        pipeline_lock,
        Arc::new(db.clone()),
        cache,
        Arc::new(db.clone()),
        config,
    ));
    Harness {
        kv,
        db,
        vouchers,
        pipeline,
    }
}

fn open_voucher(stock: i32) -> SeckillVoucher {
    let now = Utc::now();
    SeckillVoucher {
        voucher_id: VOUCHER,
        shop_id: ShopId::new(1),
        title: "50 off 100".to_string(),
        pay_value: 5_000,
        actual_value: 10_000,
        stock,
        begin_time: now - ChronoDuration::hours(1),
        end_time: now + ChronoDuration::hours(1),
    }
}

async fn stock_counter(kv: &InMemoryKeyValueStore) -> Option<String> {
    kv.get("seckill:stock:1").await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_buyers_never_oversell() {
    let h = harness(PipelineConfig::default());
    h.vouchers.publish_seckill_voucher(&open_voucher(3)).await.unwrap();
    h.pipeline.start();

    let handles: Vec<_> = (1..=100)
        .map(|buyer| {
            let pipeline = h.pipeline.clone();
            tokio::spawn(async move { pipeline.submit_purchase(VOUCHER, UserId::new(buyer)).await })
        })
        .collect();

    let mut accepted = HashSet::new();
    let mut sold_out = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            PurchaseOutcome::Accepted { order_id } => {
                assert!(accepted.insert(order_id), "order ids must be unique");
            }
            PurchaseOutcome::Rejected {
                reason: RejectReason::SoldOut,
            } => sold_out += 1,
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
    assert_eq!(accepted.len(), 3);
    assert_eq!(sold_out, 97);

    h.pipeline.stop().await;

    assert_eq!(stock_counter(&h.kv).await.as_deref(), Some("0"));
    assert_eq!(h.kv.set_members("seckill:order:1").len(), 3);
    assert_eq!(h.db.stock_of(VOUCHER).await, Some(0));

    let orders = h.db.orders().await;
    assert_eq!(orders.len(), 3);
    let persisted: HashSet<OrderId> = orders.iter().map(|o| o.id).collect();
    assert_eq!(persisted, accepted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_one_order_per_buyer() {
    let h = harness(PipelineConfig::default());
    h.vouchers.publish_seckill_voucher(&open_voucher(5)).await.unwrap();
    h.pipeline.start();

    let (a, b) = tokio::join!(
        h.pipeline.submit_purchase(VOUCHER, UserId::new(7)),
        h.pipeline.submit_purchase(VOUCHER, UserId::new(7)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    let (accepted, rejected) = if a.is_accepted() { (a, b) } else { (b, a) };

    assert!(accepted.is_accepted());
    assert_eq!(rejected.reject_reason(), Some(RejectReason::Duplicate));
    assert_eq!(stock_counter(&h.kv).await.as_deref(), Some("4"));

    h.pipeline.stop().await;
    let orders = h.db.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].user_id, UserId::new(7));
    assert_eq!(Some(orders[0].id), accepted.order_id());
    assert_eq!(h.db.stock_of(VOUCHER).await, Some(4));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_last_unit_goes_to_exactly_one_buyer() {
    let h = harness(PipelineConfig::default());
    h.vouchers.publish_seckill_voucher(&open_voucher(1)).await.unwrap();
    h.pipeline.start();

    let (a, b) = tokio::join!(
        h.pipeline.submit_purchase(VOUCHER, UserId::new(1)),
        h.pipeline.submit_purchase(VOUCHER, UserId::new(2)),
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| o.is_accepted()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|o| o.reject_reason() == Some(RejectReason::SoldOut))
    );
    assert_eq!(stock_counter(&h.kv).await.as_deref(), Some("0"));

    h.pipeline.stop().await;
    assert_eq!(h.db.orders().await.len(), 1);
}

#[tokio::test]
async fn test_full_queue_throttles_without_touching_counters() {
    let h = harness(PipelineConfig {
        queue_capacity: 1,
        ..PipelineConfig::default()
    });
    h.vouchers.publish_seckill_voucher(&open_voucher(5)).await.unwrap();

    // worker 未启动，第一个任务占满队列
    let first = h.pipeline.submit_purchase(VOUCHER, UserId::new(1)).await.unwrap();
    assert!(first.is_accepted());

    let second = h.pipeline.submit_purchase(VOUCHER, UserId::new(2)).await.unwrap();
    assert_eq!(second.reject_reason(), Some(RejectReason::Throttled));
    assert_eq!(stock_counter(&h.kv).await.as_deref(), Some("4"));
    assert_eq!(h.kv.set_members("seckill:order:1"), vec!["1"]);

    // stop 排空队列中已接受的任务
    h.pipeline.start();
    h.pipeline.stop().await;
    let orders = h.db.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].user_id, UserId::new(1));
}

#[tokio::test]
async fn test_durable_stock_divergence_rolls_back() {
    let h = harness(PipelineConfig::default());
    h.vouchers.publish_seckill_voucher(&open_voucher(2)).await.unwrap();
    h.db.set_stock(VOUCHER, 0).await;

    let mut outcomes = h.pipeline.subscribe_outcomes();
    h.pipeline.start();

    let submitted = h.pipeline.submit_purchase(VOUCHER, UserId::new(9)).await.unwrap();
    assert!(submitted.is_accepted());

    let outcome = outcomes.recv().await.unwrap();
    assert!(matches!(outcome, OrderOutcome::StockDiverged(task) if task.buyer_id == UserId::new(9)));
    assert_eq!(outcome.label(), "stock_diverged");

    h.pipeline.stop().await;
    assert!(h.db.orders().await.is_empty());
    assert_eq!(h.db.stock_of(VOUCHER).await, Some(0));
    // 预扣不回补
    assert_eq!(stock_counter(&h.kv).await.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_existing_durable_order_is_abandoned() {
    let h = harness(PipelineConfig::default());
    h.vouchers.publish_seckill_voucher(&open_voucher(3)).await.unwrap();

    // 数据库已有订单，但 Redis 中的买家集合已丢失
    let uow = h.db.begin().await.unwrap();
    uow.orders()
        .insert(&VoucherOrder::new(OrderId::new(1), UserId::new(5), VOUCHER))
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let mut outcomes = h.pipeline.subscribe_outcomes();
    h.pipeline.start();
    assert!(
        h.pipeline
            .submit_purchase(VOUCHER, UserId::new(5))
            .await
            .unwrap()
            .is_accepted()
    );

    let outcome = outcomes.recv().await.unwrap();
    assert!(matches!(outcome, OrderOutcome::DuplicateAbandoned(_)));

    h.pipeline.stop().await;
    assert_eq!(h.db.orders().await.len(), 1);
    assert_eq!(h.db.stock_of(VOUCHER).await, Some(3));
}

#[tokio::test]
async fn test_sale_window_and_unknown_voucher() {
    let h = harness(PipelineConfig::default());
    let now = Utc::now();

    let unknown = h.pipeline.submit_purchase(VOUCHER, UserId::new(1)).await.unwrap();
    assert_eq!(unknown.reject_reason(), Some(RejectReason::VoucherNotFound));

    let upcoming = SeckillVoucher {
        voucher_id: VoucherId::new(2),
        begin_time: now + ChronoDuration::hours(1),
        end_time: now + ChronoDuration::hours(2),
        ..open_voucher(10)
    };
    let finished = SeckillVoucher {
        voucher_id: VoucherId::new(3),
        begin_time: now - ChronoDuration::hours(2),
        end_time: now - ChronoDuration::hours(1),
        ..open_voucher(10)
    };
    h.vouchers.publish_seckill_voucher(&upcoming).await.unwrap();
    h.vouchers.publish_seckill_voucher(&finished).await.unwrap();

    let not_started = h
        .pipeline
        .submit_purchase(VoucherId::new(2), UserId::new(1))
        .await
        .unwrap();
    assert_eq!(not_started.reject_reason(), Some(RejectReason::NotStarted));

    let ended = h
        .pipeline
        .submit_purchase(VoucherId::new(3), UserId::new(1))
        .await
        .unwrap();
    assert_eq!(ended.reject_reason(), Some(RejectReason::Ended));

    assert_eq!(h.kv.get("seckill:stock:2").await.unwrap().as_deref(), Some("10"));
    assert_eq!(h.kv.get("seckill:stock:3").await.unwrap().as_deref(), Some("10"));
}

#[tokio::test]
async fn test_store_outage_is_retryable_error() {
    let h = harness(PipelineConfig::default());
    h.vouchers.publish_seckill_voucher(&open_voucher(3)).await.unwrap();
    h.kv.set_offline(true);

    let err = h
        .pipeline
        .submit_purchase(VOUCHER, UserId::new(1))
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    h.kv.set_offline(false);
    assert_eq!(stock_counter(&h.kv).await.as_deref(), Some("3"));
}

#[tokio::test]
async fn test_stopped_pipeline_rejects_with_unavailable() {
    let h = harness(PipelineConfig::default());
    h.vouchers.publish_seckill_voucher(&open_voucher(3)).await.unwrap();
    h.pipeline.start();
    h.pipeline.stop().await;

    let err = h
        .pipeline
        .submit_purchase(VOUCHER, UserId::new(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));
    assert_eq!(stock_counter(&h.kv).await.as_deref(), Some("3"));
}

mock! {
    pub Lock {}

    #[async_trait]
    impl DistributedLock for Lock {
        async fn try_acquire(&self, name: &str, ttl: Duration) -> AppResult<Option<LockLease>>;
        async fn release(&self, lease: &LockLease) -> AppResult<bool>;
    }
}

#[tokio::test]
async fn test_busy_buyer_lock_abandons_task() {
    let mut lock = MockLock::new();
    lock.expect_try_acquire()
        .withf(|name, _| name == "order:4")
        .times(3)
        .returning(|_, _| Ok(None));
    lock.expect_release().never();

    let kv = Arc::new(InMemoryKeyValueStore::new());
    let h = harness_with_lock(
        kv,
        Arc::new(lock),
        PipelineConfig {
            buyer_lock_attempts: 3,
            buyer_lock_backoff: Duration::from_millis(1),
            ..PipelineConfig::default()
        },
    );
    h.vouchers.publish_seckill_voucher(&open_voucher(3)).await.unwrap();

    let mut outcomes = h.pipeline.subscribe_outcomes();
    h.pipeline.start();
    assert!(
        h.pipeline
            .submit_purchase(VOUCHER, UserId::new(4))
            .await
            .unwrap()
            .is_accepted()
    );

    let outcome = outcomes.recv().await.unwrap();
    assert!(matches!(outcome, OrderOutcome::LockUnavailable(_)));

    h.pipeline.stop().await;
    assert!(h.db.orders().await.is_empty());
    assert_eq!(h.db.stock_of(VOUCHER).await, Some(3));
}
