//! 服务组装

use std::sync::Arc;

use hmdp_bootstrap::Infrastructure;
use hmdp_cache::{CacheClient, CacheStrategy};
use hmdp_config::AppConfig;
use hmdp_errors::AppResult;
use hmdp_lock::StoreDistributedLock;
use hmdp_ports::{DistributedLock, KeyValueStore};
use tracing::info;

use crate::config::{self, ShopSettings};
use crate::shop::infrastructure::{PostgresShopRepository, PostgresShopTypeRepository};
use crate::shop::{ShopRepository, ShopService, ShopTypeRepository, ShopTypeService};
use crate::voucher::infrastructure::{PostgresUnitOfWorkFactory, PostgresVoucherRepository};
use crate::voucher::{SeckillOrderPipeline, UnitOfWorkFactory, VoucherRepository, VoucherService};

/// 服务依赖的仓储
pub struct Repositories {
    pub shops: Arc<dyn ShopRepository>,
    pub shop_types: Arc<dyn ShopTypeRepository>,
    pub vouchers: Arc<dyn VoucherRepository>,
    pub unit_of_work: Arc<dyn UnitOfWorkFactory>,
}

/// 点评服务
pub struct DianpingApp {
    pub shops: ShopService,
    pub shop_types: ShopTypeService,
    pub vouchers: VoucherService,
    pub pipeline: SeckillOrderPipeline,
    cache: Arc<CacheClient>,
    shop_settings: ShopSettings,
}

impl DianpingApp {
    /// 使用 PostgreSQL 与 Redis 组装
    pub fn from_infrastructure(infra: &Infrastructure) -> AppResult<Self> {
        let pool = infra.postgres_pool();
        let repositories = Repositories {
            shops: Arc::new(PostgresShopRepository::new(pool.clone())),
            shop_types: Arc::new(PostgresShopTypeRepository::new(pool.clone())),
            vouchers: Arc::new(PostgresVoucherRepository::new(pool.clone())),
            unit_of_work: Arc::new(PostgresUnitOfWorkFactory::new(pool)),
        };
        Self::assemble(infra.config(), repositories, infra.key_value_store())
    }

    /// 用任意仓储与键值存储组装
    pub fn assemble(
        app_config: &AppConfig,
        repositories: Repositories,
        store: Arc<dyn KeyValueStore>,
    ) -> AppResult<Self> {
        let cache_config = config::cache_config(&app_config.cache)?;
        let shop_settings = config::shop_settings(&app_config.cache)?;
        let pipeline_config = config::pipeline_config(&app_config.seckill)?;

        let lock: Arc<dyn DistributedLock> = Arc::new(StoreDistributedLock::new(store.clone()));
        let cache = Arc::new(CacheClient::new(store.clone(), lock.clone(), cache_config));

        let shops = ShopService::new(
            repositories.shops,
            cache.clone(),
            shop_settings.strategy,
            shop_settings.ttl,
        )
        .with_logical_ttl(shop_settings.logical_ttl);
        let shop_types =
            ShopTypeService::new(repositories.shop_types, cache.clone(), shop_settings.ttl);
        let vouchers = VoucherService::new(
            repositories.vouchers.clone(),
            store.clone(),
            cache.clone(),
            pipeline_config.voucher_cache_ttl,
        );
        let pipeline = SeckillOrderPipeline::new(
            store,
            lock,
            repositories.unit_of_work,
            cache.clone(),
            repositories.vouchers,
            pipeline_config,
        );

        info!(shop_strategy = %shop_settings.strategy, "Dianping service assembled");
        Ok(Self {
            shops,
            shop_types,
            vouchers,
            pipeline,
            cache,
            shop_settings,
        })
    }

    /// 预热热点商铺并启动下单 worker
    ///
    /// 只有逻辑过期策略读取预热写入的条目格式，其他策略跳过预热。
    pub async fn start(&self) -> AppResult<()> {
        let warm = self.shop_settings.strategy == CacheStrategy::LogicalExpire;
        if warm && !self.shop_settings.warm_ids.is_empty() {
            self.shops
                .warm_up(&self.shop_settings.warm_ids, self.shop_settings.logical_ttl)
                .await?;
        }
        self.pipeline.start();
        Ok(())
    }

    /// 停止接单，排空队列并等待后台缓存重建结束
    pub async fn shutdown(&self) {
        self.pipeline.stop().await;
        self.cache.drain_rebuilds().await;
        info!("Dianping service stopped");
    }
}
