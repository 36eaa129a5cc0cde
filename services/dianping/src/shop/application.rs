//! 商铺查询服务

use crate::error::ShopError;
use crate::keys::{self, SHOP_KEY_PREFIX, SHOP_TYPE_ALL, SHOP_TYPE_KEY_PREFIX};
use crate::shop::domain::{Shop, ShopRepository, ShopType, ShopTypeRepository};
use hmdp_cache::{CacheClient, CacheStrategy};
use hmdp_common::ShopId;
use hmdp_errors::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 商铺服务
pub struct ShopService {
    shops: Arc<dyn ShopRepository>,
    cache: Arc<CacheClient>,
    strategy: CacheStrategy,
    ttl: Duration,
    logical_ttl: Duration,
}

/// 逻辑过期时长默认值
const DEFAULT_LOGICAL_TTL: Duration = Duration::from_secs(20);

impl ShopService {
    pub fn new(
        shops: Arc<dyn ShopRepository>,
        cache: Arc<CacheClient>,
        strategy: CacheStrategy,
        ttl: Duration,
    ) -> Self {
        Self {
            shops,
            cache,
            strategy,
            ttl,
            logical_ttl: DEFAULT_LOGICAL_TTL,
        }
    }

    /// 逻辑过期策略下更新后重写缓存使用的时长
    pub fn with_logical_ttl(mut self, logical_ttl: Duration) -> Self {
        self.logical_ttl = logical_ttl;
        self
    }

    pub fn strategy(&self) -> CacheStrategy {
        self.strategy
    }

    /// 按配置的缓存策略查询商铺
    pub async fn query_by_id(&self, id: ShopId) -> AppResult<Shop> {
        let shops = self.shops.clone();
        let shop = self
            .cache
            .cached_lookup(
                SHOP_KEY_PREFIX,
                id,
                move |id: ShopId| async move { shops.find_by_id(id).await },
                self.ttl,
                self.strategy,
            )
            .await?;

        shop.ok_or_else(|| ShopError::NotFound(id).into())
    }

    /// 先更新数据库，再删除缓存
    ///
    /// 逻辑过期策略不会在未命中时回源，删除会让商铺一直不可见，
    /// 因此改为用新数据重写缓存。
    pub async fn update(&self, shop: &Shop) -> AppResult<()> {
        if shop.id.value() <= 0 {
            return Err(ShopError::InvalidId.into());
        }
        if !self.shops.update(shop).await? {
            return Err(ShopError::NotFound(shop.id).into());
        }

        let key = keys::shop_key(shop.id);
        match self.strategy {
            CacheStrategy::LogicalExpire => {
                self.cache
                    .set_with_logical_expire(&key, shop.clone(), self.logical_ttl)
                    .await?
            }
            CacheStrategy::PassThrough | CacheStrategy::Mutex => {
                self.cache.invalidate(&key).await?
            }
        }
        info!(shop_id = %shop.id, "Shop updated");
        Ok(())
    }

    /// 预热逻辑过期缓存，返回写入的条数
    pub async fn warm_up(&self, ids: &[ShopId], logical_ttl: Duration) -> AppResult<usize> {
        let mut warmed = 0;
        for &id in ids {
            match self.shops.find_by_id(id).await? {
                Some(shop) => {
                    self.cache
                        .set_with_logical_expire(&keys::shop_key(id), shop, logical_ttl)
                        .await?;
                    warmed += 1;
                }
                None => warn!(shop_id = %id, "Skipping warm-up for missing shop"),
            }
        }
        info!(requested = ids.len(), warmed, "Shop cache warmed");
        Ok(warmed)
    }
}

/// 商铺类型服务
pub struct ShopTypeService {
    types: Arc<dyn ShopTypeRepository>,
    cache: Arc<CacheClient>,
    ttl: Duration,
}

impl ShopTypeService {
    pub fn new(types: Arc<dyn ShopTypeRepository>, cache: Arc<CacheClient>, ttl: Duration) -> Self {
        Self { types, cache, ttl }
    }

    /// 按 sort 排序的全部类型，空列表视为不存在
    pub async fn list(&self) -> AppResult<Vec<ShopType>> {
        let types = self.types.clone();
        let list = self
            .cache
            .get_with_pass_through(
                SHOP_TYPE_KEY_PREFIX,
                SHOP_TYPE_ALL,
                move |_| async move {
                    let list = types.list_sorted().await?;
                    Ok::<_, AppError>((!list.is_empty()).then_some(list))
                },
                self.ttl,
            )
            .await?;

        list.ok_or_else(|| ShopError::TypesNotFound.into())
    }
}
