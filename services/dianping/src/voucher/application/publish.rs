//! 秒杀券发布与查询

use hmdp_cache::CacheClient;
use hmdp_common::VoucherId;
use hmdp_errors::AppResult;
use hmdp_ports::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::VoucherError;
use crate::keys::{self, SECKILL_VOUCHER_KEY_PREFIX};
use crate::voucher::domain::{SeckillVoucher, VoucherRepository};

/// 通过缓存（穿透防护）读取秒杀券
pub async fn load_seckill_voucher(
    cache: &CacheClient,
    vouchers: &Arc<dyn VoucherRepository>,
    id: VoucherId,
    ttl: Duration,
) -> AppResult<Option<SeckillVoucher>> {
    let vouchers = vouchers.clone();
    cache
        .get_with_pass_through(
            SECKILL_VOUCHER_KEY_PREFIX,
            id,
            move |id: VoucherId| async move { vouchers.find_seckill_voucher(id).await },
            ttl,
        )
        .await
}

/// 秒杀券服务
pub struct VoucherService {
    vouchers: Arc<dyn VoucherRepository>,
    store: Arc<dyn KeyValueStore>,
    cache: Arc<CacheClient>,
    cache_ttl: Duration,
}

impl VoucherService {
    pub fn new(
        vouchers: Arc<dyn VoucherRepository>,
        store: Arc<dyn KeyValueStore>,
        cache: Arc<CacheClient>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            vouchers,
            store,
            cache,
            cache_ttl,
        }
    }

    /// 发布秒杀券
    ///
    /// 先落库，再写入 Redis 库存计数，最后删除旧的券缓存。
    /// 库存计数只在这里直接写入，秒杀开始后只由预扣脚本修改。
    pub async fn publish_seckill_voucher(&self, voucher: &SeckillVoucher) -> AppResult<()> {
        voucher.validate()?;

        self.vouchers.save_seckill_voucher(voucher).await?;
        self.store
            .set(
                &keys::seckill_stock_key(voucher.voucher_id),
                &voucher.stock.to_string(),
                None,
            )
            .await?;
        self.cache
            .invalidate(&keys::seckill_voucher_key(voucher.voucher_id))
            .await?;

        info!(
            voucher_id = %voucher.voucher_id,
            stock = voucher.stock,
            begin_time = %voucher.begin_time,
            end_time = %voucher.end_time,
            "Seckill voucher published"
        );
        Ok(())
    }

    pub async fn query_seckill_voucher(&self, id: VoucherId) -> AppResult<SeckillVoucher> {
        load_seckill_voucher(&self.cache, &self.vouchers, id, self.cache_ttl)
            .await?
            .ok_or_else(|| VoucherError::NotFound(id).into())
    }
}
