//! Redis 键布局

/// 商铺缓存 `cache:shop:{id}`
pub const SHOP_KEY_PREFIX: &str = "cache:shop:";
/// 商铺类型列表缓存 `cache:shop-type:all`
pub const SHOP_TYPE_KEY_PREFIX: &str = "cache:shop-type:";
pub const SHOP_TYPE_ALL: &str = "all";
/// 秒杀券缓存 `cache:seckill-voucher:{id}`
pub const SECKILL_VOUCHER_KEY_PREFIX: &str = "cache:seckill-voucher:";
/// 秒杀库存计数 `seckill:stock:{voucherId}`
pub const SECKILL_STOCK_KEY_PREFIX: &str = "seckill:stock:";
/// 已下单买家集合 `seckill:order:{voucherId}`
pub const SECKILL_ORDER_KEY_PREFIX: &str = "seckill:order:";
/// 买家锁名前缀，完整锁键为 `lock:order:{buyerId}`
pub const BUYER_LOCK_PREFIX: &str = "order:";

pub fn shop_key(id: impl std::fmt::Display) -> String {
    format!("{}{}", SHOP_KEY_PREFIX, id)
}

pub fn seckill_voucher_key(id: impl std::fmt::Display) -> String {
    format!("{}{}", SECKILL_VOUCHER_KEY_PREFIX, id)
}

pub fn seckill_stock_key(voucher_id: impl std::fmt::Display) -> String {
    format!("{}{}", SECKILL_STOCK_KEY_PREFIX, voucher_id)
}

pub fn seckill_order_key(voucher_id: impl std::fmt::Display) -> String {
    format!("{}{}", SECKILL_ORDER_KEY_PREFIX, voucher_id)
}

pub fn buyer_lock_name(buyer_id: impl std::fmt::Display) -> String {
    format!("{}{}", BUYER_LOCK_PREFIX, buyer_id)
}
