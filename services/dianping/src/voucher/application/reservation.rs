//! 秒杀预扣脚本
//!
//! KEYS[1] 库存计数，KEYS[2] 已下单买家集合，ARGV[1] 买家 ID。
//! 库存检查、一人一单检查、扣减与记录在一次原子执行中完成。

use hmdp_errors::{AppError, AppResult};
use hmdp_ports::{AtomicScript, ScriptContext};

use super::outcome::RejectReason;

const RESERVE_LUA: &str = r"
local stock = tonumber(redis.call('GET', KEYS[1]))
if stock == nil or stock <= 0 then
    return 1
end
if redis.call('SISMEMBER', KEYS[2], ARGV[1]) == 1 then
    return 2
end
redis.call('INCRBY', KEYS[1], -1)
redis.call('SADD', KEYS[2], ARGV[1])
return 0
";

fn reserve_native(ctx: &mut dyn ScriptContext, keys: &[&str], args: &[&str]) -> AppResult<i64> {
    let (Some(stock_key), Some(order_key), Some(buyer)) = (keys.first(), keys.get(1), args.first())
    else {
        return Err(AppError::internal(
            "reserve script requires two keys and the buyer id",
        ));
    };

    let stock = ctx
        .get(stock_key)?
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(0);
    if stock <= 0 {
        return Ok(ReservationResult::SoldOut.code());
    }
    if ctx.set_contains(order_key, buyer)? {
        return Ok(ReservationResult::Duplicate.code());
    }
    ctx.incr_by(stock_key, -1)?;
    ctx.set_add(order_key, buyer)?;
    Ok(ReservationResult::Reserved.code())
}

/// 库存预扣脚本
pub const RESERVE_SCRIPT: AtomicScript =
    AtomicScript::new("seckill:reserve", RESERVE_LUA, reserve_native);

/// 预扣脚本返回码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationResult {
    Reserved,
    SoldOut,
    Duplicate,
}

impl ReservationResult {
    pub fn code(self) -> i64 {
        match self {
            Self::Reserved => 0,
            Self::SoldOut => 1,
            Self::Duplicate => 2,
        }
    }

    pub fn from_code(code: i64) -> AppResult<Self> {
        match code {
            0 => Ok(Self::Reserved),
            1 => Ok(Self::SoldOut),
            2 => Ok(Self::Duplicate),
            other => Err(AppError::internal(format!(
                "Unexpected reserve script result: {}",
                other
            ))),
        }
    }

    pub fn reject_reason(self) -> Option<RejectReason> {
        match self {
            Self::Reserved => None,
            Self::SoldOut => Some(RejectReason::SoldOut),
            Self::Duplicate => Some(RejectReason::Duplicate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmdp_adapter_memory::InMemoryKeyValueStore;
    use hmdp_ports::KeyValueStore;

    async fn reserve(store: &InMemoryKeyValueStore, buyer: &str) -> ReservationResult {
        let code = store
            .eval_script(&RESERVE_SCRIPT, &["seckill:stock:1", "seckill:order:1"], &[buyer])
            .await
            .unwrap();
        ReservationResult::from_code(code).unwrap()
    }

    #[tokio::test]
    async fn test_reserve_decrements_and_records_buyer() {
        let store = InMemoryKeyValueStore::new();
        store.set("seckill:stock:1", "2", None).await.unwrap();

        assert_eq!(reserve(&store, "7").await, ReservationResult::Reserved);
        assert_eq!(store.get("seckill:stock:1").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.set_members("seckill:order:1"), vec!["7"]);

        assert_eq!(reserve(&store, "7").await, ReservationResult::Duplicate);
        assert_eq!(reserve(&store, "8").await, ReservationResult::Reserved);
        assert_eq!(reserve(&store, "9").await, ReservationResult::SoldOut);
        assert_eq!(store.get("seckill:stock:1").await.unwrap().as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_missing_stock_counts_as_sold_out() {
        let store = InMemoryKeyValueStore::new();
        assert_eq!(reserve(&store, "7").await, ReservationResult::SoldOut);
        assert!(store.set_members("seckill:order:1").is_empty());
    }

    #[test]
    fn test_unknown_code_is_an_error() {
        assert!(ReservationResult::from_code(9).is_err());
        assert_eq!(
            ReservationResult::from_code(1).unwrap().reject_reason(),
            Some(RejectReason::SoldOut)
        );
    }
}
