//! 通用类型定义
//!
//! 所有业务标识都是数据库中的 BIGINT，这里用 newtype 区分语义，
//! 防止把买家 ID 传给需要优惠券 ID 的位置。

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            Display, From,
        )]
        #[serde(transparent)]
        #[display("{_0}")]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            pub fn value(&self) -> i64 {
                self.0
            }
        }
    };
}

define_id!(
    /// 商铺 ID
    ShopId
);
define_id!(
    /// 商铺类型 ID
    ShopTypeId
);
define_id!(
    /// 优惠券 ID
    VoucherId
);
define_id!(
    /// 用户（买家）ID
    UserId
);
define_id!(
    /// 订单 ID，由 [`crate::OrderIdGenerator`] 生成，按时间大致有序
    OrderId
);
