//! hmdp-lock - 基于共享键值存储的分布式锁

mod guard;
mod store_lock;

pub use guard::*;
pub use store_lock::*;
