//! ports - 抽象 trait 层
//!
//! 定义核心逻辑依赖的基础设施接口：共享键值存储与分布式锁

mod key_value;
mod lock;

pub use key_value::*;
pub use lock::*;
