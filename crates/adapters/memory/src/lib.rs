//! hmdp-adapter-memory - 进程内键值存储
//!
//! 单机开发和测试使用，行为与 Redis 适配器保持一致：
//! 支持 TTL、字符串与集合两种值类型，脚本在全局互斥锁内执行。

mod key_value;

pub use key_value::*;
