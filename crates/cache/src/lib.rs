//! hmdp-cache - 缓存访问层
//!
//! 三种缓存策略：
//! - 缓存穿透：空值缓存（墓碑）
//! - 缓存击穿：互斥锁重建 / 逻辑过期异步重建
//! - 缓存雪崩：TTL 随机抖动

mod client;
mod config;
mod entry;
mod metrics;

pub use client::*;
pub use config::*;
pub use entry::*;
