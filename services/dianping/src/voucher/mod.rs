//! 秒杀券模块
//!
//! 下单流程：Redis 原子预扣 → 内存队列 → 后台 worker 在买家锁内落库

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::*;
pub use domain::*;
