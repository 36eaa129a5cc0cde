//! 点评服务
//!
//! - `shop`: 商铺查询（缓存访问层的使用方）
//! - `voucher`: 秒杀券发布与秒杀下单流水线

pub mod app;
pub mod config;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod shop;
pub mod voucher;

pub use app::DianpingApp;
