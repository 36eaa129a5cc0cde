//! 秒杀券仓储与 Unit of Work 实现

mod memory;
mod postgres;

pub use memory::*;
pub use postgres::*;
