//! 商铺仓储实现

mod memory;
mod postgres;

pub use memory::*;
pub use postgres::*;
