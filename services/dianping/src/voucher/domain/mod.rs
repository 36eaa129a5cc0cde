//! 秒杀券领域层

mod repositories;
mod unit_of_work;
mod voucher;

pub use repositories::*;
pub use unit_of_work::*;
pub use voucher::*;
