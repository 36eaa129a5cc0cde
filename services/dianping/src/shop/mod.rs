//! 商铺模块

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{ShopService, ShopTypeService};
pub use domain::{Shop, ShopRepository, ShopType, ShopTypeRepository};
