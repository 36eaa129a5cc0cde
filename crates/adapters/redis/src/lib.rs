//! hmdp-adapter-redis - Redis 适配器

mod config;
mod connection;
mod key_value;

pub use config::*;
pub use connection::*;
pub use key_value::*;
