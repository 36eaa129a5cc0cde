//! common - 通用类型和工具库

pub mod id_worker;
pub mod retry;
pub mod types;

pub use id_worker::*;
pub use retry::*;
pub use types::*;
