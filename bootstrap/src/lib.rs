//! hmdp-bootstrap - 服务启动骨架
//!
//! 配置驱动的日志初始化、基础设施连接与关闭信号

mod infrastructure;
mod runtime;

pub use infrastructure::*;
pub use runtime::*;
