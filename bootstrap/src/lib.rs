//! rsp-bootstrap - 统一服务启动骨架
//!
//! 配置加载、日志初始化、数据库连接和 HTTP 服务启动

mod health;
mod infrastructure;
mod retry;
mod runtime;
mod starter;

pub use health::*;
pub use infrastructure::*;
pub use retry::*;
pub use runtime::*;
pub use starter::*;
