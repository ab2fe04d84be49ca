//! 封禁管理器测试

mod integration;
#[cfg(feature = "runtime")]
mod maintenance;
