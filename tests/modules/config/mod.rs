//! 配置测试
