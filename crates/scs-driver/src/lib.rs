//! # SCS Driver
//!
//! 事务引擎：在半双工总线上一次只执行一个请求/应答事务。
//!
//! ## 模块
//!
//! - `engine`: 总线工作线程、FIFO 请求队列、重试与超时策略
//! - `transaction`: 请求、应答形状与挂起事务句柄
//! - `config`: 事务配置
//! - `metrics`: 原子计数器指标
//! - `error`: 驱动层错误类型

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod transaction;

pub use config::TransactionConfig;
pub use engine::TransactionEngine;
pub use error::DriverError;
pub use metrics::{BusMetrics, MetricsSnapshot};
pub use transaction::{
    PendingTransaction, RawResponse, Request, Response, ResponseShape, TransactionState,
};
