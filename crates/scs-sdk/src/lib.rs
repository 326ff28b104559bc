//! SCS SDK - 飞特 SCS/STS 系列总线舵机 Rust SDK
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 帧编解码、寄存器表、单位换算、同步批量帧
//! - **串口层** (`serial`): 传输会话、`serialport` 后端、虚拟总线
//! - **驱动层** (`driver`): 总线线程、FIFO 事务队列、重试与指标
//! - **客户端层** (`client`): `ServoBus` 连接对象与类型化 API
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use scs_sdk::prelude::*;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! scs_sdk::init_logger();
//!
//! let bus = ServoBusBuilder::new().serial_port("/dev/ttyUSB0").build()?;
//! bus.write_torque_enable(1, true)?;
//! bus.write_position_deg(1, Deg(90.0))?;
//! println!("servo 1 at {}", bus.read_position_deg(1)?);
//! # Ok(())
//! # }
//! ```

pub use scs_client as client;
pub use scs_driver as driver;
pub use scs_protocol as protocol;
pub use scs_serial as serial;

pub mod prelude;

// 客户端层（推荐入口）
pub use client::{
    ConnectOptions, ErrorKind, ServoBus, ServoBusBuilder, ServoBusConfig, ServoError,
};

// 常用类型
pub use protocol::{BaudRate, Deg, OperatingMode, ProtocolEnd, Register, ServoMap};
pub use driver::{MetricsSnapshot, TransactionConfig};
pub use serial::VirtualBus;

// 错误类型
pub use driver::DriverError;
pub use protocol::ProtocolError;
pub use serial::SerialError;

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

/// 日志初始化错误
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Failed to install log bridge: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),
}

/// 初始化日志（`RUST_LOG` 控制级别，默认 `info`）
///
/// 同时把 `log` crate 的记录桥接到 `tracing`。重复调用时静默忽略。
pub fn init_logger() {
    let _ = try_init_logger();
}

/// 初始化日志，返回安装失败的原因（例如已经安装过全局订阅者）
pub fn try_init_logger() -> Result<(), LoggerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}
