//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use scs_sdk::prelude::*;
//! ```

// 客户端层
pub use crate::client::{ConnectOptions, ServoBus, ServoBusBuilder, ServoBusConfig};

// 协议层常用类型
pub use crate::protocol::{BaudRate, Deg, OperatingMode, ProtocolEnd, Register, ServoMap};

// 虚拟总线（测试与离线使用）
pub use crate::serial::VirtualBus;

// 错误类型
pub use crate::client::{ErrorKind, ServoError};
