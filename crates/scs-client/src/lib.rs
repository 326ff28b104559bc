//! # SCS Client
//!
//! 舵机总线的用户接口：
//! - [`ServoBus`]：显式连接对象（connect/disconnect、类型化寄存器读写、同步批量操作）
//! - [`ServoBusBuilder`]：链式构造
//! - [`ConnectOptions`] / [`ServoBusConfig`]：类型化配置
//! - [`ServoError`] / [`ErrorKind`]：每个失败都带具体分类
//!
//! # Example
//!
//! ```
//! use scs_client::ServoBusBuilder;
//! use scs_protocol::ServoMap;
//! use scs_serial::VirtualBus;
//!
//! let sim = VirtualBus::new().with_servo(1).with_servo(2);
//! let bus = ServoBusBuilder::new().virtual_bus(sim).build().unwrap();
//!
//! let targets: ServoMap<u16> = [(1, 1000), (2, 3000)].into();
//! bus.sync_write_positions(&targets).unwrap();
//!
//! let positions = bus.sync_read_positions(&[1, 2]).unwrap();
//! assert_eq!(positions.get(2), Some(&3000));
//! ```

pub mod builder;
pub mod bus;
pub mod config;
pub mod error;

pub use builder::ServoBusBuilder;
pub use bus::ServoBus;
pub use config::{ConnectOptions, ServoBusConfig};
pub use error::{ErrorKind, Result, ServoError};
