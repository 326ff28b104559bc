//! # SCS Serial Transport Layer
//!
//! 串口硬件抽象层：
//!
//! - [`BusAdapter`]：已打开的半双工字节通道（写字节、带超时读字节）
//! - [`Connector`]：按 [`LinkOptions`] 打开通道（可独占的设备声明）
//! - [`TransportSession`]：打开/关闭生命周期与原始字节 I/O
//! - [`serial`]：基于 `serialport` 的真实串口后端
//! - [`virtual_bus`]：进程内舵机总线模拟器（测试与离线使用）

use scs_protocol::{DEFAULT_BAUD_RATE, ProtocolEnd};
use std::time::{Duration, Instant};
use thiserror::Error;

pub mod session;
pub mod virtual_bus;

#[cfg(feature = "hardware")]
pub mod serial;

pub use session::TransportSession;
pub use virtual_bus::{ReplyFault, VirtualBus, VirtualConnector, WriteRecord};

#[cfg(feature = "hardware")]
pub use serial::{SerialPortAdapter, SerialPortConnector, available_ports};

/// 串口适配层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] SerialDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Transport already open")]
    AlreadyOpen,
    #[error("Transport not open")]
    NotOpen,
}

impl SerialError {
    /// 不可恢复的错误（设备丢失或无权限）
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Device(e) => e.is_fatal(),
            _ => false,
        }
    }

    /// 通道无法被声明（设备不存在、被占用或无权限）
    pub fn is_device_unavailable(&self) -> bool {
        match self {
            Self::Device(e) => e.is_fatal() || e.kind == SerialDeviceErrorKind::Busy,
            _ => false,
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialDeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    Busy,
    UnsupportedConfig,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct SerialDeviceError {
    pub kind: SerialDeviceErrorKind,
    pub message: String,
}

impl SerialDeviceError {
    pub fn new(kind: SerialDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            SerialDeviceErrorKind::NoDevice
                | SerialDeviceErrorKind::AccessDenied
                | SerialDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for SerialDeviceError {
    fn from(message: String) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for SerialDeviceError {
    fn from(message: &str) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

/// 链路参数
///
/// `protocol_end` 不影响字节传输本身，随链路记录以便上层按同一字节序编解码。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkOptions {
    pub baud_rate: u32,
    pub protocol_end: ProtocolEnd,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            protocol_end: ProtocolEnd::default(),
        }
    }
}

impl LinkOptions {
    /// 单字节线上传输时间（8N1：10 bit/字节）
    pub fn byte_time(&self) -> Duration {
        Duration::from_nanos(10_000_000_000 / self.baud_rate.max(1) as u64)
    }
}

/// 已打开的半双工字节通道
pub trait BusAdapter: Send {
    /// 写出全部字节
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// 读取当前可用字节，最多等待 `timeout`
    ///
    /// 返回读到的字节数（> 0）；超时无数据时返回 [`SerialError::Timeout`]。
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SerialError>;

    /// 丢弃输入缓冲区中尚未读取的字节
    fn clear_input(&mut self) -> Result<(), SerialError>;

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), SerialError>;

    fn baud_rate(&self) -> u32;

    /// 非阻塞读取
    fn try_read(&mut self, buf: &mut [u8]) -> Result<Option<usize>, SerialError> {
        match self.read(buf, Duration::ZERO) {
            Ok(n) => Ok(Some(n)),
            Err(SerialError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 持续读取并追加到 `buf`，直到 `predicate(buf)` 成立或超时
    ///
    /// 超时返回 [`SerialError::Timeout`]，此时 `buf` 中保留已收到的字节。
    fn read_until(
        &mut self,
        buf: &mut Vec<u8>,
        predicate: &mut dyn FnMut(&[u8]) -> bool,
        timeout: Duration,
    ) -> Result<(), SerialError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 256];
        loop {
            if predicate(buf) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SerialError::Timeout);
            }
            match self.read(&mut chunk, deadline - now) {
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(SerialError::Timeout) => {},
                Err(e) => return Err(e),
            }
        }
    }
}

/// 通道打开器
///
/// 每次 `connect` 声明一次底层设备；返回的适配器被丢弃时释放声明。
pub trait Connector: Send {
    fn connect(&mut self, options: &LinkOptions) -> Result<Box<dyn BusAdapter>, SerialError>;

    /// 人类可读的设备描述（日志用）
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_classification() {
        let err = SerialError::from(SerialDeviceError::new(SerialDeviceErrorKind::Busy, "locked"));
        assert!(err.is_device_unavailable());
        assert!(!err.is_fatal());

        let err = SerialError::from(SerialDeviceError::new(
            SerialDeviceErrorKind::NotFound,
            "/dev/ttyUSB9",
        ));
        assert!(err.is_fatal());
        assert!(err.is_device_unavailable());

        assert!(!SerialError::Timeout.is_device_unavailable());
    }

    #[test]
    fn test_device_error_display() {
        let err = SerialDeviceError::new(SerialDeviceErrorKind::AccessDenied, "permission denied");
        assert_eq!(err.to_string(), "AccessDenied: permission denied");
        let err: SerialDeviceError = "boom".into();
        assert_eq!(err.kind, SerialDeviceErrorKind::Unknown);
    }

    #[test]
    fn test_byte_time() {
        let options = LinkOptions::default();
        assert_eq!(options.byte_time(), Duration::from_micros(10));
        let slow = LinkOptions {
            baud_rate: 115_200,
            ..Default::default()
        };
        assert_eq!(slow.byte_time(), Duration::from_nanos(86_805));
    }
}
