//! 错误类型体系
//!
//! 每个失败都带有具体的 [`ErrorKind`]，区分致命错误（传输层失效）与可重试错误。
//!
//! # 示例
//!
//! ```rust
//! use scs_client::{ErrorKind, ServoError};
//!
//! fn handle_error(err: ServoError) {
//!     if err.is_fatal() {
//!         eprintln!("致命错误: {}", err);
//!         // 重新连接
//!     } else if err.is_retryable() {
//!         eprintln!("可重试错误: {}", err);
//!     } else if err.kind() == ErrorKind::InvalidArgument {
//!         eprintln!("参数错误: {}", err);
//!     }
//! }
//! ```

use scs_driver::DriverError;
use scs_protocol::{FramingError, ProtocolError};
use scs_serial::SerialError;
use thiserror::Error;

/// SDK 结果类型
pub type Result<T> = std::result::Result<T, ServoError>;

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotConnected,
    AlreadyOpen,
    DeviceUnavailable,
    Transport,
    Timeout,
    DeviceNotResponding,
    ChecksumMismatch,
    Framing,
    UnexpectedDeviceId,
    MalformedResponse,
    InvalidArgument,
    Configuration,
    Internal,
}

/// 舵机总线错误
#[derive(Debug, Error)]
pub enum ServoError {
    // ==================== Connection ====================
    /// 连接未打开
    #[error("Not connected")]
    NotConnected,

    /// 连接已打开
    #[error("Connection already open")]
    AlreadyOpen,

    /// 串口设备不可用（不存在、无权限或被占用）
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(SerialError),

    /// 其他串口 I/O 错误
    #[error("Transport error: {0}")]
    Transport(SerialError),

    // ==================== Transaction ====================
    /// 未收到应答（未重试）
    #[error("Response timeout from servo {id}")]
    Timeout { id: u8 },

    /// 重试后仍未收到应答
    #[error("Servo {id} not responding after {attempts} attempts")]
    DeviceNotResponding { id: u8, attempts: u32 },

    /// 应答校验和错误
    #[error("Checksum mismatch in response from servo {id}: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { id: u8, expected: u8, actual: u8 },

    /// 应答帧结构错误
    #[error("Framing error in response from servo {id}: {error}")]
    Framing { id: u8, error: FramingError },

    /// 应答来自其他舵机
    #[error("Unexpected servo id: expected {expected}, got {actual}")]
    UnexpectedDeviceId { expected: u8, actual: u8 },

    /// 应答内容与请求不符
    #[error("Malformed response from servo {id}: {reason}")]
    MalformedResponse { id: u8, reason: String },

    // ==================== Caller ====================
    /// 参数非法（ID、寄存器值越界、只读寄存器等），请求未发出
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ProtocolError),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ==================== Other ====================
    /// 总线线程异常
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConnected => ErrorKind::NotConnected,
            Self::AlreadyOpen => ErrorKind::AlreadyOpen,
            Self::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::DeviceNotResponding { .. } => ErrorKind::DeviceNotResponding,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::Framing { .. } => ErrorKind::Framing,
            Self::UnexpectedDeviceId { .. } => ErrorKind::UnexpectedDeviceId,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 是否为致命错误
    ///
    /// 致命错误表示传输通道已不可用，需要重新连接。
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::DeviceUnavailable(_) | Self::Internal(_) => true,
            Self::Transport(e) => e.is_fatal(),
            _ => false,
        }
    }

    /// 是否可重试
    ///
    /// 总线噪声与无应答类错误，重新执行可能成功。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::DeviceNotResponding { .. }
                | Self::ChecksumMismatch { .. }
                | Self::Framing { .. }
        )
    }

    /// 是否为超时类错误
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::DeviceNotResponding { .. })
    }

    /// 应答解码失败
    pub(crate) fn malformed(id: u8, err: ProtocolError) -> Self {
        Self::MalformedResponse {
            id,
            reason: err.to_string(),
        }
    }
}

impl From<SerialError> for ServoError {
    fn from(err: SerialError) -> Self {
        match err {
            SerialError::AlreadyOpen => Self::AlreadyOpen,
            SerialError::NotOpen => Self::NotConnected,
            e if e.is_device_unavailable() => Self::DeviceUnavailable(e),
            e => Self::Transport(e),
        }
    }
}

impl From<DriverError> for ServoError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Transport(e) => e.into(),
            DriverError::Protocol(e) => Self::InvalidArgument(e),
            DriverError::NotConnected => Self::NotConnected,
            DriverError::Timeout { id } => Self::Timeout { id },
            DriverError::DeviceNotResponding { id, attempts } => {
                Self::DeviceNotResponding { id, attempts }
            },
            DriverError::ChecksumMismatch {
                id,
                expected,
                actual,
            } => Self::ChecksumMismatch {
                id,
                expected,
                actual,
            },
            DriverError::Framing { id, error } => Self::Framing { id, error },
            DriverError::UnexpectedDeviceId { expected, actual } => {
                Self::UnexpectedDeviceId { expected, actual }
            },
            DriverError::MalformedResponse { id, reason } => {
                Self::MalformedResponse { id, reason }
            },
            DriverError::IoThread(message) => Self::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scs_serial::{SerialDeviceError, SerialDeviceErrorKind};

    #[test]
    fn test_serial_error_mapping() {
        assert_eq!(ServoError::from(SerialError::AlreadyOpen).kind(), ErrorKind::AlreadyOpen);
        assert_eq!(ServoError::from(SerialError::NotOpen).kind(), ErrorKind::NotConnected);

        let busy = SerialError::Device(SerialDeviceError::new(
            SerialDeviceErrorKind::Busy,
            "claimed by another process",
        ));
        let err = ServoError::from(busy);
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
        assert!(err.is_fatal());

        let io = SerialError::Io(std::io::Error::other("broken pipe"));
        assert_eq!(ServoError::from(io).kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_driver_error_mapping() {
        let err = ServoError::from(DriverError::DeviceNotResponding { id: 5, attempts: 2 });
        assert_eq!(err.kind(), ErrorKind::DeviceNotResponding);
        assert!(err.is_timeout());
        assert!(err.is_retryable());

        let err = ServoError::from(DriverError::UnexpectedDeviceId {
            expected: 1,
            actual: 2,
        });
        assert_eq!(err.kind(), ErrorKind::UnexpectedDeviceId);
        assert!(!err.is_retryable());

        let err = ServoError::from(DriverError::Protocol(ProtocolError::InvalidId { id: 255 }));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!err.is_fatal());

        let err = ServoError::from(DriverError::Transport(SerialError::Timeout));
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(ServoError::NotConnected.to_string(), "Not connected");
        assert_eq!(
            ServoError::Timeout { id: 3 }.to_string(),
            "Response timeout from servo 3"
        );
    }
}
