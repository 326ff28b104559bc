//! 驱动层错误类型定义

use scs_protocol::{FramingError, ProtocolError};
use scs_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口传输错误
    #[error("Serial transport error: {0}")]
    Transport(#[from] SerialError),

    /// 协议编码错误（请求在发出前被拒绝）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 连接未打开或总线线程已退出
    #[error("Not connected")]
    NotConnected,

    /// 单次尝试内未收到应答
    #[error("Response timeout from servo {id}")]
    Timeout { id: u8 },

    /// 重试后仍未收到应答
    #[error("Servo {id} not responding after {attempts} attempts")]
    DeviceNotResponding { id: u8, attempts: u32 },

    /// 应答校验和错误
    #[error("Checksum mismatch in response from servo {id}: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { id: u8, expected: u8, actual: u8 },

    /// 应答帧结构错误（截断、长度不符）
    #[error("Framing error in response from servo {id}: {error}")]
    Framing { id: u8, error: FramingError },

    /// 应答来自非预期的舵机（不重试）
    #[error("Unexpected servo id: expected {expected}, got {actual}")]
    UnexpectedDeviceId { expected: u8, actual: u8 },

    /// 应答内容不符合请求（不重试）
    #[error("Malformed response from servo {id}: {reason}")]
    MalformedResponse { id: u8, reason: String },

    /// 总线线程错误
    #[error("Bus thread error: {0}")]
    IoThread(String),
}

impl DriverError {
    /// 是否属于可自动重试一次的瞬态错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ChecksumMismatch { .. } | Self::Framing { .. }
        )
    }

    /// 是否属于超时类错误
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::DeviceNotResponding { .. })
    }

    /// 将应答解码错误归类到驱动层错误
    pub(crate) fn from_decode(id: u8, err: ProtocolError) -> Self {
        match err {
            ProtocolError::ChecksumMismatch { expected, actual } => Self::ChecksumMismatch {
                id,
                expected,
                actual,
            },
            ProtocolError::Framing(error) => Self::Framing { id, error },
            ProtocolError::UnexpectedId { expected, actual } => {
                Self::UnexpectedDeviceId { expected, actual }
            },
            other => Self::MalformedResponse {
                id,
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试 DriverError 的 Display 实现
    #[test]
    fn test_driver_error_display() {
        let err = DriverError::Timeout { id: 3 };
        assert_eq!(err.to_string(), "Response timeout from servo 3");

        let err = DriverError::DeviceNotResponding { id: 3, attempts: 2 };
        assert_eq!(err.to_string(), "Servo 3 not responding after 2 attempts");

        let err = DriverError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");

        let err = DriverError::from(SerialError::AlreadyOpen);
        assert!(err.to_string().contains("already open"));
    }

    /// 测试重试分类
    #[test]
    fn test_retry_classification() {
        assert!(DriverError::Timeout { id: 1 }.is_retryable());
        assert!(
            DriverError::ChecksumMismatch {
                id: 1,
                expected: 0,
                actual: 1
            }
            .is_retryable()
        );
        assert!(
            DriverError::Framing {
                id: 1,
                error: FramingError::HeaderNotFound
            }
            .is_retryable()
        );
        assert!(
            !DriverError::UnexpectedDeviceId {
                expected: 1,
                actual: 2
            }
            .is_retryable()
        );
        assert!(
            !DriverError::MalformedResponse {
                id: 1,
                reason: String::new()
            }
            .is_retryable()
        );
        assert!(!DriverError::DeviceNotResponding { id: 1, attempts: 2 }.is_retryable());
        assert!(DriverError::DeviceNotResponding { id: 1, attempts: 2 }.is_timeout());
    }

    /// 测试解码错误归类
    #[test]
    fn test_from_decode() {
        let err = DriverError::from_decode(
            4,
            ProtocolError::ChecksumMismatch {
                expected: 0x10,
                actual: 0x20,
            },
        );
        assert!(matches!(err, DriverError::ChecksumMismatch { id: 4, .. }));

        let err = DriverError::from_decode(
            4,
            ProtocolError::UnexpectedId {
                expected: 4,
                actual: 5,
            },
        );
        assert!(matches!(
            err,
            DriverError::UnexpectedDeviceId {
                expected: 4,
                actual: 5
            }
        ));

        let err = DriverError::from_decode(4, FramingError::HeaderNotFound.into());
        assert!(matches!(err, DriverError::Framing { id: 4, .. }));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DriverError>();
    }
}
