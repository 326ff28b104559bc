//! # SCS Protocol
//!
//! 飞特（Feetech）SCS/STS 系列总线舵机协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议常量（帧头、广播 ID、偏移量）
//! - `instruction`: 指令码与参数形状校验
//! - `frame`: 帧编码/解码、校验和、状态字节
//! - `register`: 寄存器表（地址、宽度、取值范围）
//! - `units`: 原始单位与领域单位之间的换算
//! - `map`: 有序的 舵机 ID → 值 映射
//! - `sync`: 同步读/写（SYNC_READ / SYNC_WRITE）批量帧
//!
//! ## 帧格式
//!
//! ```text
//! 0xFF 0xFF | ID | LEN | INSTR/STATUS | PARAM... | CHECKSUM
//! LEN      = PARAM 数量 + 2
//! CHECKSUM = !(ID + LEN + INSTR + ΣPARAM)（按字节回绕求和）
//! ```
//!
//! ## 字节序
//!
//! 多字节寄存器的字节序由 [`ProtocolEnd`] 决定：STS 系列低字节在前（默认），
//! SCS 系列高字节在前。编码与解码始终对称。

pub mod constants;
pub mod frame;
pub mod instruction;
pub mod map;
pub mod register;
pub mod sync;
pub mod units;

// 重新导出常用类型
pub use constants::*;
pub use frame::{Decoded, Frame, ServoStatus, checksum, decode, decode_prefix, decode_response, encode};
pub use instruction::Instruction;
pub use map::ServoMap;
pub use register::{Access, RawDomain, Register};
pub use units::{BaudRate, Deg, OperatingMode};

use thiserror::Error;

/// 协议编解码错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid servo id: {id} (expected 0..=254)")]
    InvalidId { id: u8 },

    #[error("Invalid parameters for {instruction:?}: {reason}")]
    InvalidParams {
        instruction: Instruction,
        reason: String,
    },

    #[error("Packet too long: {len} bytes (max {max})")]
    PacketTooLong { len: usize, max: usize },

    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Unexpected servo id: expected {expected}, got {actual}")]
    UnexpectedId { expected: u8, actual: u8 },

    #[error("Unknown instruction: 0x{0:02X}")]
    UnknownInstruction(u8),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: i64 },

    #[error("Register '{register}' is read-only")]
    ReadOnly { register: &'static str },

    #[error("Invalid data length for '{register}': expected {expected}, got {actual}")]
    InvalidLength {
        register: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl ProtocolError {
    /// 是否为请求编码阶段的错误（ID 或参数越界，发出前即被拒绝）
    pub fn is_encode_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidId { .. }
                | Self::InvalidParams { .. }
                | Self::PacketTooLong { .. }
                | Self::InvalidValue { .. }
                | Self::ReadOnly { .. }
        )
    }

    /// 是否表示字节流尚不完整（调用方应继续等待更多字节或超时）
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Framing(e) if e.is_incomplete())
    }

    pub(crate) fn invalid_value(field: impl Into<String>, value: impl Into<i64>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// 帧结构错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    #[error("header not found")]
    HeaderNotFound,

    #[error("truncated frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("declared length {declared} does not match {actual} trailing bytes")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("invalid length byte {declared}")]
    InvalidLength { declared: u8 },
}

impl FramingError {
    /// 帧头未出现或帧被截断：更多字节可能补全该帧
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::HeaderNotFound | Self::Truncated { .. })
    }
}

/// 多字节寄存器字节序（connect 选项中的 `protocol_end`）
///
/// - `0`: 低字节在前（STS/SMS 系列，默认）
/// - `1`: 高字节在前（SCS 系列）
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    num_enum::TryFromPrimitive,
    num_enum::IntoPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ProtocolEnd {
    #[default]
    LowByteFirst = 0,
    HighByteFirst = 1,
}

impl ProtocolEnd {
    /// u16 转线上字节序
    pub fn word_to_bytes(self, value: u16) -> [u8; 2] {
        match self {
            Self::LowByteFirst => value.to_le_bytes(),
            Self::HighByteFirst => value.to_be_bytes(),
        }
    }

    /// 线上字节序转 u16
    pub fn bytes_to_word(self, bytes: [u8; 2]) -> u16 {
        match self {
            Self::LowByteFirst => u16::from_le_bytes(bytes),
            Self::HighByteFirst => u16::from_be_bytes(bytes),
        }
    }
}
