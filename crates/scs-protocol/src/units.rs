//! 单位换算
//!
//! 原始寄存器值与领域值之间的换算：
//! - 位置：`deg = ticks × 360 / 4096`，对所有 0..=4095 的刻度值精确可逆
//! - 速度/负载：符号-幅值编码（sign-magnitude），符号位由寄存器决定
//! - 布尔寄存器：`false → 0`，`true → 1`；读回时任何非零值均视为 `true`

use crate::ProtocolError;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

/// 一圈对应的刻度数
pub const TICKS_PER_REVOLUTION: u16 = 4096;

/// 最大位置刻度
pub const MAX_POSITION_TICKS: u16 = TICKS_PER_REVOLUTION - 1;

/// 加速度上限（单位 100 step/s²）
pub const MAX_ACCELERATION: u8 = 254;

/// 轮式模式速度幅值上限
pub const MAX_WHEEL_SPEED: i32 = 10_000;

/// 刻度转角度
#[inline]
pub fn ticks_to_degrees(ticks: u16) -> f64 {
    ticks as f64 * 360.0 / TICKS_PER_REVOLUTION as f64
}

/// 角度转刻度（四舍五入）
///
/// 结果必须落在 0..=4095 之内，否则返回 `InvalidValue`。
pub fn degrees_to_ticks(degrees: f64) -> Result<u16, ProtocolError> {
    let ticks = (degrees * TICKS_PER_REVOLUTION as f64 / 360.0).round();
    if !ticks.is_finite() || ticks < 0.0 || ticks > MAX_POSITION_TICKS as f64 {
        return Err(ProtocolError::InvalidValue {
            field: "position_deg".to_string(),
            value: if degrees.is_finite() {
                degrees as i64
            } else {
                i64::MAX
            },
        });
    }
    Ok(ticks as u16)
}

/// 角度（度）
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Deg(pub f64);

impl Deg {
    pub fn from_ticks(ticks: u16) -> Self {
        Self(ticks_to_degrees(ticks))
    }

    pub fn to_ticks(self) -> Result<u16, ProtocolError> {
        degrees_to_ticks(self.0)
    }
}

impl std::fmt::Display for Deg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}°", self.0)
    }
}

/// 有符号值转符号-幅值编码
///
/// 调用方负责保证幅值不超过 `sign_bit` 以下的位宽。
#[inline]
pub fn to_sign_magnitude(value: i32, sign_bit: u8) -> u16 {
    let mask = (1u32 << sign_bit) - 1;
    let magnitude = (value.unsigned_abs() & mask) as u16;
    if value < 0 {
        magnitude | (1u16 << sign_bit)
    } else {
        magnitude
    }
}

/// 符号-幅值编码转有符号值（符号位以上的位被忽略）
#[inline]
pub fn from_sign_magnitude(raw: u16, sign_bit: u8) -> i32 {
    let magnitude = (raw as u32 & ((1u32 << sign_bit) - 1)) as i32;
    if raw & (1u16 << sign_bit) != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// 轮式模式速度编码（bit 15 为符号位，|speed| ≤ 10000）
pub fn encode_wheel_speed(speed: i32) -> Result<u16, ProtocolError> {
    if speed.unsigned_abs() > MAX_WHEEL_SPEED as u32 {
        return Err(ProtocolError::invalid_value("wheel_speed", speed));
    }
    Ok(to_sign_magnitude(speed, 15))
}

/// 布尔值转寄存器原始值
#[inline]
pub fn bool_to_raw(value: bool) -> u16 {
    value as u16
}

/// 寄存器原始值转布尔值：任何非零值均为 `true`
#[inline]
pub fn raw_to_bool(raw: u16) -> bool {
    raw != 0
}

/// 工作模式（寄存器 33）
///
/// 未知取值保留原始数字，不会导致读取失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum OperatingMode {
    /// 位置伺服模式
    Position = 0,
    /// 轮式（恒速）模式
    Wheel = 1,
    /// 开环 PWM 模式
    Pwm = 2,
    /// 步进模式
    Step = 3,
    #[num_enum(catch_all)]
    Unknown(u8),
}

/// 波特率索引（寄存器 6）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum BaudRate {
    B1000000 = 0,
    B500000 = 1,
    B250000 = 2,
    B128000 = 3,
    B115200 = 4,
    B76800 = 5,
    B57600 = 6,
    B38400 = 7,
}

impl BaudRate {
    pub const ALL: [BaudRate; 8] = [
        Self::B1000000,
        Self::B500000,
        Self::B250000,
        Self::B128000,
        Self::B115200,
        Self::B76800,
        Self::B57600,
        Self::B38400,
    ];

    /// 每秒比特数
    pub fn bps(self) -> u32 {
        match self {
            Self::B1000000 => 1_000_000,
            Self::B500000 => 500_000,
            Self::B250000 => 250_000,
            Self::B128000 => 128_000,
            Self::B115200 => 115_200,
            Self::B76800 => 76_800,
            Self::B57600 => 57_600,
            Self::B38400 => 38_400,
        }
    }

    pub fn from_bps(bps: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.bps() == bps)
    }

    /// 从寄存器索引（0..=7）构造
    pub fn from_index(index: u8) -> Result<Self, ProtocolError> {
        Self::try_from(index).map_err(|_| ProtocolError::invalid_value("baud_rate_index", index))
    }

    pub fn index(self) -> u8 {
        self.into()
    }
}

impl std::fmt::Display for BaudRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} bps", self.bps())
    }
}
