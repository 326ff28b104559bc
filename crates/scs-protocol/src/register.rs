//! 寄存器表
//!
//! 每个寄存器是一个静态条目：名称、起始地址、宽度（1 或 2 字节）、
//! 访问权限、是否位于 EEPROM 以及原始值取值范围。
//!
//! 多字节寄存器按连接的 [`ProtocolEnd`] 编解码，编码与解码对称。

use crate::units::{from_sign_magnitude, to_sign_magnitude};
use crate::{ProtocolEnd, ProtocolError};

/// 访问权限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// 原始值取值范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawDomain {
    /// 无符号闭区间
    Range { min: u16, max: u16 },
    /// 符号-幅值编码
    SignMagnitude { sign_bit: u8, max_magnitude: u16 },
}

/// 寄存器定义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub name: &'static str,
    pub address: u8,
    pub width: u8,
    pub access: Access,
    /// 位于 EEPROM（写入前需解锁）
    pub eeprom: bool,
    pub domain: RawDomain,
}

const fn range(min: u16, max: u16) -> RawDomain {
    RawDomain::Range { min, max }
}

const fn reg(
    name: &'static str,
    address: u8,
    width: u8,
    access: Access,
    eeprom: bool,
    domain: RawDomain,
) -> Register {
    Register {
        name,
        address,
        width,
        access,
        eeprom,
        domain,
    }
}

use Access::{ReadOnly as R, ReadWrite as RW};

impl Register {
    // EEPROM 区
    pub const MODEL_NUMBER: Register = reg("model_number", 3, 2, R, true, range(0, u16::MAX));
    pub const ID: Register = reg("id", 5, 1, RW, true, range(0, 253));
    pub const BAUD_RATE: Register = reg("baud_rate", 6, 1, RW, true, range(0, 7));
    pub const MIN_ANGLE_LIMIT: Register = reg("min_angle_limit", 9, 2, RW, true, range(0, 4095));
    pub const MAX_ANGLE_LIMIT: Register = reg("max_angle_limit", 11, 2, RW, true, range(0, 4095));
    pub const OPERATING_MODE: Register = reg("mode", 33, 1, RW, true, range(0, 3));

    // SRAM 区
    pub const TORQUE_ENABLE: Register = reg("torque_enable", 40, 1, RW, false, range(0, 1));
    pub const ACCELERATION: Register = reg("acceleration", 41, 1, RW, false, range(0, 254));
    pub const GOAL_POSITION: Register = reg("goal_position", 42, 2, RW, false, range(0, 4095));
    pub const GOAL_TIME: Register = reg("goal_time", 44, 2, RW, false, range(0, u16::MAX));
    pub const GOAL_SPEED: Register = reg(
        "goal_speed",
        46,
        2,
        RW,
        false,
        RawDomain::SignMagnitude {
            sign_bit: 15,
            max_magnitude: 0x7FFF,
        },
    );
    pub const LOCK: Register = reg("lock", 55, 1, RW, false, range(0, 1));
    pub const PRESENT_POSITION: Register =
        reg("present_position", 56, 2, R, false, range(0, 4095));
    pub const PRESENT_SPEED: Register = reg(
        "present_speed",
        58,
        2,
        R,
        false,
        RawDomain::SignMagnitude {
            sign_bit: 15,
            max_magnitude: 0x7FFF,
        },
    );
    pub const PRESENT_LOAD: Register = reg(
        "present_load",
        60,
        2,
        R,
        false,
        RawDomain::SignMagnitude {
            sign_bit: 10,
            max_magnitude: 1000,
        },
    );
    pub const PRESENT_VOLTAGE: Register = reg("present_voltage", 62, 1, R, false, range(0, 255));
    pub const PRESENT_TEMPERATURE: Register =
        reg("present_temperature", 63, 1, R, false, range(0, 255));
    pub const MOVING: Register = reg("moving", 66, 1, R, false, range(0, 1));
    pub const PRESENT_CURRENT: Register =
        reg("present_current", 69, 2, R, false, range(0, u16::MAX));

    /// 全部寄存器（按地址排序）
    pub const ALL: &'static [Register] = &[
        Self::MODEL_NUMBER,
        Self::ID,
        Self::BAUD_RATE,
        Self::MIN_ANGLE_LIMIT,
        Self::MAX_ANGLE_LIMIT,
        Self::OPERATING_MODE,
        Self::TORQUE_ENABLE,
        Self::ACCELERATION,
        Self::GOAL_POSITION,
        Self::GOAL_TIME,
        Self::GOAL_SPEED,
        Self::LOCK,
        Self::PRESENT_POSITION,
        Self::PRESENT_SPEED,
        Self::PRESENT_LOAD,
        Self::PRESENT_VOLTAGE,
        Self::PRESENT_TEMPERATURE,
        Self::MOVING,
        Self::PRESENT_CURRENT,
    ];

    /// 按名称查找（忽略大小写，`-` 与 `_` 等价）
    pub fn by_name(name: &str) -> Option<Register> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.iter().copied().find(|r| r.name == normalized)
    }

    pub fn by_address(address: u8) -> Option<Register> {
        Self::ALL.iter().copied().find(|r| r.address == address)
    }

    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }

    pub fn ensure_writable(&self) -> Result<(), ProtocolError> {
        if !self.is_writable() {
            return Err(ProtocolError::ReadOnly {
                register: self.name,
            });
        }
        Ok(())
    }

    /// READ 指令参数：`[address, width]`
    pub fn read_params(&self) -> [u8; 2] {
        [self.address, self.width]
    }

    /// 校验原始值是否在取值范围内
    pub fn validate_raw(&self, raw: u16) -> Result<u16, ProtocolError> {
        let ok = match self.domain {
            RawDomain::Range { min, max } => (min..=max).contains(&raw),
            RawDomain::SignMagnitude {
                sign_bit,
                max_magnitude,
            } => {
                let above_sign = if sign_bit >= 15 { 0 } else { raw >> (sign_bit + 1) };
                above_sign == 0
                    && from_sign_magnitude(raw, sign_bit).unsigned_abs() <= max_magnitude as u32
            },
        };
        if !ok {
            return Err(ProtocolError::invalid_value(self.name, raw));
        }
        Ok(raw)
    }

    /// 原始值编码为线上字节（宽度 1 或 2）
    pub fn encode(&self, raw: u16, end: ProtocolEnd) -> Result<Vec<u8>, ProtocolError> {
        let raw = self.validate_raw(raw)?;
        match self.width {
            1 => {
                let byte =
                    u8::try_from(raw).map_err(|_| ProtocolError::invalid_value(self.name, raw))?;
                Ok(vec![byte])
            },
            _ => Ok(end.word_to_bytes(raw).to_vec()),
        }
    }

    /// 有符号领域值编码为线上字节
    ///
    /// 符号-幅值寄存器按符号位编码；无符号寄存器拒绝负值。
    pub fn encode_signed(&self, value: i32, end: ProtocolEnd) -> Result<Vec<u8>, ProtocolError> {
        let raw = match self.domain {
            RawDomain::SignMagnitude {
                sign_bit,
                max_magnitude,
            } => {
                if value.unsigned_abs() > max_magnitude as u32 {
                    return Err(ProtocolError::invalid_value(self.name, value));
                }
                to_sign_magnitude(value, sign_bit)
            },
            RawDomain::Range { .. } => {
                u16::try_from(value).map_err(|_| ProtocolError::invalid_value(self.name, value))?
            },
        };
        self.encode(raw, end)
    }

    /// 线上字节解码为原始值
    ///
    /// 读回值不做取值范围检查（舵机返回什么就是什么）。
    pub fn decode(&self, data: &[u8], end: ProtocolEnd) -> Result<u16, ProtocolError> {
        match *data {
            [b] if self.width == 1 => Ok(b as u16),
            [a, b] if self.width == 2 => Ok(end.bytes_to_word([a, b])),
            _ => Err(ProtocolError::InvalidLength {
                register: self.name,
                expected: self.width as usize,
                actual: data.len(),
            }),
        }
    }

    /// 线上字节解码为有符号领域值
    pub fn decode_signed(&self, data: &[u8], end: ProtocolEnd) -> Result<i32, ProtocolError> {
        let raw = self.decode(data, end)?;
        Ok(match self.domain {
            RawDomain::SignMagnitude { sign_bit, .. } => from_sign_magnitude(raw, sign_bit),
            RawDomain::Range { .. } => raw as i32,
        })
    }

    /// WRITE 指令参数：`[address, data...]`
    pub fn write_params(&self, raw: u16, end: ProtocolEnd) -> Result<Vec<u8>, ProtocolError> {
        self.ensure_writable()?;
        let mut params = Vec::with_capacity(1 + self.width as usize);
        params.push(self.address);
        params.extend(self.encode(raw, end)?);
        Ok(params)
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.address)
    }
}
