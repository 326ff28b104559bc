//! 帧编解码
//!
//! 编码：`encode(id, instruction, params)` 生成完整请求帧。
//! 解码：扫描帧头、读取声明长度、校验和验证。
//!
//! - [`decode`] 为严格解码：缓冲区从帧头开始且恰好是一帧
//! - [`decode_prefix`] 用于字节流：跳过噪声，返回第一帧及其结束位置，允许尾随字节

use crate::{
    BROADCAST_ID, FRAME_OVERHEAD, FramingError, HEADER, Instruction, MAX_PACKET_LEN,
    MAX_PARAMS_LEN, PKT_ID, PKT_INSTRUCTION, PKT_LENGTH, PKT_PARAMETER0, ProtocolError,
};
use bilge::prelude::*;

/// 已解码的帧
///
/// 请求帧中 `code` 为指令码，应答帧中 `code` 为舵机状态字节。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: u8,
    pub code: u8,
    pub params: Vec<u8>,
}

impl Frame {
    /// 按指令码解释 `code`
    pub fn instruction(&self) -> Result<Instruction, ProtocolError> {
        Instruction::try_from(self.code).map_err(|_| ProtocolError::UnknownInstruction(self.code))
    }

    /// 按状态字节解释 `code`
    pub fn status(&self) -> ServoStatus {
        ServoStatus::from(self.code)
    }

    /// 编码后的总字节数
    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.params.len()
    }

    /// 校验应答来自期望的舵机
    pub fn expect_id(self, expected: u8) -> Result<Self, ProtocolError> {
        if self.id != expected {
            return Err(ProtocolError::UnexpectedId {
                expected,
                actual: self.id,
            });
        }
        Ok(self)
    }
}

/// 解码结果：帧及其在输入缓冲区中的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub frame: Frame,
    /// 帧头第一个字节的下标
    pub start: usize,
    /// 帧末尾（不含）的下标
    pub end: usize,
}

/// 舵机状态字节
///
/// 位定义：
/// - Bit 0: 输入电压异常
/// - Bit 1: 角度传感器异常
/// - Bit 2: 过热
/// - Bit 3: 过流
/// - Bit 4: 保留
/// - Bit 5: 过载
/// - Bit 6-7: 保留
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServoStatus {
    pub voltage: bool,      // Bit 0: 输入电压异常
    pub angle_sensor: bool, // Bit 1: 角度传感器异常
    pub overheat: bool,     // Bit 2: 过热
    pub over_current: bool, // Bit 3: 过流
    pub reserved1: u1,      // Bit 4: 保留
    pub overload: bool,     // Bit 5: 过载
    pub reserved2: u2,      // Bit 6-7: 保留
}

impl ServoStatus {
    const FAULT_MASK: u8 = 0b0010_1111;

    /// 是否无故障位
    pub fn is_ok(&self) -> bool {
        u8::from(*self) & Self::FAULT_MASK == 0
    }

    /// 当前置位的故障名称
    pub fn faults(&self) -> Vec<&'static str> {
        let mut faults = Vec::new();
        if self.voltage() {
            faults.push("input voltage");
        }
        if self.angle_sensor() {
            faults.push("angle sensor");
        }
        if self.overheat() {
            faults.push("overheat");
        }
        if self.over_current() {
            faults.push("over current");
        }
        if self.overload() {
            faults.push("overload");
        }
        faults
    }
}

impl std::fmt::Display for ServoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_ok() {
            write!(f, "ok")
        } else {
            write!(f, "{}", self.faults().join(", "))
        }
    }
}

/// 计算校验和：`!(Σ body) & 0xFF`
///
/// `body` 为 ID 到最后一个参数字节（不含帧头和校验和本身）。
pub fn checksum(body: &[u8]) -> u8 {
    !body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// 编码请求帧
///
/// ID 必须在 0..=254 之内（254 为广播），参数形状必须符合指令要求。
pub fn encode(id: u8, instruction: Instruction, params: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if id > BROADCAST_ID {
        return Err(ProtocolError::InvalidId { id });
    }
    instruction.validate_params(params)?;
    encode_raw(id, instruction.into(), params)
}

/// 编码应答帧（舵机侧），供总线模拟器使用
pub fn encode_status(id: u8, status: u8, params: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if id > BROADCAST_ID {
        return Err(ProtocolError::InvalidId { id });
    }
    encode_raw(id, status, params)
}

fn encode_raw(id: u8, code: u8, params: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if params.len() > MAX_PARAMS_LEN {
        return Err(ProtocolError::PacketTooLong {
            len: params.len() + FRAME_OVERHEAD,
            max: MAX_PACKET_LEN,
        });
    }

    let mut packet = Vec::with_capacity(params.len() + FRAME_OVERHEAD);
    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.push((params.len() + 2) as u8);
    packet.push(code);
    packet.extend_from_slice(params);
    let sum = checksum(&packet[PKT_ID..]);
    packet.push(sum);
    Ok(packet)
}

/// 查找帧头
///
/// 0xFF 不是合法 ID，因此 `FF FF FF` 中真正的帧头从第二个 0xFF 开始。
/// 缓冲区以 `FF FF` 结尾时也返回其位置（帧被截断）。
pub(crate) fn find_header(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == HEADER[0] && bytes[i + 1] == HEADER[1] {
            match bytes.get(i + 2) {
                Some(&0xFF) => {},
                _ => return Some(i),
            }
        }
        i += 1;
    }
    None
}

/// 读取 `start` 处帧的声明长度，返回帧结束位置
fn frame_end(bytes: &[u8], start: usize) -> Result<usize, ProtocolError> {
    let available = bytes.len() - start;
    if available < PKT_PARAMETER0 {
        return Err(FramingError::Truncated {
            needed: FRAME_OVERHEAD,
            available,
        }
        .into());
    }

    let declared = bytes[start + PKT_LENGTH];
    if declared < 2 || declared as usize + PKT_INSTRUCTION > MAX_PACKET_LEN {
        return Err(FramingError::InvalidLength { declared }.into());
    }
    Ok(start + PKT_INSTRUCTION + declared as usize)
}

/// 解析 `start..end` 处的帧并校验
fn parse_at(bytes: &[u8], start: usize, end: usize) -> Result<Frame, ProtocolError> {
    let expected = checksum(&bytes[start + PKT_ID..end - 1]);
    let actual = bytes[end - 1];
    if expected != actual {
        return Err(ProtocolError::ChecksumMismatch { expected, actual });
    }

    Ok(Frame {
        id: bytes[start + PKT_ID],
        code: bytes[start + PKT_INSTRUCTION],
        params: bytes[start + PKT_PARAMETER0..end - 1].to_vec(),
    })
}

/// 从字节流中解码第一帧
///
/// 帧头前的噪声字节被跳过；帧后的字节保留给调用方（见 [`Decoded::end`]）。
pub fn decode_prefix(bytes: &[u8]) -> Result<Decoded, ProtocolError> {
    decode_from(bytes, 0)
}

pub(crate) fn decode_from(bytes: &[u8], from: usize) -> Result<Decoded, ProtocolError> {
    let start = find_header(bytes, from).ok_or(FramingError::HeaderNotFound)?;
    let end = frame_end(bytes, start)?;
    if bytes.len() < end {
        return Err(FramingError::Truncated {
            needed: end - start,
            available: bytes.len() - start,
        }
        .into());
    }
    let frame = parse_at(bytes, start, end)?;
    Ok(Decoded { frame, start, end })
}

/// 严格解码一帧
///
/// 帧头必须位于缓冲区开头，不在帧内部重新同步：ID 字节被破坏成 0xFF 时
/// 按校验和错误拒绝，而不是把 `FF FF` 之后的字节错位解释成另一帧。
/// 声明长度必须与帧头之后的实际字节数一致，否则返回 [`FramingError`]：
/// 字节不足为 `Truncated`，多余字节为 `LengthMismatch`。长度检查先于校验和。
pub fn decode(bytes: &[u8]) -> Result<Frame, ProtocolError> {
    if !bytes.starts_with(&HEADER) {
        return Err(FramingError::HeaderNotFound.into());
    }
    let end = frame_end(bytes, 0)?;

    if bytes.len() < end {
        return Err(FramingError::Truncated {
            needed: end,
            available: bytes.len(),
        }
        .into());
    }
    if bytes.len() > end {
        return Err(FramingError::LengthMismatch {
            declared: bytes[PKT_LENGTH] as usize,
            actual: bytes.len() - PKT_INSTRUCTION,
        }
        .into());
    }
    parse_at(bytes, 0, end)
}

/// 严格解码一帧并校验应答 ID
pub fn decode_response(bytes: &[u8], expected_id: u8) -> Result<Frame, ProtocolError> {
    decode(bytes)?.expect_id(expected_id)
}
