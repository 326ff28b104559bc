//! 协议常量定义

/// 帧头（同步字节）
pub const HEADER: [u8; 2] = [0xFF, 0xFF];

/// 广播 ID：所有舵机接收，不产生应答
pub const BROADCAST_ID: u8 = 0xFE;

/// 可单独寻址的最大 ID
pub const MAX_SERVO_ID: u8 = 0xFD;

// 帧内偏移量
pub const PKT_HEADER0: usize = 0;
pub const PKT_HEADER1: usize = 1;
pub const PKT_ID: usize = 2;
pub const PKT_LENGTH: usize = 3;
/// 请求帧为指令码，应答帧为状态字节
pub const PKT_INSTRUCTION: usize = 4;
pub const PKT_PARAMETER0: usize = 5;

/// 单帧最大字节数
pub const MAX_PACKET_LEN: usize = 250;

/// 帧头 + ID + LEN + 指令/状态 + 校验和
pub const FRAME_OVERHEAD: usize = 6;

/// 单帧最多可携带的参数字节数
pub const MAX_PARAMS_LEN: usize = MAX_PACKET_LEN - FRAME_OVERHEAD;

/// 默认链路波特率
pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

/// 校验 ID 是否可单独寻址（0..=253）
#[inline]
pub fn is_unicast_id(id: u8) -> bool {
    id <= MAX_SERVO_ID
}
