//! 指令码定义
//!
//! 每条指令对参数区有固定的形状要求，编码前由 [`Instruction::validate_params`] 检查。

use crate::{BROADCAST_ID, ProtocolError};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 请求帧指令码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Instruction {
    /// 查询舵机是否在线
    Ping = 0x01,
    /// 读寄存器：`[addr, len]`
    Read = 0x02,
    /// 写寄存器：`[addr, data...]`
    Write = 0x03,
    /// 异步写（等待 ACTION 触发）：`[addr, data...]`
    RegWrite = 0x04,
    /// 触发异步写
    Action = 0x05,
    /// 恢复出厂设置
    Reset = 0x06,
    /// 同步读：`[addr, len, id...]`
    SyncRead = 0x82,
    /// 同步写：`[addr, len, (id, data[len])...]`
    SyncWrite = 0x83,
}

impl Instruction {
    /// 该指令发往 `id` 时是否会产生单帧应答
    ///
    /// 广播帧和 SYNC_WRITE 没有应答；SYNC_READ 的应答是每个舵机各自的一帧，
    /// 由同步读解析单独处理。
    pub fn expects_status(self, id: u8) -> bool {
        id != BROADCAST_ID && !matches!(self, Self::SyncWrite | Self::SyncRead)
    }

    /// 校验参数区形状
    pub fn validate_params(self, params: &[u8]) -> Result<(), ProtocolError> {
        let invalid = |reason: String| ProtocolError::InvalidParams {
            instruction: self,
            reason,
        };

        match self {
            Self::Ping | Self::Action | Self::Reset => {
                if !params.is_empty() {
                    return Err(invalid(format!("expected no parameters, got {}", params.len())));
                }
            },
            Self::Read => {
                if params.len() != 2 {
                    return Err(invalid(format!(
                        "expected [address, length], got {} bytes",
                        params.len()
                    )));
                }
                if params[1] == 0 {
                    return Err(invalid("read length must be at least 1".to_string()));
                }
            },
            Self::Write | Self::RegWrite => {
                if params.len() < 2 {
                    return Err(invalid(format!(
                        "expected address and at least one data byte, got {} bytes",
                        params.len()
                    )));
                }
            },
            Self::SyncRead => {
                if params.len() < 3 {
                    return Err(invalid(format!(
                        "expected [address, length, id...], got {} bytes",
                        params.len()
                    )));
                }
                if params[1] == 0 {
                    return Err(invalid("read length must be at least 1".to_string()));
                }
            },
            Self::SyncWrite => {
                if params.len() < 4 {
                    return Err(invalid(format!(
                        "expected [address, length, id, data...], got {} bytes",
                        params.len()
                    )));
                }
                let data_len = params[1] as usize;
                if data_len == 0 {
                    return Err(invalid("data length must be at least 1".to_string()));
                }
                if (params.len() - 2) % (data_len + 1) != 0 {
                    return Err(invalid(format!(
                        "{} entry bytes are not a multiple of {}",
                        params.len() - 2,
                        data_len + 1
                    )));
                }
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_codes() {
        assert_eq!(u8::from(Instruction::Ping), 0x01);
        assert_eq!(u8::from(Instruction::SyncRead), 0x82);
        assert_eq!(Instruction::try_from(0x83).unwrap(), Instruction::SyncWrite);
        assert!(Instruction::try_from(0x07).is_err());
    }

    #[test]
    fn test_expects_status() {
        assert!(Instruction::Read.expects_status(1));
        assert!(Instruction::Ping.expects_status(0));
        assert!(!Instruction::Write.expects_status(BROADCAST_ID));
        assert!(!Instruction::SyncWrite.expects_status(BROADCAST_ID));
        assert!(!Instruction::SyncRead.expects_status(BROADCAST_ID));
    }

    #[test]
    fn test_validate_ping() {
        assert!(Instruction::Ping.validate_params(&[]).is_ok());
        assert!(Instruction::Ping.validate_params(&[1]).is_err());
    }

    #[test]
    fn test_validate_read() {
        assert!(Instruction::Read.validate_params(&[56, 2]).is_ok());
        assert!(Instruction::Read.validate_params(&[56]).is_err());
        assert!(Instruction::Read.validate_params(&[56, 0]).is_err());
        assert!(Instruction::Read.validate_params(&[56, 2, 0]).is_err());
    }

    #[test]
    fn test_validate_write() {
        assert!(Instruction::Write.validate_params(&[40, 1]).is_ok());
        assert!(Instruction::Write.validate_params(&[42, 0x00, 0x08]).is_ok());
        assert!(Instruction::Write.validate_params(&[40]).is_err());
    }

    #[test]
    fn test_validate_sync_write() {
        // addr=42, len=2, (1, lo, hi), (2, lo, hi)
        assert!(
            Instruction::SyncWrite
                .validate_params(&[42, 2, 1, 0x00, 0x08, 2, 0xFF, 0x0F])
                .is_ok()
        );
        // 最后一项缺一个数据字节
        let err = Instruction::SyncWrite
            .validate_params(&[42, 2, 1, 0x00, 0x08, 2, 0xFF])
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidParams {
                instruction: Instruction::SyncWrite,
                ..
            }
        ));
    }

    #[test]
    fn test_validate_sync_read() {
        assert!(Instruction::SyncRead.validate_params(&[56, 2, 1, 2, 3]).is_ok());
        assert!(Instruction::SyncRead.validate_params(&[56, 2]).is_err());
    }
}
