//! 同步读/写（批量帧）
//!
//! - SYNC_WRITE：一帧写多个舵机的同一寄存器，条目顺序即 [`ServoMap`] 顺序，无应答
//! - SYNC_READ：一帧请求多个舵机，每个舵机各自回复一帧状态帧
//!
//! 同步读的应答流按帧解析：损坏的子帧、未请求的 ID、长度不符的子帧都被跳过，
//! 缺失的舵机只是不出现在结果中。

use crate::frame::{decode_from, find_header};
use crate::{
    BROADCAST_ID, Instruction, ProtocolEnd, ProtocolError, Register, ServoMap, ServoStatus,
    encode, is_unicast_id,
};

fn check_ids(instruction: Instruction, ids: impl Iterator<Item = u8>) -> Result<(), ProtocolError> {
    let mut seen = [false; 256];
    let mut count = 0usize;
    for id in ids {
        if !is_unicast_id(id) {
            return Err(ProtocolError::InvalidId { id });
        }
        if seen[id as usize] {
            return Err(ProtocolError::InvalidParams {
                instruction,
                reason: format!("duplicate servo id {id}"),
            });
        }
        seen[id as usize] = true;
        count += 1;
    }
    if count == 0 {
        return Err(ProtocolError::InvalidParams {
            instruction,
            reason: "no servo ids".to_string(),
        });
    }
    Ok(())
}

/// SYNC_READ 参数：`[address, width, id...]`
pub fn sync_read_params(register: &Register, ids: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    check_ids(Instruction::SyncRead, ids.iter().copied())?;
    let mut params = Vec::with_capacity(2 + ids.len());
    params.extend_from_slice(&register.read_params());
    params.extend_from_slice(ids);
    Ok(params)
}

/// SYNC_WRITE 参数：`[address, width, (id, data[width])...]`
///
/// 每个条目的数据长度必须等于寄存器宽度。
pub fn sync_write_params(
    register: &Register,
    entries: &ServoMap<Vec<u8>>,
) -> Result<Vec<u8>, ProtocolError> {
    register.ensure_writable()?;
    check_ids(Instruction::SyncWrite, entries.ids())?;

    let width = register.width as usize;
    let mut params = Vec::with_capacity(2 + entries.len() * (width + 1));
    params.push(register.address);
    params.push(register.width);
    for (id, data) in entries.iter() {
        if data.len() != width {
            return Err(ProtocolError::InvalidLength {
                register: register.name,
                expected: width,
                actual: data.len(),
            });
        }
        params.push(id);
        params.extend_from_slice(data);
    }
    Ok(params)
}

/// 编码 SYNC_WRITE 帧：原始值按寄存器取值范围校验后编码
pub fn encode_sync_write(
    register: &Register,
    values: &ServoMap<u16>,
    end: ProtocolEnd,
) -> Result<Vec<u8>, ProtocolError> {
    let entries = values
        .iter()
        .map(|(id, raw)| register.encode(*raw, end).map(|bytes| (id, bytes)))
        .collect::<Result<ServoMap<_>, _>>()?;
    let params = sync_write_params(register, &entries)?;
    encode(BROADCAST_ID, Instruction::SyncWrite, &params)
}

/// 编码 SYNC_READ 帧
pub fn encode_sync_read(register: &Register, ids: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let params = sync_read_params(register, ids)?;
    encode(BROADCAST_ID, Instruction::SyncRead, &params)
}

/// 同步读应答解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReadReply {
    /// 每个应答舵机的数据（按到达顺序）
    pub data: ServoMap<Vec<u8>>,
    /// 每个应答舵机的状态字节
    pub status: ServoMap<ServoStatus>,
    /// 校验失败或帧长度非法的子帧数
    pub corrupted: usize,
    /// 未请求 ID、重复 ID 或数据长度不符而被忽略的子帧数
    pub ignored: usize,
}

impl SyncReadReply {
    /// 请求的 ID 中未应答的部分（保持请求顺序）
    pub fn missing(&self, ids: &[u8]) -> Vec<u8> {
        ids.iter().copied().filter(|id| !self.data.contains(*id)).collect()
    }

    /// 按请求顺序重排
    pub fn ordered(&self, ids: &[u8]) -> ServoMap<Vec<u8>> {
        ids.iter()
            .filter_map(|id| self.data.get(*id).map(|data| (*id, data.clone())))
            .collect()
    }
}

/// 解析同步读应答字节流
///
/// 每个 ID 只取第一个有效应答。损坏的子帧（包括声明长度超出流末尾、
/// 但其后还有其他帧头的子帧）只丢弃该子帧本身；流末尾不完整的帧被忽略。
pub fn parse_sync_read(stream: &[u8], ids: &[u8], data_len: usize) -> SyncReadReply {
    let mut reply = SyncReadReply::default();
    let mut offset = 0;

    while offset < stream.len() {
        match decode_from(stream, offset) {
            Ok(decoded) => {
                offset = decoded.end;
                let frame = decoded.frame;
                if ids.contains(&frame.id)
                    && !reply.data.contains(frame.id)
                    && frame.params.len() == data_len
                {
                    reply.status.insert(frame.id, frame.status());
                    reply.data.insert(frame.id, frame.params);
                } else {
                    reply.ignored += 1;
                }
            },
            Err(e) if e.is_incomplete() => {
                // 之后仍有帧头时该子帧的长度字节已损坏，跳过它继续解析
                let Some(start) = find_header(stream, offset) else {
                    break;
                };
                match find_header(stream, start + 2) {
                    Some(next) => {
                        reply.corrupted += 1;
                        offset = next;
                    },
                    None => break,
                }
            },
            Err(_) => {
                // 损坏的子帧：从该帧头之后继续寻找下一个帧头
                reply.corrupted += 1;
                match find_header(stream, offset) {
                    Some(start) => offset = start + 2,
                    None => break,
                }
            },
        }
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PKT_LENGTH;
    use crate::frame::encode_status;

    fn position_reply(id: u8, ticks: u16) -> Vec<u8> {
        encode_status(id, 0, &ticks.to_le_bytes()).unwrap()
    }

    #[test]
    fn test_sync_read_params() {
        let params = sync_read_params(&Register::PRESENT_POSITION, &[1, 2, 3]).unwrap();
        assert_eq!(params, vec![56, 2, 1, 2, 3]);
    }

    #[test]
    fn test_sync_read_params_rejects_bad_ids() {
        assert!(matches!(
            sync_read_params(&Register::PRESENT_POSITION, &[]),
            Err(ProtocolError::InvalidParams { .. })
        ));
        assert_eq!(
            sync_read_params(&Register::PRESENT_POSITION, &[1, BROADCAST_ID]).unwrap_err(),
            ProtocolError::InvalidId { id: BROADCAST_ID }
        );
        assert!(sync_read_params(&Register::PRESENT_POSITION, &[1, 1]).is_err());
    }

    #[test]
    fn test_encode_sync_write_follows_map_order() {
        let values: ServoMap<u16> = [(3, 0x0800), (1, 0x0FFF)].into();
        let packet =
            encode_sync_write(&Register::GOAL_POSITION, &values, ProtocolEnd::LowByteFirst)
                .unwrap();
        let frame = crate::decode(&packet).unwrap();
        assert_eq!(frame.id, BROADCAST_ID);
        assert_eq!(frame.code, 0x83);
        assert_eq!(frame.params, vec![42, 2, 3, 0x00, 0x08, 1, 0xFF, 0x0F]);
    }

    #[test]
    fn test_encode_sync_write_validates_values() {
        let values: ServoMap<u16> = [(1, 5000)].into();
        assert!(matches!(
            encode_sync_write(&Register::GOAL_POSITION, &values, ProtocolEnd::default()),
            Err(ProtocolError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_sync_write_params_rejects_read_only() {
        let entries: ServoMap<Vec<u8>> = [(1, vec![0, 0])].into();
        assert!(matches!(
            sync_write_params(&Register::PRESENT_POSITION, &entries),
            Err(ProtocolError::ReadOnly { .. })
        ));
    }

    #[test]
    fn test_parse_sync_read_all_present() {
        let mut stream = position_reply(1, 100);
        stream.extend(position_reply(2, 200));
        stream.extend(position_reply(3, 300));

        let reply = parse_sync_read(&stream, &[1, 2, 3], 2);
        assert_eq!(reply.data.len(), 3);
        assert_eq!(reply.data.get(2), Some(&200u16.to_le_bytes().to_vec()));
        assert!(reply.missing(&[1, 2, 3]).is_empty());
        assert_eq!(reply.corrupted, 0);
    }

    #[test]
    fn test_parse_sync_read_silent_device() {
        let mut stream = position_reply(1, 100);
        stream.extend(position_reply(3, 300));

        let reply = parse_sync_read(&stream, &[1, 2, 3], 2);
        assert_eq!(reply.data.ids().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(reply.missing(&[1, 2, 3]), vec![2]);
    }

    #[test]
    fn test_parse_sync_read_skips_corrupt_subframe() {
        let mut corrupt = position_reply(2, 200);
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;

        let mut stream = position_reply(1, 100);
        stream.extend(corrupt);
        stream.extend(position_reply(3, 300));

        let reply = parse_sync_read(&stream, &[1, 2, 3], 2);
        assert_eq!(reply.data.ids().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(reply.corrupted, 1);
    }

    #[test]
    fn test_parse_sync_read_ignores_unrequested_and_duplicates() {
        let mut stream = position_reply(9, 900);
        stream.extend(position_reply(1, 100));
        stream.extend(position_reply(1, 111));
        stream.extend(encode_status(2, 0, &[0x01]).unwrap());

        let reply = parse_sync_read(&stream, &[1, 2], 2);
        assert_eq!(reply.data.ids().collect::<Vec<_>>(), vec![1]);
        assert_eq!(reply.data.get(1), Some(&100u16.to_le_bytes().to_vec()));
        assert_eq!(reply.ignored, 3);
    }

    #[test]
    fn test_parse_sync_read_truncated_tail() {
        let mut stream = position_reply(1, 100);
        let second = position_reply(2, 200);
        stream.extend_from_slice(&second[..4]);

        let reply = parse_sync_read(&stream, &[1, 2], 2);
        assert_eq!(reply.data.ids().collect::<Vec<_>>(), vec![1]);
        assert_eq!(reply.corrupted, 0);
    }

    #[test]
    fn test_parse_sync_read_length_overrun_keeps_later_replies() {
        let mut overrun = position_reply(2, 200);
        overrun[PKT_LENGTH] = 0x40;

        let mut stream = position_reply(1, 100);
        stream.extend(overrun);
        stream.extend(position_reply(3, 300));
        stream.extend(position_reply(4, 400));

        let reply = parse_sync_read(&stream, &[1, 2, 3, 4], 2);
        assert_eq!(reply.data.ids().collect::<Vec<_>>(), vec![1, 3, 4]);
        assert_eq!(reply.missing(&[1, 2, 3, 4]), vec![2]);
        assert_eq!(reply.corrupted, 1);
    }

    #[test]
    fn test_ordered_follows_request() {
        let mut stream = position_reply(3, 300);
        stream.extend(position_reply(1, 100));
        let reply = parse_sync_read(&stream, &[1, 3], 2);
        assert_eq!(reply.ordered(&[1, 3]).ids().collect::<Vec<_>>(), vec![1, 3]);
    }
}
