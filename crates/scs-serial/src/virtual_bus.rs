//! 进程内舵机总线模拟器
//!
//! [`VirtualBus`] 模拟一条挂有多个舵机的半双工总线，可作为传输后端用于测试与离线使用：
//!
//! - 每个舵机一份 256 字节寄存器文件（STS3215 默认值）
//! - 舵机按自身波特率寄存器监听，只有与主机链路速率一致时才能收发
//! - 写入波特率寄存器后，舵机先以旧速率应答，再切换到新速率
//! - 应答帧 ID 为请求寻址的 ID（修改 ID 的写操作以旧 ID 应答）
//! - 可注入：静默舵机、请求丢失、应答故障（校验和、截断、数据长度）、冒名应答、应答延迟、设备不可用
//! - 主机写出的每一帧都记录在带时间戳的写日志中
//!
//! ```
//! use scs_serial::{LinkOptions, TransportSession, VirtualBus};
//!
//! let bus = VirtualBus::new().with_servo(1).with_servo(2);
//! let mut session = TransportSession::new(bus.connector());
//! session.open(LinkOptions::default()).unwrap();
//! assert_eq!(bus.servo_ids(), vec![1, 2]);
//! ```

use crate::{BusAdapter, Connector, LinkOptions, SerialDeviceError, SerialDeviceErrorKind, SerialError};
use parking_lot::Mutex;
use scs_protocol::frame::encode_status;
use scs_protocol::{BROADCAST_ID, BaudRate, Frame, Instruction, Register, decode_prefix};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const REGISTER_COUNT: usize = 256;

/// STS3215 型号
pub const DEFAULT_MODEL_NUMBER: u16 = 777;

/// EEPROM 区上界（地址 < 40 为 EEPROM）
const EEPROM_END: u8 = 40;

/// 主机写日志条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    /// 写入时刻
    pub at: Instant,
    /// 写入时的主机链路速率
    pub baud_rate: u32,
    pub bytes: Vec<u8>,
}

/// 注入到舵机应答中的故障
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFault {
    /// 请求在线路上丢失：舵机既不执行也不应答
    Lost,
    /// 校验和取反
    Checksum,
    /// 丢掉最后一个字节（帧不完整）
    Truncated,
    /// 多带一个数据字节，校验和仍正确
    ExtraData,
}

/// 故障注入计划：先正常处理 `skip` 个请求，再对 `count` 个请求注入 `fault`
#[derive(Debug, Clone, Copy)]
struct FaultPlan {
    skip: usize,
    fault: ReplyFault,
    count: usize,
}

#[derive(Debug, Clone)]
struct VirtualServo {
    registers: [u8; REGISTER_COUNT],
    pending_write: Option<(u8, Vec<u8>)>,
    silent: bool,
    reply_fault: Option<FaultPlan>,
    reply_as: Option<u8>,
    /// 锁定状态下写 EEPROM 区的次数
    locked_eeprom_writes: usize,
}

impl VirtualServo {
    fn new(id: u8) -> Self {
        let mut servo = Self {
            registers: [0u8; REGISTER_COUNT],
            pending_write: None,
            silent: false,
            reply_fault: None,
            reply_as: None,
            locked_eeprom_writes: 0,
        };
        servo.reset(id);
        servo
    }

    fn reset(&mut self, id: u8) {
        self.registers = [0u8; REGISTER_COUNT];
        self.set_word(Register::MODEL_NUMBER.address, DEFAULT_MODEL_NUMBER);
        self.registers[Register::ID.address as usize] = id;
        self.registers[Register::BAUD_RATE.address as usize] = BaudRate::B1000000.index();
        self.set_word(Register::MIN_ANGLE_LIMIT.address, 0);
        self.set_word(Register::MAX_ANGLE_LIMIT.address, 4095);
        self.registers[Register::LOCK.address as usize] = 1;
        self.registers[Register::PRESENT_VOLTAGE.address as usize] = 74;
        self.registers[Register::PRESENT_TEMPERATURE.address as usize] = 30;
        self.set_word(Register::GOAL_POSITION.address, 2048);
        self.set_word(Register::PRESENT_POSITION.address, 2048);
    }

    /// 每个寻址到本舵机的请求调用一次
    fn take_fault(&mut self) -> Option<ReplyFault> {
        let plan = self.reply_fault.as_mut()?;
        if plan.skip > 0 {
            plan.skip -= 1;
            return None;
        }
        let fault = plan.fault;
        plan.count -= 1;
        if plan.count == 0 {
            self.reply_fault = None;
        }
        Some(fault)
    }

    fn id(&self) -> u8 {
        self.registers[Register::ID.address as usize]
    }

    fn baud_bps(&self) -> Option<u32> {
        BaudRate::from_index(self.registers[Register::BAUD_RATE.address as usize])
            .ok()
            .map(BaudRate::bps)
    }

    fn word(&self, address: u8) -> u16 {
        let a = address as usize;
        u16::from_le_bytes([self.registers[a], self.registers[(a + 1) % REGISTER_COUNT]])
    }

    fn set_word(&mut self, address: u8, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        let a = address as usize;
        self.registers[a] = lo;
        self.registers[(a + 1) % REGISTER_COUNT] = hi;
    }

    fn read(&self, address: u8, len: u8) -> Option<Vec<u8>> {
        let start = address as usize;
        let end = start + len as usize;
        (end <= REGISTER_COUNT).then(|| self.registers[start..end].to_vec())
    }

    fn write(&mut self, address: u8, data: &[u8]) -> bool {
        let start = address as usize;
        let end = start + data.len();
        if end > REGISTER_COUNT {
            return false;
        }
        if address < EEPROM_END && self.registers[Register::LOCK.address as usize] != 0 {
            self.locked_eeprom_writes += 1;
        }
        self.registers[start..end].copy_from_slice(data);

        // 位置模式下目标位置立即到达
        let goal = Register::GOAL_POSITION.address as usize;
        if (start..end).contains(&goal) || (start..end).contains(&(goal + 1)) {
            let target = self.word(Register::GOAL_POSITION.address);
            self.set_word(Register::PRESENT_POSITION.address, target);
        }
        true
    }
}

struct QueuedReply {
    ready_at: Instant,
    bytes: Vec<u8>,
}

struct BusState {
    servos: Vec<VirtualServo>,
    host_baud: u32,
    claimed: bool,
    unavailable: bool,
    latency: Duration,
    rx: VecDeque<QueuedReply>,
    write_log: Vec<WriteRecord>,
}

impl BusState {
    fn new() -> Self {
        Self {
            servos: Vec::new(),
            host_baud: BaudRate::B1000000.bps(),
            claimed: false,
            unavailable: false,
            latency: Duration::ZERO,
            rx: VecDeque::new(),
            write_log: Vec::new(),
        }
    }

    fn servo_mut(&mut self, id: u8) -> Option<&mut VirtualServo> {
        self.servos.iter_mut().find(|s| s.id() == id)
    }

    fn servo(&self, id: u8) -> Option<&VirtualServo> {
        self.servos.iter().find(|s| s.id() == id)
    }

    /// 能否与主机通信（在线且波特率一致）
    fn hears(servo: &VirtualServo, host_baud: u32) -> bool {
        !servo.silent && servo.baud_bps() == Some(host_baud)
    }

    fn reply(
        servo: &VirtualServo,
        addressed_id: u8,
        params: &[u8],
        fault: Option<ReplyFault>,
    ) -> Option<Vec<u8>> {
        let id = servo.reply_as.unwrap_or(addressed_id);
        let mut bytes = match fault {
            Some(ReplyFault::ExtraData) => {
                let mut padded = params.to_vec();
                padded.push(0);
                encode_status(id, 0, &padded).ok()?
            },
            _ => encode_status(id, 0, params).ok()?,
        };
        match fault {
            Some(ReplyFault::Checksum) => {
                if let Some(last) = bytes.last_mut() {
                    *last ^= 0xFF;
                }
            },
            Some(ReplyFault::Truncated) => {
                bytes.pop();
            },
            _ => {},
        }
        Some(bytes)
    }

    fn handle_write(&mut self, bytes: &[u8]) {
        self.write_log.push(WriteRecord {
            at: Instant::now(),
            baud_rate: self.host_baud,
            bytes: bytes.to_vec(),
        });

        let mut offset = 0;
        while offset < bytes.len() {
            match decode_prefix(&bytes[offset..]) {
                Ok(decoded) => {
                    offset += decoded.end;
                    let replies = self.process(&decoded.frame);
                    if !replies.is_empty() {
                        let ready_at = Instant::now() + self.latency;
                        self.rx.push_back(QueuedReply {
                            ready_at,
                            bytes: replies,
                        });
                    }
                },
                Err(e) => {
                    trace!("Virtual bus ignored bytes: {}", e);
                    break;
                },
            }
        }
    }

    /// 处理一帧请求，返回应答字节（可能为空）
    fn process(&mut self, frame: &Frame) -> Vec<u8> {
        let host_baud = self.host_baud;
        let Ok(instruction) = frame.instruction() else {
            return Vec::new();
        };
        if instruction.validate_params(&frame.params).is_err() {
            return Vec::new();
        }

        match instruction {
            Instruction::SyncWrite => {
                self.process_sync_write(&frame.params);
                Vec::new()
            },
            Instruction::SyncRead => self.process_sync_read(&frame.params),
            _ if frame.id == BROADCAST_ID => {
                for servo in self.servos.iter_mut().filter(|s| Self::hears(s, host_baud)) {
                    Self::apply(servo, instruction, &frame.params);
                }
                Vec::new()
            },
            _ => {
                let Some(servo) = self.servo_mut(frame.id) else {
                    return Vec::new();
                };
                if !Self::hears(servo, host_baud) {
                    return Vec::new();
                }
                let fault = servo.take_fault();
                if fault == Some(ReplyFault::Lost) {
                    return Vec::new();
                }
                let data = match instruction {
                    Instruction::Read => match servo.read(frame.params[0], frame.params[1]) {
                        Some(data) => data,
                        None => return Vec::new(),
                    },
                    _ => Vec::new(),
                };
                // 先生成应答，再应用写入（ID 与波特率变更在应答之后生效）
                let reply = Self::reply(servo, frame.id, &data, fault);
                Self::apply(servo, instruction, &frame.params);
                reply.unwrap_or_default()
            },
        }
    }

    fn apply(servo: &mut VirtualServo, instruction: Instruction, params: &[u8]) {
        match instruction {
            Instruction::Write => {
                servo.write(params[0], &params[1..]);
            },
            Instruction::RegWrite => {
                servo.pending_write = Some((params[0], params[1..].to_vec()));
            },
            Instruction::Action => {
                if let Some((address, data)) = servo.pending_write.take() {
                    servo.write(address, &data);
                }
            },
            Instruction::Reset => {
                let id = servo.id();
                servo.reset(id);
            },
            _ => {},
        }
    }

    fn process_sync_write(&mut self, params: &[u8]) {
        let address = params[0];
        let len = params[1] as usize;
        let host_baud = self.host_baud;
        for entry in params[2..].chunks_exact(len + 1) {
            if let Some(servo) = self.servo_mut(entry[0])
                && Self::hears(servo, host_baud)
            {
                servo.write(address, &entry[1..]);
            }
        }
    }

    fn process_sync_read(&mut self, params: &[u8]) -> Vec<u8> {
        let (address, len) = (params[0], params[1]);
        let host_baud = self.host_baud;
        let mut stream = Vec::new();
        for &id in &params[2..] {
            let Some(servo) = self.servo_mut(id) else {
                continue;
            };
            if !Self::hears(servo, host_baud) {
                continue;
            }
            let fault = servo.take_fault();
            if fault == Some(ReplyFault::Lost) {
                continue;
            }
            if let Some(data) = servo.read(address, len)
                && let Some(reply) = Self::reply(servo, id, &data, fault)
            {
                stream.extend(reply);
            }
        }
        stream
    }
}

/// 虚拟总线（可克隆，共享同一状态）
#[derive(Clone)]
pub struct VirtualBus {
    state: Arc<Mutex<BusState>>,
}

impl Default for VirtualBus {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState::new())),
        }
    }

    /// 添加一个使用默认寄存器值的舵机（链式）
    pub fn with_servo(self, id: u8) -> Self {
        self.add_servo(id);
        self
    }

    /// 添加舵机；已存在同 ID 舵机时也会添加（模拟 ID 冲突）
    pub fn add_servo(&self, id: u8) {
        self.state.lock().servos.push(VirtualServo::new(id));
    }

    /// 当前总线上各舵机的 ID（按添加顺序）
    pub fn servo_ids(&self) -> Vec<u8> {
        self.state.lock().servos.iter().map(VirtualServo::id).collect()
    }

    pub fn connector(&self) -> VirtualConnector {
        VirtualConnector { bus: self.clone() }
    }

    /// 静默舵机：不接收也不应答
    pub fn set_silent(&self, id: u8, silent: bool) {
        if let Some(servo) = self.state.lock().servo_mut(id) {
            servo.silent = silent;
        }
    }

    /// 损坏接下来 `count` 个应答的校验和
    pub fn corrupt_next_replies(&self, id: u8, count: usize) {
        self.inject_reply_fault(id, ReplyFault::Checksum, count);
    }

    /// 对接下来 `count` 个寻址到该舵机的请求注入故障（覆盖之前未消耗的注入）
    pub fn inject_reply_fault(&self, id: u8, fault: ReplyFault, count: usize) {
        self.inject_reply_fault_after(id, 0, fault, count);
    }

    /// 先正常处理 `skip` 个请求，再注入 `count` 次故障
    pub fn inject_reply_fault_after(&self, id: u8, skip: usize, fault: ReplyFault, count: usize) {
        if let Some(servo) = self.state.lock().servo_mut(id) {
            servo.reply_fault = (count > 0).then_some(FaultPlan { skip, fault, count });
        }
    }

    /// 让舵机以另一个 ID 应答
    pub fn set_reply_id(&self, id: u8, reply_as: Option<u8>) {
        if let Some(servo) = self.state.lock().servo_mut(id) {
            servo.reply_as = reply_as;
        }
    }

    /// 应答延迟
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// 模拟设备无法打开
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// 设备当前是否被某个连接占用
    pub fn is_claimed(&self) -> bool {
        self.state.lock().claimed
    }

    pub fn host_baud(&self) -> u32 {
        self.state.lock().host_baud
    }

    /// 舵机当前监听的波特率
    pub fn servo_baud(&self, id: u8) -> Option<u32> {
        self.state.lock().servo(id).and_then(VirtualServo::baud_bps)
    }

    pub fn register(&self, id: u8, address: u8) -> Option<u8> {
        self.state
            .lock()
            .servo(id)
            .map(|s| s.registers[address as usize])
    }

    /// 读取 2 字节寄存器（低字节在前）
    pub fn register_word(&self, id: u8, address: u8) -> Option<u16> {
        self.state.lock().servo(id).map(|s| s.word(address))
    }

    pub fn set_register(&self, id: u8, address: u8, value: u8) {
        if let Some(servo) = self.state.lock().servo_mut(id) {
            servo.registers[address as usize] = value;
        }
    }

    /// 写入 2 字节寄存器（低字节在前）
    pub fn set_register_word(&self, id: u8, address: u8, value: u16) {
        if let Some(servo) = self.state.lock().servo_mut(id) {
            servo.set_word(address, value);
        }
    }

    /// 锁定状态下写入 EEPROM 区的次数
    pub fn locked_eeprom_writes(&self, id: u8) -> usize {
        self.state
            .lock()
            .servo(id)
            .map_or(0, |s| s.locked_eeprom_writes)
    }

    /// 主机写日志快照
    pub fn write_log(&self) -> Vec<WriteRecord> {
        self.state.lock().write_log.clone()
    }

    pub fn clear_write_log(&self) {
        self.state.lock().write_log.clear();
    }
}

impl std::fmt::Debug for VirtualBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualBus")
            .field("servos", &self.servo_ids())
            .field("host_baud", &self.host_baud())
            .finish()
    }
}

/// 虚拟总线连接器
#[derive(Debug, Clone)]
pub struct VirtualConnector {
    bus: VirtualBus,
}

impl Connector for VirtualConnector {
    fn connect(&mut self, options: &LinkOptions) -> Result<Box<dyn BusAdapter>, SerialError> {
        let mut state = self.bus.state.lock();
        if state.unavailable {
            return Err(SerialDeviceError::new(
                SerialDeviceErrorKind::NoDevice,
                "virtual bus unavailable",
            )
            .into());
        }
        if state.claimed {
            return Err(SerialDeviceError::new(
                SerialDeviceErrorKind::Busy,
                "virtual bus already claimed",
            )
            .into());
        }
        state.claimed = true;
        state.host_baud = options.baud_rate;
        state.rx.clear();
        debug!("Virtual bus claimed at {} bps", options.baud_rate);

        Ok(Box::new(VirtualPort {
            bus: self.bus.clone(),
        }))
    }

    fn describe(&self) -> String {
        "virtual-bus".to_string()
    }
}

/// 虚拟总线的已打开端口
struct VirtualPort {
    bus: VirtualBus,
}

impl BusAdapter for VirtualPort {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.bus.state.lock().handle_write(bytes);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SerialError> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut state = self.bus.state.lock();
                let now = Instant::now();
                if let Some(front) = state.rx.front_mut()
                    && front.ready_at <= now
                {
                    let n = front.bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&front.bytes[..n]);
                    front.bytes.drain(..n);
                    if front.bytes.is_empty() {
                        state.rx.pop_front();
                    }
                    return Ok(n);
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SerialError::Timeout);
            }
            std::thread::sleep((deadline - now).min(Duration::from_micros(200)));
        }
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        self.bus.state.lock().rx.clear();
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), SerialError> {
        self.bus.state.lock().host_baud = baud_rate;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.bus.host_baud()
    }
}

impl Drop for VirtualPort {
    fn drop(&mut self) {
        self.bus.state.lock().claimed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scs_protocol::{decode, encode};

    fn open(bus: &VirtualBus) -> Box<dyn BusAdapter> {
        bus.connector().connect(&LinkOptions::default()).unwrap()
    }

    fn transact(port: &mut Box<dyn BusAdapter>, packet: &[u8]) -> Result<Frame, SerialError> {
        port.write_all(packet)?;
        let mut buf = Vec::new();
        port.read_until(
            &mut buf,
            &mut |b: &[u8]| decode_prefix(b).is_ok(),
            Duration::from_millis(20),
        )?;
        Ok(decode(&buf).unwrap())
    }

    #[test]
    fn test_ping_reply() {
        let bus = VirtualBus::new().with_servo(1);
        let mut port = open(&bus);
        let reply = transact(&mut port, &encode(1, Instruction::Ping, &[]).unwrap()).unwrap();
        assert_eq!(reply.id, 1);
        assert!(reply.params.is_empty());
    }

    #[test]
    fn test_read_default_position() {
        let bus = VirtualBus::new().with_servo(1);
        let mut port = open(&bus);
        let reply = transact(&mut port, &encode(1, Instruction::Read, &[56, 2]).unwrap()).unwrap();
        assert_eq!(reply.params, 2048u16.to_le_bytes().to_vec());
    }

    #[test]
    fn test_write_goal_moves_present_position() {
        let bus = VirtualBus::new().with_servo(1);
        let mut port = open(&bus);
        transact(&mut port, &encode(1, Instruction::Write, &[42, 0x00, 0x04]).unwrap()).unwrap();
        assert_eq!(bus.register_word(1, 56), Some(1024));
    }

    #[test]
    fn test_broadcast_write_has_no_reply() {
        let bus = VirtualBus::new().with_servo(1).with_servo(2);
        let mut port = open(&bus);
        let result = transact(
            &mut port,
            &encode(BROADCAST_ID, Instruction::Write, &[40, 1]).unwrap(),
        );
        assert!(matches!(result, Err(SerialError::Timeout)));
        assert_eq!(bus.register(1, 40), Some(1));
        assert_eq!(bus.register(2, 40), Some(1));
    }

    #[test]
    fn test_silent_servo() {
        let bus = VirtualBus::new().with_servo(1);
        bus.set_silent(1, true);
        let mut port = open(&bus);
        let result = transact(&mut port, &encode(1, Instruction::Ping, &[]).unwrap());
        assert!(matches!(result, Err(SerialError::Timeout)));
    }

    #[test]
    fn test_baud_change_takes_effect_after_reply() {
        let bus = VirtualBus::new().with_servo(5);
        let mut port = open(&bus);
        // 波特率索引 4 = 115200
        let reply = transact(&mut port, &encode(5, Instruction::Write, &[6, 4]).unwrap()).unwrap();
        assert_eq!(reply.id, 5);
        assert_eq!(bus.servo_baud(5), Some(115_200));

        let result = transact(&mut port, &encode(5, Instruction::Ping, &[]).unwrap());
        assert!(matches!(result, Err(SerialError::Timeout)));

        port.set_baud_rate(115_200).unwrap();
        assert!(transact(&mut port, &encode(5, Instruction::Ping, &[]).unwrap()).is_ok());
    }

    #[test]
    fn test_id_change_replies_with_old_id() {
        let bus = VirtualBus::new().with_servo(1);
        let mut port = open(&bus);
        let reply = transact(&mut port, &encode(1, Instruction::Write, &[5, 9]).unwrap()).unwrap();
        assert_eq!(reply.id, 1);
        assert_eq!(bus.servo_ids(), vec![9]);
    }

    #[test]
    fn test_locked_eeprom_write_is_counted() {
        let bus = VirtualBus::new().with_servo(1);
        let mut port = open(&bus);
        transact(&mut port, &encode(1, Instruction::Write, &[33, 1]).unwrap()).unwrap();
        assert_eq!(bus.locked_eeprom_writes(1), 1);

        transact(&mut port, &encode(1, Instruction::Write, &[55, 0]).unwrap()).unwrap();
        transact(&mut port, &encode(1, Instruction::Write, &[33, 0]).unwrap()).unwrap();
        assert_eq!(bus.locked_eeprom_writes(1), 1);
    }

    #[test]
    fn test_corrupt_reply() {
        let bus = VirtualBus::new().with_servo(1);
        bus.corrupt_next_replies(1, 1);
        let mut port = open(&bus);
        port.write_all(&encode(1, Instruction::Ping, &[]).unwrap()).unwrap();
        let mut buf = Vec::new();
        port.read_until(&mut buf, &mut |b: &[u8]| b.len() >= 6, Duration::from_millis(20))
            .unwrap();
        assert!(matches!(
            decode(&buf),
            Err(scs_protocol::ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_reply_faults() {
        let bus = VirtualBus::new().with_servo(1);
        let mut port = open(&bus);
        let ping = encode(1, Instruction::Ping, &[]).unwrap();

        bus.inject_reply_fault(1, ReplyFault::Truncated, 1);
        port.write_all(&ping).unwrap();
        let mut buf = Vec::new();
        let _ = port.read_until(&mut buf, &mut |_| false, Duration::from_millis(10));
        assert_eq!(buf.len(), 5);
        assert!(decode(&buf).unwrap_err().is_incomplete());

        bus.inject_reply_fault(1, ReplyFault::ExtraData, 1);
        let frame = transact(&mut port, &ping).unwrap();
        assert_eq!(frame.params, vec![0]);

        // 注入已消耗
        let frame = transact(&mut port, &ping).unwrap();
        assert!(frame.params.is_empty());
    }

    #[test]
    fn test_lost_request_is_not_applied() {
        let bus = VirtualBus::new().with_servo(1);
        let mut port = open(&bus);
        bus.inject_reply_fault_after(1, 1, ReplyFault::Lost, 1);

        // 第一个请求正常
        transact(&mut port, &encode(1, Instruction::Write, &[55, 0]).unwrap()).unwrap();
        assert_eq!(bus.register(1, 55), Some(0));

        // 第二个请求丢失
        port.write_all(&encode(1, Instruction::Write, &[41, 9]).unwrap()).unwrap();
        let mut buf = Vec::new();
        let read = port.read_until(&mut buf, &mut |b: &[u8]| !b.is_empty(), Duration::from_millis(5));
        assert!(matches!(read, Err(SerialError::Timeout)));
        assert_eq!(bus.register(1, 41), Some(0));

        transact(&mut port, &encode(1, Instruction::Write, &[41, 9]).unwrap()).unwrap();
        assert_eq!(bus.register(1, 41), Some(9));
    }

    #[test]
    fn test_sync_write_and_sync_read() {
        let bus = VirtualBus::new().with_servo(1).with_servo(2).with_servo(3);
        bus.set_silent(2, true);
        let mut port = open(&bus);

        let params = [42, 2, 1, 0x00, 0x04, 3, 0x00, 0x0C];
        port.write_all(&encode(BROADCAST_ID, Instruction::SyncWrite, &params).unwrap())
            .unwrap();
        assert_eq!(bus.register_word(1, 42), Some(1024));
        assert_eq!(bus.register_word(3, 42), Some(3072));

        port.write_all(&encode(BROADCAST_ID, Instruction::SyncRead, &[56, 2, 1, 2, 3]).unwrap())
            .unwrap();
        let mut buf = Vec::new();
        let _ = port.read_until(&mut buf, &mut |_| false, Duration::from_millis(10));
        let reply = scs_protocol::sync::parse_sync_read(&buf, &[1, 2, 3], 2);
        assert_eq!(reply.data.ids().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_exclusive_claim() {
        let bus = VirtualBus::new();
        let port = open(&bus);
        let err = bus.connector().connect(&LinkOptions::default()).err().unwrap();
        assert!(err.is_device_unavailable());
        drop(port);
        assert!(!bus.is_claimed());
        assert!(bus.connector().connect(&LinkOptions::default()).is_ok());
    }

    #[test]
    fn test_write_log_records_frames() {
        let bus = VirtualBus::new().with_servo(1);
        let mut port = open(&bus);
        let packet = encode(1, Instruction::Ping, &[]).unwrap();
        port.write_all(&packet).unwrap();
        let log = bus.write_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].bytes, packet);
        assert_eq!(log[0].baud_rate, 1_000_000);
    }
}
