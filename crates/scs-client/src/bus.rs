//! 舵机总线
//!
//! [`ServoBus`] 是 SDK 的主入口：显式的连接对象，负责打开/关闭串口、
//! 启动事务引擎，并提供类型化的寄存器读写与同步批量操作。
//!
//! # EEPROM 写保护
//!
//! ID、波特率、模式、角度限位位于 EEPROM 区，写入前先解锁（锁寄存器 ← 0），
//! 写入后重新上锁（锁寄存器 ← 1）。
//!
//! # 线程安全
//!
//! `ServoBus` 是 `Sync` 的，可通过 `Arc` 在多个线程间共享。所有请求进入同一个
//! FIFO 队列，总线上同一时刻最多只有一个事务。

use crate::config::{ConnectOptions, ServoBusConfig};
use crate::error::{Result, ServoError};
use parking_lot::Mutex;
use scs_driver::{
    BusMetrics, MetricsSnapshot, PendingTransaction, RawResponse, Request, TransactionEngine,
};
use scs_protocol::sync::sync_write_params;
use scs_protocol::units::{MAX_POSITION_TICKS, bool_to_raw, encode_wheel_speed, raw_to_bool};
use scs_protocol::{
    BaudRate, Deg, OperatingMode, ProtocolEnd, ProtocolError, Register, ServoMap, is_unicast_id,
};
use scs_serial::{Connector, TransportSession};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 连接状态
enum Link {
    /// 未连接，持有可再次打开的会话
    Closed(TransportSession),
    /// 已连接，会话由总线线程持有
    Open(TransactionEngine),
    /// 总线线程未能归还会话，无法再次连接
    Lost,
}

/// 舵机总线（显式连接对象）
///
/// # Example
///
/// ```
/// use scs_client::{ConnectOptions, ServoBus};
/// use scs_serial::VirtualBus;
///
/// let sim = VirtualBus::new().with_servo(1);
/// let bus = ServoBus::new(sim.connector());
/// bus.connect(ConnectOptions::default()).unwrap();
///
/// bus.write_position(1, 1024).unwrap();
/// assert_eq!(bus.read_position(1).unwrap(), 1024);
///
/// bus.disconnect().unwrap();
/// ```
pub struct ServoBus {
    link: Mutex<Link>,
    /// `set_baud_rate` 记录的新速率，下次 `connect` 未指定波特率时使用
    pending_baud: Mutex<Option<u32>>,
    config: ServoBusConfig,
    metrics: Arc<BusMetrics>,
}

impl ServoBus {
    /// 使用默认配置创建（未连接）
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::with_config(connector, ServoBusConfig::default())
    }

    pub fn with_config(connector: impl Connector + 'static, config: ServoBusConfig) -> Self {
        Self::from_session(TransportSession::new(connector), config)
    }

    pub(crate) fn from_session(session: TransportSession, config: ServoBusConfig) -> Self {
        Self {
            link: Mutex::new(Link::Closed(session)),
            pending_baud: Mutex::new(None),
            config,
            metrics: Arc::new(BusMetrics::new()),
        }
    }

    // ==================== Connection ====================

    /// 打开连接并启动总线线程
    ///
    /// # Errors
    /// - `AlreadyOpen`: 连接已打开
    /// - `DeviceUnavailable`: 串口不存在、无权限或被占用
    pub fn connect(&self, options: ConnectOptions) -> Result<()> {
        let mut link = self.link.lock();
        let mut session = match std::mem::replace(&mut *link, Link::Lost) {
            Link::Closed(session) => session,
            open @ Link::Open(_) => {
                *link = open;
                return Err(ServoError::AlreadyOpen);
            },
            Link::Lost => {
                return Err(ServoError::Internal(
                    "transport was not released by the previous connection".to_string(),
                ));
            },
        };

        let link_options = options.resolve(*self.pending_baud.lock());
        if let Err(e) = session.open(link_options) {
            *link = Link::Closed(session);
            return Err(e.into());
        }

        let description = session.describe();
        let engine = TransactionEngine::start(
            session,
            self.config.transaction.clone(),
            self.metrics.clone(),
        )?;
        *link = Link::Open(engine);
        self.pending_baud.lock().take();

        info!(
            "Connected to {} at {} bps ({:?})",
            description, link_options.baud_rate, link_options.protocol_end
        );
        Ok(())
    }

    /// 关闭连接（幂等）
    ///
    /// 已排队的请求先执行完，然后总线线程退出并释放串口。
    pub fn disconnect(&self) -> Result<()> {
        let mut link = self.link.lock();
        match std::mem::replace(&mut *link, Link::Lost) {
            Link::Open(engine) => match engine.shutdown() {
                Some(mut session) => {
                    session.close();
                    *link = Link::Closed(session);
                    info!("Disconnected");
                    Ok(())
                },
                None => {
                    error!("Bus thread did not release the transport");
                    Err(ServoError::Internal(
                        "bus thread did not exit in time".to_string(),
                    ))
                },
            },
            other => {
                *link = other;
                Ok(())
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(&*self.link.lock(), Link::Open(engine) if engine.is_running())
    }

    /// 下次连接将使用的波特率（`set_baud_rate` 之后）
    pub fn pending_baud_rate(&self) -> Option<u32> {
        *self.pending_baud.lock()
    }

    pub fn config(&self) -> &ServoBusConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    // ==================== Transactions ====================

    /// 在连接锁内提交请求；锁只覆盖入队，等待应答时不持有
    fn submit(
        &self,
        build: impl FnOnce(ProtocolEnd) -> Result<Request>,
    ) -> Result<(PendingTransaction, ProtocolEnd)> {
        let link = self.link.lock();
        let Link::Open(engine) = &*link else {
            return Err(ServoError::NotConnected);
        };
        let end = engine.link().protocol_end;
        let pending = engine.submit(build(end)?)?;
        Ok((pending, end))
    }

    fn transact_status(&self, request: Request) -> Result<RawResponse> {
        let (pending, _) = self.submit(|_| Ok(request))?;
        Ok(pending.wait()?.into_status()?)
    }

    /// 读取寄存器原始值
    fn read_raw(&self, id: u8, register: &Register) -> Result<u16> {
        check_unicast(id)?;
        let (pending, end) = self.submit(|_| Ok(Request::read(id, register)))?;
        let raw = pending.wait()?.into_status()?;
        register
            .decode(&raw.params, end)
            .map_err(|e| ServoError::malformed(id, e))
    }

    fn read_signed(&self, id: u8, register: &Register) -> Result<i32> {
        check_unicast(id)?;
        let (pending, end) = self.submit(|_| Ok(Request::read(id, register)))?;
        let raw = pending.wait()?.into_status()?;
        register
            .decode_signed(&raw.params, end)
            .map_err(|e| ServoError::malformed(id, e))
    }

    /// 写寄存器原始值（不处理 EEPROM 锁）；广播写不等待应答
    fn write_raw(&self, id: u8, register: &Register, raw: u16) -> Result<()> {
        let (pending, _) =
            self.submit(|end| Ok(Request::write(id, register.write_params(raw, end)?)))?;
        pending.wait()?;
        Ok(())
    }

    fn set_lock(&self, id: u8, locked: bool) -> Result<()> {
        self.write_raw(id, &Register::LOCK, bool_to_raw(locked))
    }

    /// 解锁 → `writes` → 上锁；写入失败时仍尝试重新上锁，返回最初的错误
    fn with_eeprom_unlocked(&self, id: u8, writes: impl FnOnce() -> Result<()>) -> Result<()> {
        self.set_lock(id, false)?;
        match writes() {
            Ok(()) => self.set_lock(id, true),
            Err(e) => {
                if let Err(relock) = self.set_lock(id, true) {
                    warn!("Failed to relock EEPROM of servo {}: {}", id, relock);
                }
                Err(e)
            },
        }
    }

    // ==================== Reads ====================

    /// PING 舵机并读取型号
    pub fn ping(&self, id: u8) -> Result<u16> {
        check_unicast(id)?;
        self.transact_status(Request::ping(id))?;
        self.read_raw(id, &Register::MODEL_NUMBER)
    }

    /// 读取任意寄存器
    pub fn read_register(&self, id: u8, register: &Register) -> Result<u16> {
        self.read_raw(id, register)
    }

    /// 当前位置（tick，0..=4095）
    pub fn read_position(&self, id: u8) -> Result<u16> {
        self.read_raw(id, &Register::PRESENT_POSITION)
    }

    /// 当前位置（度）
    pub fn read_position_deg(&self, id: u8) -> Result<Deg> {
        self.read_position(id).map(Deg::from_ticks)
    }

    pub fn read_baud_rate(&self, id: u8) -> Result<BaudRate> {
        let index = self.read_raw(id, &Register::BAUD_RATE)?;
        u8::try_from(index)
            .map_err(|_| ProtocolError::InvalidValue {
                field: "baud_rate_index".to_string(),
                value: index.into(),
            })
            .and_then(BaudRate::from_index)
            .map_err(|e| ServoError::malformed(id, e))
    }

    pub fn read_mode(&self, id: u8) -> Result<OperatingMode> {
        let raw = self.read_raw(id, &Register::OPERATING_MODE)?;
        Ok(OperatingMode::from(raw as u8))
    }

    /// 扭矩使能（任意非零值视为 `true`）
    pub fn read_torque_enable(&self, id: u8) -> Result<bool> {
        self.read_raw(id, &Register::TORQUE_ENABLE).map(raw_to_bool)
    }

    /// 当前速度（带符号，步/秒）
    pub fn read_speed(&self, id: u8) -> Result<i32> {
        self.read_signed(id, &Register::PRESENT_SPEED)
    }

    /// 当前负载（带符号，0.1%）
    pub fn read_load(&self, id: u8) -> Result<i32> {
        self.read_signed(id, &Register::PRESENT_LOAD)
    }

    /// 温度（°C）
    pub fn read_temperature(&self, id: u8) -> Result<u8> {
        self.read_raw(id, &Register::PRESENT_TEMPERATURE)
            .map(|raw| raw as u8)
    }

    /// 电压（V）
    pub fn read_voltage(&self, id: u8) -> Result<f64> {
        self.read_raw(id, &Register::PRESENT_VOLTAGE)
            .map(|raw| f64::from(raw) / 10.0)
    }

    pub fn read_moving(&self, id: u8) -> Result<bool> {
        self.read_raw(id, &Register::MOVING).map(raw_to_bool)
    }

    pub fn read_current(&self, id: u8) -> Result<u16> {
        self.read_raw(id, &Register::PRESENT_CURRENT)
    }

    // ==================== Writes ====================

    /// 写任意可写寄存器
    ///
    /// EEPROM 区寄存器自动加解锁；ID 与波特率分别按 [`set_servo_id`](Self::set_servo_id)、
    /// [`set_baud_rate`](Self::set_baud_rate) 的语义处理。
    pub fn write_register(&self, id: u8, register: &Register, raw: u16) -> Result<()> {
        register.ensure_writable()?;
        let raw = register.validate_raw(raw)?;
        match register.address {
            a if a == Register::ID.address => self.set_servo_id(id, raw as u8),
            a if a == Register::BAUD_RATE.address => self.set_baud_rate(id, raw as u8),
            _ if register.eeprom => {
                self.with_eeprom_unlocked(id, || self.write_raw(id, register, raw))
            },
            _ => self.write_raw(id, register, raw),
        }
    }

    /// 目标位置（tick，0..=4095）
    pub fn write_position(&self, id: u8, position: u16) -> Result<()> {
        self.write_raw(id, &Register::GOAL_POSITION, position)
    }

    /// 目标位置（度，0..360）
    pub fn write_position_deg(&self, id: u8, position: Deg) -> Result<()> {
        self.write_position(id, position.to_ticks()?)
    }

    pub fn write_torque_enable(&self, id: u8, enable: bool) -> Result<()> {
        self.write_raw(id, &Register::TORQUE_ENABLE, bool_to_raw(enable))
    }

    /// 加速度（0..=254）
    pub fn write_acceleration(&self, id: u8, acceleration: u8) -> Result<()> {
        self.write_raw(id, &Register::ACCELERATION, acceleration.into())
    }

    /// 轮式模式下的目标速度（带符号，|speed| ≤ 10000）
    pub fn write_wheel_speed(&self, id: u8, speed: i32) -> Result<()> {
        let raw = encode_wheel_speed(speed)?;
        self.write_raw(id, &Register::GOAL_SPEED, raw)
    }

    // ==================== Modes ====================

    /// 切换到轮式（连续旋转）模式
    ///
    /// 顺序：解锁 → （可选）角度限位清零 → 模式 ← 1 → 上锁。
    pub fn set_wheel_mode(&self, id: u8) -> Result<()> {
        self.with_eeprom_unlocked(id, || {
            if self.config.wheel_mode_clears_angle_limits {
                self.write_raw(id, &Register::MIN_ANGLE_LIMIT, 0)?;
                self.write_raw(id, &Register::MAX_ANGLE_LIMIT, 0)?;
            }
            self.write_raw(
                id,
                &Register::OPERATING_MODE,
                u8::from(OperatingMode::Wheel).into(),
            )
        })?;
        debug!("Servo {} switched to wheel mode", id);
        Ok(())
    }

    /// 切换回位置模式
    ///
    /// 顺序：解锁 → 模式 ← 0 → （可选）恢复角度限位 0..=4095 → 上锁。
    pub fn set_position_mode(&self, id: u8) -> Result<()> {
        self.with_eeprom_unlocked(id, || {
            self.write_raw(
                id,
                &Register::OPERATING_MODE,
                u8::from(OperatingMode::Position).into(),
            )?;
            if self.config.wheel_mode_clears_angle_limits {
                self.write_raw(id, &Register::MIN_ANGLE_LIMIT, 0)?;
                self.write_raw(id, &Register::MAX_ANGLE_LIMIT, MAX_POSITION_TICKS)?;
            }
            Ok(())
        })?;
        debug!("Servo {} switched to position mode", id);
        Ok(())
    }

    // ==================== Sync batch ====================

    /// 同步读取多个舵机的当前位置
    ///
    /// 未应答的舵机不出现在结果中；结果按 `ids` 顺序排列。
    pub fn sync_read_positions(&self, ids: &[u8]) -> Result<ServoMap<u16>> {
        self.sync_read(ids, &Register::PRESENT_POSITION)
    }

    /// 同步读取任意寄存器
    pub fn sync_read(&self, ids: &[u8], register: &Register) -> Result<ServoMap<u16>> {
        if ids.is_empty() {
            return Ok(ServoMap::new());
        }
        let params = scs_protocol::sync::sync_read_params(register, ids)?;
        let (pending, end) = self.submit(|_| Ok(Request::sync_read(params)))?;
        let reply = pending.wait()?.into_sync()?;

        let missing = reply.missing(ids);
        if !missing.is_empty() {
            debug!("Sync read {}: no reply from {:?}", register, missing);
        }
        reply
            .ordered(ids)
            .try_map(|id, data| {
                register
                    .decode(&data, end)
                    .map_err(|e| ServoError::malformed(id, e))
            })
    }

    /// 同步写多个舵机的目标位置（一帧，无应答，条目顺序即 map 顺序）
    pub fn sync_write_positions(&self, positions: &ServoMap<u16>) -> Result<()> {
        self.sync_write(&Register::GOAL_POSITION, positions)
    }

    /// 同步写多个舵机的轮式速度
    pub fn sync_write_wheel_speed(&self, speeds: &ServoMap<i32>) -> Result<()> {
        let mut raw = ServoMap::with_capacity(speeds.len());
        for (id, &speed) in speeds.iter() {
            raw.insert(id, encode_wheel_speed(speed)?);
        }
        self.sync_write(&Register::GOAL_SPEED, &raw)
    }

    /// 同步写任意寄存器
    pub fn sync_write(&self, register: &Register, values: &ServoMap<u16>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let (pending, _) = self.submit(|end| {
            let mut encoded = ServoMap::with_capacity(values.len());
            for (id, &raw) in values.iter() {
                encoded.insert(id, register.encode(raw, end)?);
            }
            Ok(Request::sync_write(sync_write_params(register, &encoded)?))
        })?;
        pending.wait()?;
        Ok(())
    }

    // ==================== Identity ====================

    /// 修改舵机波特率（索引 0..=7）
    ///
    /// 写入后舵机立即改用新速率，主机链路需要在下一次 `connect` 时切换：
    /// 新速率被记录下来，下次 `connect` 未指定波特率时使用。
    /// 舵机不再以旧速率收听，因此不重新上锁。
    pub fn set_baud_rate(&self, id: u8, index: u8) -> Result<()> {
        let baud = BaudRate::from_index(index)?;
        check_unicast(id)?;

        self.set_lock(id, false)?;
        self.write_raw(id, &Register::BAUD_RATE, baud.index().into())?;
        *self.pending_baud.lock() = Some(baud.bps());

        info!(
            "Servo {} baud rate set to {}; reconnect to talk to it",
            id, baud
        );
        Ok(())
    }

    /// 修改舵机 ID
    ///
    /// 总线上已存在 `new_id` 时会产生 ID 冲突，无法事先检测。
    /// 应答来自旧 ID；之后在新 ID 上重新上锁。ID 写入失败时在旧 ID 上尝试重新上锁，
    /// 返回写入错误。
    pub fn set_servo_id(&self, current_id: u8, new_id: u8) -> Result<()> {
        check_unicast(current_id)?;
        check_unicast(new_id)?;
        if current_id == new_id {
            return Ok(());
        }

        self.set_lock(current_id, false)?;
        if let Err(e) = self.write_raw(current_id, &Register::ID, new_id.into()) {
            if let Err(relock) = self.set_lock(current_id, true) {
                warn!(
                    "Failed to relock EEPROM of servo {} after id write failed: {}",
                    current_id, relock
                );
            }
            return Err(e);
        }
        self.set_lock(new_id, true)?;

        info!("Servo id changed: {} -> {}", current_id, new_id);
        Ok(())
    }
}

impl Drop for ServoBus {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            warn!("Failed to disconnect servo bus on drop: {}", e);
        }
    }
}

impl std::fmt::Debug for ServoBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServoBus")
            .field("connected", &self.is_connected())
            .field("pending_baud", &self.pending_baud_rate())
            .field("config", &self.config)
            .finish()
    }
}

fn check_unicast(id: u8) -> Result<()> {
    if is_unicast_id(id) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidId { id }.into())
    }
}
