//! Builder 模式实现
//!
//! 提供链式构造已连接 `ServoBus` 实例的便捷方式。

use crate::bus::ServoBus;
use crate::config::{ConnectOptions, ServoBusConfig};
use crate::error::{Result, ServoError};
use scs_driver::TransactionConfig;
use scs_protocol::ProtocolEnd;
use scs_serial::{Connector, TransportSession, VirtualBus};

/// 传输后端选择
enum Transport {
    /// 真实串口（设备路径，如 "/dev/ttyUSB0" 或 "COM3"）
    #[cfg(feature = "hardware")]
    SerialPort(String),
    /// 进程内虚拟总线
    Virtual(VirtualBus),
    /// 自定义连接器
    Custom(Box<dyn Connector>),
}

/// ServoBus Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use scs_client::ServoBusBuilder;
///
/// let bus = ServoBusBuilder::new()
///     .serial_port("/dev/ttyUSB0")
///     .baud_rate(1_000_000)
///     .build()
///     .unwrap();
///
/// let position = bus.read_position(1).unwrap();
/// ```
pub struct ServoBusBuilder {
    transport: Option<Transport>,
    options: ConnectOptions,
    config: ServoBusConfig,
}

impl ServoBusBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            options: ConnectOptions::default(),
            config: ServoBusConfig::default(),
        }
    }

    /// 使用真实串口
    #[cfg(feature = "hardware")]
    pub fn serial_port(mut self, path: impl Into<String>) -> Self {
        self.transport = Some(Transport::SerialPort(path.into()));
        self
    }

    /// 使用虚拟总线（测试与离线使用）
    pub fn virtual_bus(mut self, bus: VirtualBus) -> Self {
        self.transport = Some(Transport::Virtual(bus));
        self
    }

    /// 使用自定义连接器
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.transport = Some(Transport::Custom(Box::new(connector)));
        self
    }

    /// 设置链路波特率（可选，默认 1M）
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.options.baud_rate = Some(baud_rate);
        self
    }

    /// 设置多字节寄存器字节序（可选，默认低字节在前）
    pub fn protocol_end(mut self, protocol_end: ProtocolEnd) -> Self {
        self.options.protocol_end = Some(protocol_end);
        self
    }

    /// 设置事务配置（可选）
    pub fn transaction_config(mut self, config: TransactionConfig) -> Self {
        self.config.transaction = config;
        self
    }

    /// 切换轮式模式时清零角度限位（可选，默认关闭）
    pub fn wheel_mode_clears_angle_limits(mut self, enabled: bool) -> Self {
        self.config.wheel_mode_clears_angle_limits = enabled;
        self
    }

    /// 设置完整总线配置（覆盖之前的事务配置与模式选项）
    pub fn config(mut self, config: ServoBusConfig) -> Self {
        self.config = config;
        self
    }

    /// 构建并连接
    ///
    /// # Errors
    /// - `Configuration`: 未选择传输后端
    /// - `DeviceUnavailable`: 串口无法打开
    pub fn build(self) -> Result<ServoBus> {
        let options = self.options;
        let bus = self.build_disconnected()?;
        bus.connect(options)?;
        Ok(bus)
    }

    /// 只构建，不连接
    pub fn build_disconnected(self) -> Result<ServoBus> {
        let session = match self.transport {
            #[cfg(feature = "hardware")]
            Some(Transport::SerialPort(path)) => {
                TransportSession::new(scs_serial::SerialPortConnector::new(path))
            },
            Some(Transport::Virtual(bus)) => TransportSession::new(bus.connector()),
            Some(Transport::Custom(connector)) => TransportSession::from_boxed(connector),
            None => {
                return Err(ServoError::Configuration(
                    "no transport selected (serial_port, virtual_bus or connector)".to_string(),
                ));
            },
        };
        Ok(ServoBus::from_session(session, self.config))
    }
}

impl Default for ServoBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}
