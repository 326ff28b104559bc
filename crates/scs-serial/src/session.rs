//! 传输会话
//!
//! 持有通道的打开/关闭生命周期：
//! - `open` 在已打开时返回 `AlreadyOpen`，设备无法声明时返回设备错误
//! - `close` 幂等
//! - 未打开时的读写返回 `NotOpen`

use crate::{BusAdapter, Connector, LinkOptions, SerialError};
use std::time::Duration;
use tracing::{debug, info, trace};

pub struct TransportSession {
    connector: Box<dyn Connector>,
    port: Option<Box<dyn BusAdapter>>,
    options: LinkOptions,
}

impl TransportSession {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::from_boxed(Box::new(connector))
    }

    pub fn from_boxed(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            port: None,
            options: LinkOptions::default(),
        }
    }

    /// 打开通道
    pub fn open(&mut self, options: LinkOptions) -> Result<(), SerialError> {
        if self.port.is_some() {
            return Err(SerialError::AlreadyOpen);
        }
        let port = self.connector.connect(&options)?;
        info!(
            "Opened {} at {} bps ({:?})",
            self.connector.describe(),
            options.baud_rate,
            options.protocol_end
        );
        self.port = Some(port);
        self.options = options;
        Ok(())
    }

    /// 关闭通道（幂等）
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Closed {}", self.connector.describe());
        }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// 最近一次 `open` 使用的链路参数
    pub fn options(&self) -> &LinkOptions {
        &self.options
    }

    pub fn describe(&self) -> String {
        self.connector.describe()
    }

    fn port(&mut self) -> Result<&mut Box<dyn BusAdapter>, SerialError> {
        self.port.as_mut().ok_or(SerialError::NotOpen)
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        trace!("TX {:02X?}", bytes);
        self.port()?.write_all(bytes)
    }

    /// 读取直到 `predicate` 成立，超时返回 `Timeout`（`buf` 保留已收到的字节）
    pub fn read_until(
        &mut self,
        buf: &mut Vec<u8>,
        mut predicate: impl FnMut(&[u8]) -> bool,
        timeout: Duration,
    ) -> Result<(), SerialError> {
        let result = self.port()?.read_until(buf, &mut predicate, timeout);
        if !buf.is_empty() {
            trace!("RX {:02X?}", buf);
        }
        result
    }

    /// 丢弃陈旧的输入字节
    pub fn clear_input(&mut self) -> Result<(), SerialError> {
        self.port()?.clear_input()
    }

    /// 修改主机侧链路速率（不影响舵机）
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), SerialError> {
        self.port()?.set_baud_rate(baud_rate)?;
        debug!("Host link speed set to {} bps", baud_rate);
        self.options.baud_rate = baud_rate;
        Ok(())
    }
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("device", &self.connector.describe())
            .field("open", &self.is_open())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VirtualBus;
    use scs_protocol::ProtocolEnd;

    #[test]
    fn test_open_twice_fails() {
        let bus = VirtualBus::new();
        let mut session = TransportSession::new(bus.connector());
        session.open(LinkOptions::default()).unwrap();
        assert!(matches!(
            session.open(LinkOptions::default()),
            Err(SerialError::AlreadyOpen)
        ));
        assert!(session.is_open());
    }

    #[test]
    fn test_close_is_idempotent() {
        let bus = VirtualBus::new();
        let mut session = TransportSession::new(bus.connector());
        session.close();
        session.open(LinkOptions::default()).unwrap();
        session.close();
        session.close();
        assert!(!session.is_open());
    }

    #[test]
    fn test_io_requires_open() {
        let bus = VirtualBus::new();
        let mut session = TransportSession::new(bus.connector());
        assert!(matches!(session.write(&[0xFF]), Err(SerialError::NotOpen)));
        let mut buf = Vec::new();
        assert!(matches!(
            session.read_until(&mut buf, |_| true, Duration::from_millis(1)),
            Err(SerialError::NotOpen)
        ));
    }

    #[test]
    fn test_open_records_options() {
        let bus = VirtualBus::new();
        let mut session = TransportSession::new(bus.connector());
        let options = LinkOptions {
            baud_rate: 115_200,
            protocol_end: ProtocolEnd::HighByteFirst,
        };
        session.open(options).unwrap();
        assert_eq!(*session.options(), options);
        assert_eq!(bus.host_baud(), 115_200);
    }

    #[test]
    fn test_unavailable_device() {
        let bus = VirtualBus::new();
        bus.set_unavailable(true);
        let mut session = TransportSession::new(bus.connector());
        let err = session.open(LinkOptions::default()).unwrap_err();
        assert!(err.is_device_unavailable());
        assert!(!session.is_open());
    }

    #[test]
    fn test_read_until_times_out_with_no_servos() {
        let bus = VirtualBus::new();
        let mut session = TransportSession::new(bus.connector());
        session.open(LinkOptions::default()).unwrap();
        session.write(&[0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB]).unwrap();
        let mut buf = Vec::new();
        let result = session.read_until(&mut buf, |b| b.len() >= 6, Duration::from_millis(5));
        assert!(matches!(result, Err(SerialError::Timeout)));
        assert!(buf.is_empty());
    }
}
