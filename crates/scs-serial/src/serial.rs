//! 基于 `serialport` 的真实串口后端

use crate::{BusAdapter, Connector, LinkOptions, SerialDeviceError, SerialDeviceErrorKind, SerialError};
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::warn;

/// 读超时下限：serialport 对 0 超时的处理依平台而异
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

impl From<serialport::Error> for SerialDeviceError {
    fn from(err: serialport::Error) -> Self {
        let kind = match err.kind {
            serialport::ErrorKind::NoDevice => SerialDeviceErrorKind::NoDevice,
            serialport::ErrorKind::InvalidInput => SerialDeviceErrorKind::UnsupportedConfig,
            serialport::ErrorKind::Io(io_kind) => match io_kind {
                ErrorKind::NotFound => SerialDeviceErrorKind::NotFound,
                ErrorKind::PermissionDenied => SerialDeviceErrorKind::AccessDenied,
                ErrorKind::ResourceBusy | ErrorKind::AddrInUse => SerialDeviceErrorKind::Busy,
                _ => SerialDeviceErrorKind::Backend,
            },
            serialport::ErrorKind::Unknown => SerialDeviceErrorKind::Unknown,
        };
        SerialDeviceError::new(kind, err.description)
    }
}

impl From<serialport::Error> for SerialError {
    fn from(err: serialport::Error) -> Self {
        SerialError::Device(err.into())
    }
}

/// 列出系统中的串口设备
pub fn available_ports() -> Result<Vec<String>, SerialError> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|p| p.port_name)
        .collect())
}

/// 串口适配器
pub struct SerialPortAdapter {
    port: Box<dyn SerialPort>,
    baud_rate: u32,
}

impl SerialPortAdapter {
    /// 打开串口（8N1，无流控）
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, SerialError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(MIN_READ_TIMEOUT)
            .open()?;
        Ok(Self { port, baud_rate })
    }

    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        let baud_rate = port.baud_rate().unwrap_or_default();
        Self { port, baud_rate }
    }
}

impl BusAdapter for SerialPortAdapter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SerialError> {
        self.port.set_timeout(timeout.max(MIN_READ_TIMEOUT))?;
        match self.port.read(buf) {
            Ok(0) => Err(SerialError::Timeout),
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                Err(SerialError::Timeout)
            },
            Err(e) => Err(SerialError::Io(e)),
        }
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), SerialError> {
        self.port.set_baud_rate(baud_rate)?;
        self.baud_rate = baud_rate;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

/// 按设备路径打开串口
#[derive(Debug, Clone)]
pub struct SerialPortConnector {
    path: String,
}

impl SerialPortConnector {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Connector for SerialPortConnector {
    fn connect(&mut self, options: &LinkOptions) -> Result<Box<dyn BusAdapter>, SerialError> {
        let mut adapter = SerialPortAdapter::open(&self.path, options.baud_rate)?;
        if let Err(e) = adapter.clear_input() {
            warn!("Failed to flush input of {}: {}", self.path, e);
        }
        Ok(Box::new(adapter))
    }

    fn describe(&self) -> String {
        self.path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialport_error_mapping() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        let dev: SerialDeviceError = err.into();
        assert_eq!(dev.kind, SerialDeviceErrorKind::NoDevice);
        assert!(dev.is_fatal());

        let err = serialport::Error::new(serialport::ErrorKind::Io(ErrorKind::PermissionDenied), "denied");
        assert_eq!(SerialDeviceError::from(err).kind, SerialDeviceErrorKind::AccessDenied);

        let err = serialport::Error::new(serialport::ErrorKind::Io(ErrorKind::ResourceBusy), "busy");
        let err = SerialError::from(err);
        assert!(err.is_device_unavailable());
    }

    #[test]
    fn test_open_missing_port() {
        let mut connector = SerialPortConnector::new("/dev/does-not-exist-scs");
        let err = connector.connect(&LinkOptions::default()).err().unwrap();
        assert!(matches!(err, SerialError::Device(_)));
    }
}
