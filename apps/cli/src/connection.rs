//! 连接参数
//!
//! 每个需要总线的命令都展开这组参数，未给出时回落到配置文件。

use crate::config::CliConfig;
use anyhow::{Context, Result};
use clap::Args;
use scs_sdk::{ProtocolEnd, ServoBus, ServoBusBuilder, TransactionConfig};

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// 串口（覆盖配置）
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// 波特率 bps（覆盖配置，默认 1000000）
    #[arg(short, long, global = true)]
    pub baud: Option<u32>,

    /// 高字节在前（SCS 系列）
    #[arg(long, global = true)]
    pub high_byte_first: bool,

    /// 应答超时基准（毫秒）
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

impl ConnectionArgs {
    pub fn port<'a>(&'a self, config: &'a CliConfig) -> Result<&'a str> {
        self.port
            .as_deref()
            .or(config.port.as_deref())
            .context("未指定串口：使用 --port 或 `scs-cli config set --port <PORT>`")
    }

    pub fn baud_rate(&self, config: &CliConfig) -> Option<u32> {
        self.baud.or(config.baud_rate)
    }

    pub fn protocol_end(&self, config: &CliConfig) -> ProtocolEnd {
        if self.high_byte_first {
            ProtocolEnd::HighByteFirst
        } else {
            config.protocol_end.unwrap_or_default()
        }
    }

    pub fn transaction_config(&self, config: &CliConfig) -> TransactionConfig {
        let mut transaction = TransactionConfig::default();
        if let Some(ms) = self.timeout_ms.or(config.response_timeout_ms) {
            transaction.response_timeout_ms = ms;
        }
        transaction
    }

    /// 打开串口并连接
    pub fn connect(&self, config: &CliConfig) -> Result<ServoBus> {
        let port = self.port(config)?;
        let mut builder = ServoBusBuilder::new()
            .serial_port(port)
            .protocol_end(self.protocol_end(config))
            .transaction_config(self.transaction_config(config));
        if let Some(baud) = self.baud_rate(config) {
            builder = builder.baud_rate(baud);
        }
        tracing::debug!("Connecting to {}", port);
        builder
            .build()
            .with_context(|| format!("连接 {} 失败", port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let config = CliConfig {
            port: Some("/dev/ttyUSB0".to_string()),
            baud_rate: Some(115_200),
            protocol_end: Some(ProtocolEnd::HighByteFirst),
            response_timeout_ms: Some(20),
        };
        let args = ConnectionArgs {
            port: Some("/dev/ttyACM0".to_string()),
            baud: Some(500_000),
            ..Default::default()
        };
        assert_eq!(args.port(&config).unwrap(), "/dev/ttyACM0");
        assert_eq!(args.baud_rate(&config), Some(500_000));
        assert_eq!(args.protocol_end(&config), ProtocolEnd::HighByteFirst);
        assert_eq!(args.transaction_config(&config).response_timeout_ms, 20);
    }

    #[test]
    fn test_missing_port() {
        let args = ConnectionArgs::default();
        assert!(args.port(&CliConfig::default()).is_err());
        assert_eq!(args.protocol_end(&CliConfig::default()), ProtocolEnd::LowByteFirst);
    }
}
