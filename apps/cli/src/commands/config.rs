//! 配置管理命令
//!
//! 管理 CLI 默认值（串口、波特率、字节序、超时）

use crate::config::{CliConfig, config_file};
use anyhow::Result;
use clap::Subcommand;
use scs_sdk::ProtocolEnd;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 默认串口（如 /dev/ttyUSB0、COM3）
        #[arg(long)]
        port: Option<String>,

        /// 默认波特率（bps）
        #[arg(long)]
        baud: Option<u32>,

        /// 默认高字节在前（SCS 系列）
        #[arg(long)]
        high_byte_first: Option<bool>,

        /// 应答超时基准（毫秒）
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称（port / baud / protocol_end / timeout_ms / all）
        #[arg(default_value = "all")]
        key: String,
    },

    /// 检查配置
    Check,
}

impl ConfigCommand {
    pub fn execute(self, config: &mut CliConfig) -> Result<()> {
        match self {
            ConfigCommand::Set {
                port,
                baud,
                high_byte_first,
                timeout_ms,
            } => {
                Self::apply(config, port, baud, high_byte_first, timeout_ms);
                config.save()?;
                println!("saved {}", config_file()?.display());
                Ok(())
            },

            ConfigCommand::Get { key } => {
                println!("{}", Self::describe(config, &key)?);
                Ok(())
            },

            ConfigCommand::Check => {
                println!("config file: {}", config_file()?.display());
                println!("{}", Self::describe(config, "all")?);
                if config.port.is_none() {
                    println!("hint: no default port, set one with `scs-cli config set --port <PORT>`");
                }
                Ok(())
            },
        }
    }

    fn apply(
        config: &mut CliConfig,
        port: Option<String>,
        baud: Option<u32>,
        high_byte_first: Option<bool>,
        timeout_ms: Option<u64>,
    ) {
        if let Some(port) = port {
            config.port = Some(port);
        }
        if let Some(baud) = baud {
            config.baud_rate = Some(baud);
        }
        if let Some(high) = high_byte_first {
            config.protocol_end = Some(if high {
                ProtocolEnd::HighByteFirst
            } else {
                ProtocolEnd::LowByteFirst
            });
        }
        if let Some(ms) = timeout_ms {
            config.response_timeout_ms = Some(ms);
        }
    }

    fn describe(config: &CliConfig, key: &str) -> Result<String> {
        fn show<T: std::fmt::Debug>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map_or_else(|| "(unset)".to_string(), |v| format!("{v:?}"))
        }

        Ok(match key {
            "port" => show(&config.port),
            "baud" => show(&config.baud_rate),
            "protocol_end" => show(&config.protocol_end),
            "timeout_ms" => show(&config.response_timeout_ms),
            "all" => format!(
                "port = {}\nbaud = {}\nprotocol_end = {}\ntimeout_ms = {}",
                show(&config.port),
                show(&config.baud_rate),
                show(&config.protocol_end),
                show(&config.response_timeout_ms)
            ),
            other => anyhow::bail!("未知配置项: {other}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_only_given_fields() {
        let mut config = CliConfig {
            port: Some("COM3".to_string()),
            ..Default::default()
        };
        ConfigCommand::apply(&mut config, None, Some(57_600), Some(true), None);
        assert_eq!(config.port.as_deref(), Some("COM3"));
        assert_eq!(config.baud_rate, Some(57_600));
        assert_eq!(config.protocol_end, Some(ProtocolEnd::HighByteFirst));
    }

    #[test]
    fn test_describe() {
        let config = CliConfig::default();
        assert_eq!(ConfigCommand::describe(&config, "port").unwrap(), "(unset)");
        assert!(ConfigCommand::describe(&config, "nope").is_err());
    }
}
