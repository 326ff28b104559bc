//! 总线扫描命令
//!
//! 逐个 PING ID 区间，可选遍历全部标准波特率。

use crate::config::CliConfig;
use crate::connection::ConnectionArgs;
use crate::validation::parse_servo_id;
use anyhow::Result;
use clap::Args;
use scs_sdk::{BaudRate, ConnectOptions, ServoBus, ServoBusBuilder, TransactionConfig};

/// 扫描命令参数
#[derive(Args, Debug)]
pub struct ScanCommand {
    /// 起始 ID
    #[arg(long, default_value_t = 0, value_parser = parse_servo_id)]
    pub from: u8,

    /// 结束 ID（含）
    #[arg(long, default_value_t = 253, value_parser = parse_servo_id)]
    pub to: u8,

    /// 遍历全部标准波特率
    #[arg(long)]
    pub all_bauds: bool,

    /// 单个 ID 的应答超时（毫秒）
    #[arg(long, default_value_t = 5)]
    pub ping_timeout_ms: u64,

    /// 只列出可用串口
    #[arg(long)]
    pub list_ports: bool,
}

/// 扫描结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub id: u8,
    pub model: u16,
}

/// PING 一组 ID，返回有应答的舵机
pub fn scan_ids(bus: &ServoBus, ids: impl IntoIterator<Item = u8>) -> Vec<Found> {
    ids.into_iter()
        .filter_map(|id| match bus.ping(id) {
            Ok(model) => Some(Found { id, model }),
            Err(e) => {
                tracing::trace!("servo {}: {}", id, e);
                None
            },
        })
        .collect()
}

impl ScanCommand {
    pub fn execute(&self, conn: &ConnectionArgs, config: &CliConfig) -> Result<()> {
        if self.list_ports {
            for port in scs_sdk::serial::available_ports()? {
                println!("{}", port);
            }
            return Ok(());
        }
        if self.from > self.to {
            anyhow::bail!("--from ({}) 大于 --to ({})", self.from, self.to);
        }

        let bauds: Vec<u32> = if self.all_bauds {
            BaudRate::ALL.iter().map(|b| b.bps()).collect()
        } else {
            vec![conn.baud_rate(config).unwrap_or(BaudRate::B1000000.bps())]
        };

        let bus = ServoBusBuilder::new()
            .serial_port(conn.port(config)?)
            .transaction_config(TransactionConfig {
                response_timeout_ms: self.ping_timeout_ms,
                max_retries: 0,
                ..conn.transaction_config(config)
            })
            .build_disconnected()?;

        let mut total = 0;
        for baud in bauds {
            bus.connect(
                ConnectOptions::new()
                    .baud_rate(baud)
                    .protocol_end(conn.protocol_end(config)),
            )?;
            println!("scanning {}..={} at {} bps", self.from, self.to, baud);
            for found in scan_ids(&bus, self.from..=self.to) {
                println!("  servo {:>3}  model {}", found.id, found.model);
                total += 1;
            }
            bus.disconnect()?;
        }
        println!("{} servo(s) found", total);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scs_sdk::VirtualBus;

    #[test]
    fn test_scan_ids_finds_present_servos() {
        let sim = VirtualBus::new().with_servo(2).with_servo(5);
        sim.set_silent(5, true);
        let bus = ServoBusBuilder::new()
            .virtual_bus(sim)
            .transaction_config(TransactionConfig {
                response_timeout_ms: 2,
                max_retries: 0,
                ..Default::default()
            })
            .build()
            .unwrap();
        assert_eq!(scan_ids(&bus, 0..=6), vec![Found { id: 2, model: 777 }]);
    }
}
