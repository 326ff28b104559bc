//! ID 与波特率修改命令
//!
//! 两者都会写 EEPROM 并改变舵机在总线上的身份，需要 `--yes` 确认。

use crate::config::CliConfig;
use crate::validation::{parse_baud, parse_servo_id};
use anyhow::Result;
use clap::Args;
use scs_sdk::{BaudRate, ServoBus};

/// 修改 ID 命令参数
#[derive(Args, Debug)]
pub struct SetIdCommand {
    /// 当前 ID
    #[arg(value_parser = parse_servo_id)]
    pub current: u8,

    /// 新 ID
    #[arg(value_parser = parse_servo_id)]
    pub new: u8,

    /// 确认执行
    #[arg(short, long)]
    pub yes: bool,
}

impl SetIdCommand {
    pub fn execute(&self, bus: &ServoBus) -> Result<()> {
        if !self.yes {
            anyhow::bail!(
                "修改 ID 会写入 EEPROM，请确认总线上没有其他舵机使用 ID {}，然后加 --yes 重试",
                self.new
            );
        }
        // 尽力检测 ID 冲突：新 ID 已有应答则拒绝
        if self.current != self.new && bus.ping(self.new).is_ok() {
            anyhow::bail!("ID {} 已被总线上的其他舵机使用", self.new);
        }
        bus.set_servo_id(self.current, self.new)?;
        println!("servo {} -> {}", self.current, self.new);
        Ok(())
    }
}

/// 修改波特率命令参数
#[derive(Args, Debug)]
pub struct SetBaudCommand {
    /// 舵机 ID
    #[arg(value_parser = parse_servo_id)]
    pub id: u8,

    /// 新波特率（索引 0..=7 或 bps）
    #[arg(value_parser = parse_baud)]
    pub baud: BaudRate,

    /// 把新波特率写入 CLI 配置
    #[arg(long)]
    pub save: bool,

    /// 确认执行
    #[arg(short, long)]
    pub yes: bool,
}

impl SetBaudCommand {
    pub fn execute(&self, bus: &ServoBus, config: &mut CliConfig) -> Result<()> {
        if !self.yes {
            anyhow::bail!(
                "修改波特率后舵机只在 {} 下应答，加 --yes 确认",
                self.baud
            );
        }
        bus.set_baud_rate(self.id, self.baud.index())?;
        println!("servo {}: baud rate set to {}", self.id, self.baud);

        if self.save {
            config.baud_rate = Some(self.baud.bps());
            config.save()?;
            println!("saved default baud rate {}", self.baud);
        } else {
            println!("use --baud {} to talk to it from now on", self.baud.bps());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scs_sdk::{ServoBusBuilder, TransactionConfig, VirtualBus};

    fn bus(sim: &VirtualBus) -> ServoBus {
        ServoBusBuilder::new()
            .virtual_bus(sim.clone())
            .transaction_config(TransactionConfig {
                response_timeout_ms: 5,
                ..Default::default()
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_set_id_requires_confirmation() {
        let sim = VirtualBus::new().with_servo(1);
        let cmd = SetIdCommand {
            current: 1,
            new: 2,
            yes: false,
        };
        assert!(cmd.execute(&bus(&sim)).is_err());
        assert!(sim.write_log().is_empty());
    }

    #[test]
    fn test_set_id_refuses_conflict() {
        let sim = VirtualBus::new().with_servo(1).with_servo(2);
        let cmd = SetIdCommand {
            current: 1,
            new: 2,
            yes: true,
        };
        assert!(cmd.execute(&bus(&sim)).is_err());
        assert_eq!(sim.servo_ids(), vec![1, 2]);
    }

    #[test]
    fn test_set_id() {
        let sim = VirtualBus::new().with_servo(1);
        let cmd = SetIdCommand {
            current: 1,
            new: 8,
            yes: true,
        };
        cmd.execute(&bus(&sim)).unwrap();
        assert_eq!(sim.servo_ids(), vec![8]);
    }

    #[test]
    fn test_set_baud_without_save() {
        let sim = VirtualBus::new().with_servo(1);
        let cmd = SetBaudCommand {
            id: 1,
            baud: BaudRate::B57600,
            save: false,
            yes: true,
        };
        let mut config = CliConfig::default();
        cmd.execute(&bus(&sim), &mut config).unwrap();
        assert_eq!(sim.servo_baud(1), Some(57_600));
        assert_eq!(config.baud_rate, None);
    }
}
