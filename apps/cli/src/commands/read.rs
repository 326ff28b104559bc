//! 读取命令
//!
//! 不指定寄存器时输出状态摘要；多个 ID 读取位置时使用同步读。

use crate::validation::{parse_register, parse_servo_id};
use anyhow::Result;
use clap::Args;
use scs_sdk::{Deg, Register, ServoBus};

/// 读取命令参数
#[derive(Args, Debug)]
pub struct ReadCommand {
    /// 舵机 ID（逗号分隔）
    #[arg(required = true, value_delimiter = ',', value_parser = parse_servo_id)]
    pub ids: Vec<u8>,

    /// 寄存器名称或地址（如 present_position、56）
    #[arg(short, long, value_parser = parse_register)]
    pub register: Option<Register>,
}

impl ReadCommand {
    pub fn execute(&self, bus: &ServoBus) -> Result<()> {
        match self.register {
            Some(register) if register == Register::PRESENT_POSITION && self.ids.len() > 1 => {
                let positions = bus.sync_read_positions(&self.ids)?;
                for &id in &self.ids {
                    match positions.get(id) {
                        Some(&ticks) => println!("servo {:>3}: {} ({})", id, ticks, Deg::from_ticks(ticks)),
                        None => println!("servo {:>3}: no reply", id),
                    }
                }
            },
            Some(register) => {
                for &id in &self.ids {
                    println!("servo {:>3}: {} = {}", id, register, bus.read_register(id, &register)?);
                }
            },
            None => {
                for &id in &self.ids {
                    print_status(bus, id)?;
                }
            },
        }
        Ok(())
    }
}

fn print_status(bus: &ServoBus, id: u8) -> Result<()> {
    println!("servo {}", id);
    println!("  position     {}", bus.read_position_deg(id)?);
    println!("  speed        {}", bus.read_speed(id)?);
    println!("  load         {:.1}%", f64::from(bus.read_load(id)?) / 10.0);
    println!("  voltage      {:.1} V", bus.read_voltage(id)?);
    println!("  temperature  {} °C", bus.read_temperature(id)?);
    println!("  moving       {}", bus.read_moving(id)?);
    println!("  torque       {}", bus.read_torque_enable(id)?);
    println!("  mode         {:?}", bus.read_mode(id)?);
    println!("  baud         {}", bus.read_baud_rate(id)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scs_sdk::{ServoBusBuilder, VirtualBus};

    fn bus() -> ServoBus {
        ServoBusBuilder::new()
            .virtual_bus(VirtualBus::new().with_servo(1).with_servo(2))
            .build()
            .unwrap()
    }

    #[test]
    fn test_read_status() {
        let cmd = ReadCommand {
            ids: vec![1],
            register: None,
        };
        assert!(cmd.execute(&bus()).is_ok());
    }

    #[test]
    fn test_read_positions_sync() {
        let cmd = ReadCommand {
            ids: vec![1, 2, 9],
            register: Some(Register::PRESENT_POSITION),
        };
        assert!(cmd.execute(&bus()).is_ok());
    }

    #[test]
    fn test_read_register_missing_servo_fails() {
        let bus = ServoBusBuilder::new()
            .virtual_bus(VirtualBus::new())
            .transaction_config(scs_sdk::TransactionConfig {
                response_timeout_ms: 2,
                ..Default::default()
            })
            .build()
            .unwrap();
        let cmd = ReadCommand {
            ids: vec![4],
            register: Some(Register::PRESENT_TEMPERATURE),
        };
        assert!(cmd.execute(&bus).is_err());
    }
}
