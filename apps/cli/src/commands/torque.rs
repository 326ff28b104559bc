//! 扭矩开关命令

use crate::validation::parse_servo_id;
use anyhow::Result;
use clap::{Args, ValueEnum};
use scs_sdk::ServoBus;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorqueState {
    On,
    Off,
}

/// 扭矩命令参数
#[derive(Args, Debug)]
pub struct TorqueCommand {
    /// on / off
    #[arg(value_enum)]
    pub state: TorqueState,

    /// 舵机 ID（逗号分隔）
    #[arg(required = true, value_delimiter = ',', value_parser = parse_servo_id)]
    pub ids: Vec<u8>,
}

impl TorqueCommand {
    pub fn execute(&self, bus: &ServoBus) -> Result<()> {
        let enable = self.state == TorqueState::On;
        for &id in &self.ids {
            bus.write_torque_enable(id, enable)?;
            println!("servo {}: torque {}", id, if enable { "on" } else { "off" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scs_sdk::{Register, ServoBusBuilder, VirtualBus};

    #[test]
    fn test_torque_on_multiple() {
        let sim = VirtualBus::new().with_servo(1).with_servo(2);
        let bus = ServoBusBuilder::new().virtual_bus(sim.clone()).build().unwrap();
        TorqueCommand {
            state: TorqueState::On,
            ids: vec![1, 2],
        }
        .execute(&bus)
        .unwrap();
        assert_eq!(sim.register(2, Register::TORQUE_ENABLE.address), Some(1));
    }
}
