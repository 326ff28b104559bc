//! PING 命令

use crate::validation::parse_servo_id;
use anyhow::Result;
use clap::Args;
use scs_sdk::ServoBus;

/// PING 命令参数
#[derive(Args, Debug)]
pub struct PingCommand {
    /// 舵机 ID
    #[arg(value_parser = parse_servo_id)]
    pub id: u8,
}

impl PingCommand {
    pub fn execute(&self, bus: &ServoBus) -> Result<()> {
        let model = bus.ping(self.id)?;
        println!("servo {}: model {}", self.id, model);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scs_sdk::{ServoBusBuilder, VirtualBus};

    #[test]
    fn test_ping_virtual_servo() {
        let bus = ServoBusBuilder::new()
            .virtual_bus(VirtualBus::new().with_servo(3))
            .build()
            .unwrap();
        assert!(PingCommand { id: 3 }.execute(&bus).is_ok());
    }
}
