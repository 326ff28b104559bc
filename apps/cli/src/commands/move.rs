//! 移动命令

use crate::validation::parse_servo_id;
use anyhow::{Context, Result};
use clap::Args;
use scs_sdk::{Deg, ServoBus};
use std::thread;
use std::time::{Duration, Instant};

/// 移动命令参数
#[derive(Args, Debug)]
pub struct MoveCommand {
    /// 舵机 ID
    #[arg(value_parser = parse_servo_id)]
    pub id: u8,

    /// 目标位置（默认为 tick 0..=4095，`--deg` 时为角度）
    pub position: f64,

    /// 目标位置以角度给出
    #[arg(long)]
    pub deg: bool,

    /// 加速度（0..=254）
    #[arg(short, long)]
    pub acceleration: Option<u8>,

    /// 不自动使能扭矩
    #[arg(long)]
    pub no_torque: bool,

    /// 等待运动结束（超时秒数）
    #[arg(short, long)]
    pub wait: Option<f64>,
}

impl MoveCommand {
    pub fn execute(&self, bus: &ServoBus) -> Result<()> {
        let ticks = self.target_ticks()?;

        if let Some(acceleration) = self.acceleration {
            bus.write_acceleration(self.id, acceleration)?;
        }
        if !self.no_torque {
            bus.write_torque_enable(self.id, true)?;
        }
        bus.write_position(self.id, ticks)?;
        println!("servo {}: moving to {} ({})", self.id, ticks, Deg::from_ticks(ticks));

        if let Some(seconds) = self.wait {
            let timeout = Duration::try_from_secs_f64(seconds).context("无效的等待时间")?;
            self.wait_until_stopped(bus, timeout)?;
            println!("servo {}: at {}", self.id, bus.read_position_deg(self.id)?);
        }
        Ok(())
    }

    fn target_ticks(&self) -> Result<u16> {
        if self.deg {
            return Ok(Deg(self.position).to_ticks()?);
        }
        if self.position.fract() != 0.0 || !(0.0..=4095.0).contains(&self.position) {
            anyhow::bail!("位置必须是 0..=4095 之间的整数 tick: {}", self.position);
        }
        Ok(self.position as u16)
    }

    fn wait_until_stopped(&self, bus: &ServoBus, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        while bus.read_moving(self.id)? {
            if start.elapsed() > timeout {
                anyhow::bail!("servo {} still moving after {:?}", self.id, timeout);
            }
            thread::sleep(Duration::from_millis(20));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scs_sdk::{Register, ServoBusBuilder, VirtualBus};

    fn command(position: f64, deg: bool) -> MoveCommand {
        MoveCommand {
            id: 1,
            position,
            deg,
            acceleration: Some(20),
            no_torque: false,
            wait: Some(0.5),
        }
    }

    #[test]
    fn test_target_ticks() {
        assert_eq!(command(1024.0, false).target_ticks().unwrap(), 1024);
        assert_eq!(command(90.0, true).target_ticks().unwrap(), 1024);
        assert!(command(4096.0, false).target_ticks().is_err());
        assert!(command(10.5, false).target_ticks().is_err());
        assert!(command(-1.0, true).target_ticks().is_err());
    }

    #[test]
    fn test_move_virtual_servo() {
        let sim = VirtualBus::new().with_servo(1);
        let bus = ServoBusBuilder::new().virtual_bus(sim.clone()).build().unwrap();
        command(180.0, true).execute(&bus).unwrap();
        assert_eq!(sim.register_word(1, Register::GOAL_POSITION.address), Some(2048));
        assert_eq!(sim.register(1, Register::ACCELERATION.address), Some(20));
        assert_eq!(sim.register(1, Register::TORQUE_ENABLE.address), Some(1));
    }
}
