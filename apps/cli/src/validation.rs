//! 输入验证
//!
//! clap `value_parser` 使用的解析函数。

use scs_sdk::protocol::{MAX_SERVO_ID, is_unicast_id};
use scs_sdk::{BaudRate, Register};

/// 舵机 ID（0..=253）
pub fn parse_servo_id(s: &str) -> Result<u8, String> {
    let id: u8 = s
        .trim()
        .parse()
        .map_err(|_| format!("无效的舵机 ID: {s}"))?;
    if !is_unicast_id(id) {
        return Err(format!("舵机 ID 必须在 0..={MAX_SERVO_ID} 之间: {id}"));
    }
    Ok(id)
}

/// 波特率：索引 0..=7 或标准速率（bps）
pub fn parse_baud(s: &str) -> Result<BaudRate, String> {
    let value: u32 = s
        .trim()
        .parse()
        .map_err(|_| format!("无效的波特率: {s}"))?;
    if let Ok(index) = u8::try_from(value)
        && let Ok(baud) = BaudRate::from_index(index)
    {
        return Ok(baud);
    }
    BaudRate::from_bps(value).ok_or_else(|| {
        let supported: Vec<String> = BaudRate::ALL.iter().map(|b| b.bps().to_string()).collect();
        format!("不支持的波特率 {value}（可选: {}）", supported.join(", "))
    })
}

/// 寄存器名称（如 `present_position`、`goal-position`）或地址
pub fn parse_register(s: &str) -> Result<Register, String> {
    if let Ok(address) = s.trim().parse::<u8>() {
        return Register::by_address(address).ok_or_else(|| format!("未知寄存器地址: {address}"));
    }
    Register::by_name(s).ok_or_else(|| {
        let names: Vec<&str> = Register::ALL.iter().map(|r| r.name).collect();
        format!("未知寄存器 {s}（可选: {}）", names.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_servo_id() {
        assert_eq!(parse_servo_id("1"), Ok(1));
        assert_eq!(parse_servo_id(" 253 "), Ok(253));
        assert!(parse_servo_id("254").is_err());
        assert!(parse_servo_id("abc").is_err());
    }

    #[test]
    fn test_parse_baud() {
        assert_eq!(parse_baud("0"), Ok(BaudRate::B1000000));
        assert_eq!(parse_baud("4"), Ok(BaudRate::B115200));
        assert_eq!(parse_baud("115200"), Ok(BaudRate::B115200));
        assert!(parse_baud("8").is_err());
        assert!(parse_baud("9600").is_err());
    }

    #[test]
    fn test_parse_register() {
        assert_eq!(parse_register("goal-position"), Ok(Register::GOAL_POSITION));
        assert_eq!(parse_register("56"), Ok(Register::PRESENT_POSITION));
        assert!(parse_register("nope").is_err());
        assert!(parse_register("57").is_err());
    }
}
