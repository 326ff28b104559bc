//! # SCS CLI
//!
//! Command-line interface for Feetech SCS/STS serial bus servos.
//!
//! ```bash
//! # 配置默认串口
//! scs-cli config set --port /dev/ttyUSB0
//!
//! # 扫描总线
//! scs-cli scan --all-bauds
//!
//! # 读取状态 / 移动
//! scs-cli read 1
//! scs-cli move 1 90 --deg --wait 2
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod connection;
mod validation;

use commands::{
    ConfigCommand, MoveCommand, PingCommand, ReadCommand, ScanCommand, SetBaudCommand,
    SetIdCommand, TorqueCommand,
};
use config::CliConfig;
use connection::ConnectionArgs;

/// SCS CLI - 总线舵机命令行工具
#[derive(Parser, Debug)]
#[command(name = "scs-cli")]
#[command(about = "Command-line interface for Feetech SCS/STS servos", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 扫描总线上的舵机
    Scan {
        #[command(flatten)]
        args: ScanCommand,
    },

    /// PING 舵机并显示型号
    Ping {
        #[command(flatten)]
        args: PingCommand,
    },

    /// 读取状态或寄存器
    Read {
        #[command(flatten)]
        args: ReadCommand,
    },

    /// 移动到目标位置
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 扭矩开关
    Torque {
        #[command(flatten)]
        args: TorqueCommand,
    },

    /// 修改舵机 ID
    SetId {
        #[command(flatten)]
        args: SetIdCommand,
    },

    /// 修改舵机波特率
    SetBaud {
        #[command(flatten)]
        args: SetBaudCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,scs_cli=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = CliConfig::load()?;
    let conn = &cli.connection;

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&mut config),
        Commands::Scan { args } => args.execute(conn, &config),
        Commands::Ping { args } => args.execute(&conn.connect(&config)?),
        Commands::Read { args } => args.execute(&conn.connect(&config)?),
        Commands::Move { args } => args.execute(&conn.connect(&config)?),
        Commands::Torque { args } => args.execute(&conn.connect(&config)?),
        Commands::SetId { args } => args.execute(&conn.connect(&config)?),
        Commands::SetBaud { args } => args.execute(&conn.connect(&config)?, &mut config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_move_with_global_port() {
        let cli = Cli::try_parse_from([
            "scs-cli", "move", "1", "90", "--deg", "--port", "/dev/ttyUSB0",
        ])
        .unwrap();
        assert_eq!(cli.connection.port.as_deref(), Some("/dev/ttyUSB0"));
        assert!(matches!(cli.command, Commands::Move { ref args } if args.deg && args.id == 1));
    }

    #[test]
    fn test_parse_read_id_list() {
        let cli = Cli::try_parse_from(["scs-cli", "read", "1,2,3", "-r", "present_position"]).unwrap();
        match cli.command {
            Commands::Read { args } => assert_eq!(args.ids, vec![1, 2, 3]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_id() {
        assert!(Cli::try_parse_from(["scs-cli", "ping", "254"]).is_err());
    }
}
