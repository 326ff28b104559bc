//! 命令定义和实现

pub mod config;
pub mod identity;
pub mod r#move;
pub mod ping;
pub mod read;
pub mod scan;
pub mod torque;

pub use config::ConfigCommand;
pub use identity::{SetBaudCommand, SetIdCommand};
pub use r#move::MoveCommand;
pub use ping::PingCommand;
pub use read::ReadCommand;
pub use scan::ScanCommand;
pub use torque::TorqueCommand;
