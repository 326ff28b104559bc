//! 事务配置

use scs_serial::LinkOptions;
use std::time::Duration;

/// 事务配置
///
/// 控制应答超时、自动重试与总线线程退出等待时间。
///
/// # Example
///
/// ```
/// use scs_driver::TransactionConfig;
///
/// // 使用默认配置（50ms 应答窗口，重试 1 次）
/// let config = TransactionConfig::default();
///
/// // 关闭自动重试
/// let config = TransactionConfig {
///     max_retries: 0,
///     ..Default::default()
/// };
/// assert_eq!(config.retries(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionConfig {
    /// 应答窗口基准时间（毫秒）
    ///
    /// 实际超时 = 基准 + 请求与期望应答在当前波特率下的线上传输时间。
    pub response_timeout_ms: u64,
    /// 瞬态错误（超时、校验和、帧错误）的自动重试次数，最多 1 次
    pub max_retries: u32,
    /// 关闭连接时等待总线线程退出的时间（毫秒）
    pub join_timeout_ms: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 50,
            max_retries: 1,
            join_timeout_ms: 2000,
        }
    }
}

impl TransactionConfig {
    /// 实际生效的重试次数（上限为 1）
    pub fn retries(&self) -> u32 {
        self.max_retries.min(1)
    }

    /// 单次尝试的应答超时
    ///
    /// `tx_len` 为请求帧字节数，`rx_len` 为期望应答的总字节数。
    /// 额外预留 3 个字节时间给舵机的返回延迟。
    pub fn response_timeout(&self, link: &LinkOptions, tx_len: usize, rx_len: usize) -> Duration {
        let wire = link.byte_time() * (tx_len + rx_len + 3) as u32;
        Duration::from_millis(self.response_timeout_ms) + wire
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}
