//! 连接与总线配置

use scs_driver::TransactionConfig;
use scs_protocol::{DEFAULT_BAUD_RATE, ProtocolEnd};
use scs_serial::LinkOptions;

/// `connect` 选项
///
/// 未设置的字段使用默认值：波特率优先取 `set_baud_rate` 记录的新速率，
/// 否则为 1 Mbps；字节序默认低字节在前（STS 系列）。
///
/// # Example
///
/// ```
/// use scs_client::ConnectOptions;
/// use scs_protocol::ProtocolEnd;
///
/// let options = ConnectOptions::new()
///     .baud_rate(115_200)
///     .protocol_end(ProtocolEnd::HighByteFirst);
/// assert_eq!(options.baud_rate, Some(115_200));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectOptions {
    pub baud_rate: Option<u32>,
    pub protocol_end: Option<ProtocolEnd>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    pub fn protocol_end(mut self, protocol_end: ProtocolEnd) -> Self {
        self.protocol_end = Some(protocol_end);
        self
    }

    /// 解析为链路参数，`pending_baud` 为上一次 `set_baud_rate` 记录的速率
    pub(crate) fn resolve(&self, pending_baud: Option<u32>) -> LinkOptions {
        LinkOptions {
            baud_rate: self
                .baud_rate
                .or(pending_baud)
                .unwrap_or(DEFAULT_BAUD_RATE),
            protocol_end: self.protocol_end.unwrap_or_default(),
        }
    }
}

/// 总线配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServoBusConfig {
    /// 事务超时与重试
    pub transaction: TransactionConfig,
    /// 切换到轮式模式时是否同时清零角度限位
    ///
    /// STS 系列仅靠模式寄存器切换，默认关闭；部分 SCS 型号需要开启。
    pub wheel_mode_clears_angle_limits: bool,
}
