//! 总线指标模块
//!
//! 原子计数器，可以在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 总线实时指标
///
/// # 使用示例
///
/// ```rust
/// use scs_driver::BusMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = BusMetrics::new();
/// metrics.transactions_total.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.transactions_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct BusMetrics {
    /// 执行的事务总数（不含重试）
    pub transactions_total: AtomicU64,

    /// 最终失败的事务数
    pub transactions_failed: AtomicU64,

    /// 自动重试次数
    pub retries: AtomicU64,

    /// 单次尝试超时次数
    pub timeouts: AtomicU64,

    /// 应答校验和错误次数（含同步读中损坏的子帧）
    pub checksum_errors: AtomicU64,

    /// 应答帧结构错误次数
    pub framing_errors: AtomicU64,

    /// 同步读中未应答的舵机数（累计）
    pub sync_read_missing: AtomicU64,

    /// 写出的字节数
    pub bytes_written: AtomicU64,

    /// 读入的字节数
    pub bytes_read: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transactions_total: self.transactions_total.load(Ordering::Relaxed),
            transactions_failed: self.transactions_failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            checksum_errors: self.checksum_errors.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            sync_read_missing: self.sync_read_missing.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.transactions_total.store(0, Ordering::Relaxed);
        self.transactions_failed.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.checksum_errors.store(0, Ordering::Relaxed);
        self.framing_errors.store(0, Ordering::Relaxed);
        self.sync_read_missing.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        self.bytes_read.store(0, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub transactions_total: u64,
    pub transactions_failed: u64,
    pub retries: u64,
    pub timeouts: u64,
    pub checksum_errors: u64,
    pub framing_errors: u64,
    pub sync_read_missing: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
}

impl MetricsSnapshot {
    /// 事务失败率（百分比）。`transactions_total` 为 0 时返回 0.0。
    pub fn failure_rate(&self) -> f64 {
        if self.transactions_total == 0 {
            return 0.0;
        }
        (self.transactions_failed as f64 / self.transactions_total as f64) * 100.0
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "transactions={} failed={} retries={} timeouts={} checksum={} framing={} missing={} tx={}B rx={}B",
            self.transactions_total,
            self.transactions_failed,
            self.retries,
            self.timeouts,
            self.checksum_errors,
            self.framing_errors,
            self.sync_read_missing,
            self.bytes_written,
            self.bytes_read
        )
    }
}
