//! 事务引擎
//!
//! 总线工作线程独占 [`TransportSession`]，从无界 FIFO 队列中依次取出请求执行。
//! 同一时刻总线上最多只有一个挂起事务：后一个请求的字节一定在前一个事务
//! 完成（应答、超时或出错）之后才写入传输层。
//!
//! 重试策略：
//! - 超时、校验和错误、帧错误自动重试一次（可配置为不重试）
//! - 重试后仍超时报告 `DeviceNotResponding`
//! - 非预期 ID 与格式错误的应答不重试
//! - 同步读不重试，返回已收到的部分结果

use crate::metrics::BusMetrics;
use crate::transaction::{PendingTransaction, RawResponse, Request, Response, ResponseShape};
use crate::{DriverError, TransactionConfig};
use crossbeam_channel::{Receiver, Sender};
use scs_protocol::sync::parse_sync_read;
use scs_protocol::{ProtocolError, decode_prefix, encode};
use scs_serial::{LinkOptions, SerialError, TransportSession};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// 带超时的线程 join（超时后看守线程继续等待，由进程退出回收）
trait JoinTimeout<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<T>;
}

impl<T: Send + 'static> JoinTimeout<T> for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<T> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();
        spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 队列中的一个事务
struct Job {
    request: Request,
    packet: Vec<u8>,
    enqueued_at: Instant,
    reply: Sender<Result<Response, DriverError>>,
}

/// 事务引擎（对外 API）
pub struct TransactionEngine {
    /// 请求队列发送端；关闭时先 drop，使总线线程收到 `Disconnected`
    job_tx: Option<Sender<Job>>,
    /// 总线线程句柄，退出时归还传输会话
    worker: Option<JoinHandle<TransportSession>>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<BusMetrics>,
    config: TransactionConfig,
    link: LinkOptions,
}

impl TransactionEngine {
    /// 启动总线线程
    ///
    /// 会话必须已打开，否则返回 `NotConnected`。
    pub fn start(
        session: TransportSession,
        config: TransactionConfig,
        metrics: Arc<BusMetrics>,
    ) -> Result<Self, DriverError> {
        if !session.is_open() {
            return Err(DriverError::NotConnected);
        }
        let link = *session.options();

        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let is_running = Arc::new(AtomicBool::new(true));

        let worker_config = config.clone();
        let worker_metrics = metrics.clone();
        let worker_running = is_running.clone();
        let worker = std::thread::Builder::new()
            .name("scs-bus".to_string())
            .spawn(move || bus_loop(session, job_rx, worker_config, worker_metrics, worker_running))
            .map_err(|e| DriverError::IoThread(e.to_string()))?;

        Ok(Self {
            job_tx: Some(job_tx),
            worker: Some(worker),
            is_running,
            metrics,
            config,
            link,
        })
    }

    /// 提交请求，立即返回挂起事务句柄
    ///
    /// 请求在调用线程上编码；ID 或参数非法时直接返回协议错误，不进入队列。
    pub fn submit(&self, request: Request) -> Result<PendingTransaction, DriverError> {
        let packet = encode(request.id, request.instruction, &request.params)?;
        let job_tx = self.job_tx.as_ref().ok_or(DriverError::NotConnected)?;
        if !self.is_running() {
            return Err(DriverError::NotConnected);
        }

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let pending = PendingTransaction::new(request.id, request.shape.clone(), reply_rx);
        job_tx
            .send(Job {
                request,
                packet,
                enqueued_at: Instant::now(),
                reply: reply_tx,
            })
            .map_err(|_| DriverError::NotConnected)?;
        Ok(pending)
    }

    /// 提交并阻塞等待结果
    pub fn transact(&self, request: Request) -> Result<Response, DriverError> {
        self.submit(request)?.wait()
    }

    /// 执行一个事务
    pub fn execute(
        &self,
        id: u8,
        instruction: scs_protocol::Instruction,
        params: &[u8],
        expects_response: bool,
    ) -> Result<Response, DriverError> {
        self.transact(Request::new(id, instruction, params.to_vec(), expects_response))
    }

    /// 总线线程是否在运行
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    pub fn link(&self) -> &LinkOptions {
        &self.link
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<BusMetrics> {
        &self.metrics
    }

    /// 停止总线线程并归还传输会话
    ///
    /// 队列中已提交的请求会先执行完。线程在 `join_timeout` 内未退出或已 panic 时返回 `None`。
    pub fn shutdown(mut self) -> Option<TransportSession> {
        self.stop()
    }

    fn stop(&mut self) -> Option<TransportSession> {
        // 先关闭队列，总线线程处理完剩余请求后退出
        drop(self.job_tx.take());

        let handle = self.worker.take()?;
        let timeout = self.config.join_timeout();
        match handle.join_timeout(timeout) {
            Ok(session) => Some(session),
            Err(_e) => {
                error!(
                    "Bus thread panicked or failed to shut down within {:?}",
                    timeout
                );
                None
            },
        }
    }
}

impl Drop for TransactionEngine {
    fn drop(&mut self) {
        if let Some(mut session) = self.stop() {
            session.close();
        }
    }
}

impl std::fmt::Debug for TransactionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionEngine")
            .field("running", &self.is_running())
            .field("link", &self.link)
            .field("config", &self.config)
            .finish()
    }
}

/// 总线线程主循环
///
/// 队列关闭且清空后退出，归还传输会话。
fn bus_loop(
    mut session: TransportSession,
    job_rx: Receiver<Job>,
    config: TransactionConfig,
    metrics: Arc<BusMetrics>,
    is_running: Arc<AtomicBool>,
) -> TransportSession {
    debug!("Bus thread started ({})", session.describe());

    while let Ok(job) = job_rx.recv() {
        let queued = job.enqueued_at.elapsed();
        let started = Instant::now();
        let result = run_transaction(&mut session, &job, &config, &metrics);

        BusMetrics::add(&metrics.transactions_total, 1);
        if let Err(e) = &result {
            BusMetrics::add(&metrics.transactions_failed, 1);
            debug!(
                "{:?} id={} failed after {:?}: {}",
                job.request.instruction,
                job.request.id,
                started.elapsed(),
                e
            );
        } else {
            debug!(
                "{:?} id={} done in {:?} (queued {:?})",
                job.request.instruction,
                job.request.id,
                started.elapsed(),
                queued
            );
        }

        // 调用方可能已放弃等待
        if job.reply.send(result).is_err() {
            trace!("Caller abandoned transaction for servo {}", job.request.id);
        }
    }

    is_running.store(false, Ordering::Release);
    debug!("Bus thread exiting");
    session
}

/// 执行一个事务（含重试）
fn run_transaction(
    session: &mut TransportSession,
    job: &Job,
    config: &TransactionConfig,
    metrics: &BusMetrics,
) -> Result<Response, DriverError> {
    let id = job.request.id;
    // 同步读不重试
    let retries = match job.request.shape {
        ResponseShape::SyncStream { .. } => 0,
        _ => config.retries(),
    };

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let result = attempt_once(session, job, config, metrics);
        match result {
            Err(e) if e.is_retryable() && attempt <= retries => {
                BusMetrics::add(&metrics.retries, 1);
                warn!("Transaction with servo {} failed ({}), retrying", id, e);
            },
            Err(DriverError::Timeout { id }) if attempt > 1 => {
                return Err(DriverError::DeviceNotResponding {
                    id,
                    attempts: attempt,
                });
            },
            other => return other,
        }
    }
}

/// 单次尝试：清空输入、写出请求、按应答形状读取
fn attempt_once(
    session: &mut TransportSession,
    job: &Job,
    config: &TransactionConfig,
    metrics: &BusMetrics,
) -> Result<Response, DriverError> {
    let id = job.request.id;
    session.clear_input()?;
    session.write(&job.packet)?;
    BusMetrics::add(&metrics.bytes_written, job.packet.len() as u64);

    let timeout =
        config.response_timeout(session.options(), job.packet.len(), job.request.shape.expected_len());

    match &job.request.shape {
        ResponseShape::None => Ok(Response::None),
        ResponseShape::Status { data_len } => {
            let mut buf = Vec::new();
            let read = session.read_until(
                &mut buf,
                |b| !matches!(decode_prefix(b), Err(e) if e.is_incomplete()),
                timeout,
            );
            BusMetrics::add(&metrics.bytes_read, buf.len() as u64);

            match read {
                Ok(()) => {},
                Err(SerialError::Timeout) => {},
                Err(e) => return Err(e.into()),
            }

            let decoded = match decode_prefix(&buf) {
                Ok(decoded) => decoded,
                Err(ProtocolError::Framing(scs_protocol::FramingError::HeaderNotFound)) => {
                    BusMetrics::add(&metrics.timeouts, 1);
                    return Err(DriverError::Timeout { id });
                },
                Err(e) => {
                    let err = DriverError::from_decode(id, e);
                    match &err {
                        DriverError::ChecksumMismatch { .. } => {
                            BusMetrics::add(&metrics.checksum_errors, 1)
                        },
                        _ => BusMetrics::add(&metrics.framing_errors, 1),
                    }
                    return Err(err);
                },
            };
            if decoded.end < buf.len() {
                trace!("Ignoring {} trailing bytes after response", buf.len() - decoded.end);
            }

            let frame = decoded.frame.expect_id(id).map_err(|e| DriverError::from_decode(id, e))?;
            if frame.params.len() != *data_len {
                return Err(DriverError::MalformedResponse {
                    id,
                    reason: format!(
                        "expected {} data bytes, got {}",
                        data_len,
                        frame.params.len()
                    ),
                });
            }

            let status = frame.status();
            if !status.is_ok() {
                warn!("Servo {} reports status: {}", id, status);
            }
            Ok(Response::Status(RawResponse {
                id: frame.id,
                status,
                params: frame.params,
            }))
        },
        ResponseShape::SyncStream { ids, data_len } => {
            let mut buf = Vec::new();
            let read = session.read_until(
                &mut buf,
                |b| parse_sync_read(b, ids, *data_len).data.len() == ids.len(),
                timeout,
            );
            BusMetrics::add(&metrics.bytes_read, buf.len() as u64);
            match read {
                Ok(()) | Err(SerialError::Timeout) => {},
                Err(e) => return Err(e.into()),
            }

            let reply = parse_sync_read(&buf, ids, *data_len);
            let missing = reply.missing(ids);
            if !missing.is_empty() {
                debug!("Sync read: no reply from {:?}", missing);
                BusMetrics::add(&metrics.sync_read_missing, missing.len() as u64);
            }
            if reply.corrupted > 0 {
                warn!("Sync read: {} corrupted sub-frames dropped", reply.corrupted);
                BusMetrics::add(&metrics.checksum_errors, reply.corrupted as u64);
            }
            for (servo, status) in reply.status.iter() {
                if !status.is_ok() {
                    warn!("Servo {} reports status: {}", servo, status);
                }
            }
            Ok(Response::Sync(reply))
        },
    }
}
