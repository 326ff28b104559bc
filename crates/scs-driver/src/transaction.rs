//! 请求、应答与挂起事务

use crate::DriverError;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use scs_protocol::sync::SyncReadReply;
use scs_protocol::{BROADCAST_ID, FRAME_OVERHEAD, Instruction, Register, ServoStatus};
use std::time::{Duration, Instant};

/// 期望的应答形状
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    /// 无应答（广播、SYNC_WRITE、或调用方不等待）
    None,
    /// 单帧状态应答，携带 `data_len` 字节数据
    Status { data_len: usize },
    /// 同步读：每个 ID 一帧，各携带 `data_len` 字节
    SyncStream { ids: Vec<u8>, data_len: usize },
}

impl ResponseShape {
    /// 期望应答的总字节数
    pub fn expected_len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Status { data_len } => FRAME_OVERHEAD + data_len,
            Self::SyncStream { ids, data_len } => ids.len() * (FRAME_OVERHEAD + data_len),
        }
    }
}

/// 总线请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: u8,
    pub instruction: Instruction,
    pub params: Vec<u8>,
    pub shape: ResponseShape,
}

impl Request {
    /// 根据指令推导应答形状
    ///
    /// `expects_response` 为 `false` 或目标为广播时不等待应答。
    pub fn new(id: u8, instruction: Instruction, params: Vec<u8>, expects_response: bool) -> Self {
        let shape = match instruction {
            _ if !expects_response => ResponseShape::None,
            Instruction::SyncRead => ResponseShape::SyncStream {
                ids: params.get(2..).map(<[u8]>::to_vec).unwrap_or_default(),
                data_len: params.get(1).copied().unwrap_or(0) as usize,
            },
            _ if !instruction.expects_status(id) => ResponseShape::None,
            Instruction::Read => ResponseShape::Status {
                data_len: params.get(1).copied().unwrap_or(0) as usize,
            },
            _ => ResponseShape::Status { data_len: 0 },
        };
        Self {
            id,
            instruction,
            params,
            shape,
        }
    }

    pub fn ping(id: u8) -> Self {
        Self::new(id, Instruction::Ping, Vec::new(), true)
    }

    /// 读取寄存器
    pub fn read(id: u8, register: &Register) -> Self {
        Self::new(id, Instruction::Read, register.read_params().to_vec(), true)
    }

    /// 写寄存器（`params` 为 `[address, data...]`），广播时不等待应答
    pub fn write(id: u8, params: Vec<u8>) -> Self {
        Self::new(id, Instruction::Write, params, id != BROADCAST_ID)
    }

    /// 同步读（`params` 为 `[address, width, id...]`）
    pub fn sync_read(params: Vec<u8>) -> Self {
        Self::new(BROADCAST_ID, Instruction::SyncRead, params, true)
    }

    /// 同步写（`params` 为 `[address, width, (id, data)...]`）
    pub fn sync_write(params: Vec<u8>) -> Self {
        Self::new(BROADCAST_ID, Instruction::SyncWrite, params, false)
    }
}

/// 单帧应答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub id: u8,
    pub status: ServoStatus,
    pub params: Vec<u8>,
}

/// 事务结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    None,
    Status(RawResponse),
    Sync(SyncReadReply),
}

impl Response {
    pub fn into_status(self) -> Result<RawResponse, DriverError> {
        match self {
            Self::Status(raw) => Ok(raw),
            other => Err(DriverError::MalformedResponse {
                id: BROADCAST_ID,
                reason: format!("expected a status frame, got {:?}", other.kind()),
            }),
        }
    }

    pub fn into_sync(self) -> Result<SyncReadReply, DriverError> {
        match self {
            Self::Sync(reply) => Ok(reply),
            other => Err(DriverError::MalformedResponse {
                id: BROADCAST_ID,
                reason: format!("expected a sync-read stream, got {:?}", other.kind()),
            }),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Status(_) => "status",
            Self::Sync(_) => "sync",
        }
    }
}

/// 事务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Pending,
    Resolved,
    TimedOut,
    Errored,
}

impl TransactionState {
    fn of(result: &Result<Response, DriverError>) -> Self {
        match result {
            Ok(_) => Self::Resolved,
            Err(e) if e.is_timeout() => Self::TimedOut,
            Err(_) => Self::Errored,
        }
    }
}

/// 挂起事务句柄
///
/// 调用方可以放弃等待（直接丢弃句柄）；总线线程仍会完成或超时该事务。
#[derive(Debug)]
pub struct PendingTransaction {
    id: u8,
    shape: ResponseShape,
    created_at: Instant,
    state: TransactionState,
    reply_rx: Receiver<Result<Response, DriverError>>,
}

impl PendingTransaction {
    pub(crate) fn new(
        id: u8,
        shape: ResponseShape,
        reply_rx: Receiver<Result<Response, DriverError>>,
    ) -> Self {
        Self {
            id,
            shape,
            created_at: Instant::now(),
            state: TransactionState::Pending,
            reply_rx,
        }
    }

    /// 等待的舵机 ID
    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn shape(&self) -> &ResponseShape {
        &self.shape
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// 阻塞等待结果
    pub fn wait(self) -> Result<Response, DriverError> {
        self.reply_rx
            .recv()
            .unwrap_or(Err(DriverError::NotConnected))
    }

    /// 最多等待 `timeout`；仍未完成时返回 `None`，句柄保持可用
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<Response, DriverError>> {
        if self.state != TransactionState::Pending {
            return Some(Err(DriverError::IoThread(
                "transaction result already taken".to_string(),
            )));
        }
        let result = match self.reply_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => Err(DriverError::NotConnected),
        };
        self.state = TransactionState::of(&result);
        Some(result)
    }
}
