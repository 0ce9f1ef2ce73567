//! Strider 驱动层
//!
//! 连接建立之后的 IO 机械部分：三个工作线程（接收/发送/心跳）、
//! 有界的外发帧队列（丢最旧回压策略）、远端状态缓存（无锁快照）、
//! 存活监视与连续失败计数。
//!
//! 本层不做连接生命周期决策 —— 状态单元 [`StateCell`] 的迁移语义
//! 由上层客户端驱动，工作线程只在检测到连接丢失时通过
//! 统一的丢失处理路径写入 `ConnectionFailed`。

pub mod connection;
pub mod events;
pub mod monitor;
pub mod queue;
pub mod state;
pub mod workers;

pub use connection::{ConnectionState, StateCell};
pub use events::ClientEvent;
pub use monitor::{now_millis, ConnectionMonitor, FailureTracker};
pub use queue::OutboundQueue;
pub use state::{LinkContext, RemoteState, RemoteStateCache};
pub use workers::{handle_connection_loss, heartbeat_loop, rx_loop, tx_loop, WorkerShared};
