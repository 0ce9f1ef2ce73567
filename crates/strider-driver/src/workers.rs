//! IO 工作线程循环
//!
//! 三个协作线程共享套接字的收/发半部与一个运行标志：
//!
//! - **接收线程**：短超时轮询链路，解码 + 验证，分发到状态缓存
//!   与事件 channel；验证失败丢帧，瞬态错误计入失败计数
//! - **发送线程**：带超时地从外发队列取帧发送，失败时尽力重排队
//!   并计入失败计数；节奏由队列的阻塞 pop 决定
//! - **心跳线程**：按固定间隔发出心跳帧，并在 Connected 状态下
//!   检查入站心跳看门狗，超时触发连接丢失处理
//!
//! 任一线程耗尽重试预算或遇到致命链路错误，都走同一条丢失路径：
//! 清除运行标志、CAS 到 `ConnectionFailed`、发布状态事件。其余
//! 线程观察到标志后自行退出，套接字半部随线程退出而释放。

use crate::connection::{ConnectionState, StateCell};
use crate::events::ClientEvent;
use crate::monitor::now_millis;
use crate::queue::OutboundQueue;
use crate::state::LinkContext;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strider_link::{LinkError, RxLink, TxLink};
use strider_protocol::{codec, DeviceIdentity, Envelope, Payload};
use tracing::{debug, error, trace, warn};

/// 工作线程共享句柄
///
/// 克隆后分发给每个线程；全部为 Arc/Sender，克隆开销低。
#[derive(Clone)]
pub struct WorkerShared {
    /// 协作取消标志（Release 写 / Acquire 读）
    pub running: Arc<AtomicBool>,
    /// 权威连接状态单元
    pub state: Arc<StateCell>,
    /// 缓存/监视/失败计数上下文
    pub ctx: Arc<LinkContext>,
    /// 外发帧队列
    pub queue: Arc<OutboundQueue>,
    /// 面向上层的事件 channel
    pub events: Sender<ClientEvent>,
}

/// 统一的连接丢失处理路径
///
/// 第一个检测到丢失的线程清除运行标志并完成状态迁移；
/// 后续调用（包括用户主动 disconnect 之后的残余错误）为空操作。
pub fn handle_connection_loss(shared: &WorkerShared, reason: &str) {
    let was_running = shared.running.swap(false, Ordering::AcqRel);
    if !was_running {
        return;
    }
    error!("Connection lost: {}", reason);
    let transitioned = shared.state.transition_from_any(
        &[ConnectionState::Connected, ConnectionState::Connecting],
        ConnectionState::ConnectionFailed,
    );
    if let Some(prev) = transitioned {
        debug!("Connection state: {} -> ConnectionFailed", prev);
        let _ = shared
            .events
            .send(ClientEvent::StateChanged(ConnectionState::ConnectionFailed));
    }
}

// ==================== 接收线程 ====================

/// 接收线程主循环
///
/// 入站帧严格按到达顺序处理；每帧错误（解码/完整性）就地恢复，
/// 从不上抛。
pub fn rx_loop(mut rx: impl RxLink, shared: WorkerShared, poll_interval: Duration) {
    loop {
        if !shared.running.load(Ordering::Acquire) {
            trace!("RX thread: running flag cleared, exiting");
            break;
        }

        match rx.receive() {
            Ok(bytes) => {
                shared.ctx.failures.reset();
                match codec::decode(&bytes) {
                    Ok(envelope) => {
                        // verify 失败时协议层已记录两个校验和，丢帧即可
                        if codec::verify(&envelope) {
                            dispatch_envelope(envelope, &shared);
                        }
                    },
                    Err(e) => {
                        warn!("Discarding undecodable frame ({} bytes): {}", bytes.len(), e);
                    },
                }
            },
            // 超时是正常情况：本轮没有入站帧
            Err(LinkError::Timeout) => {},
            Err(e) if e.is_fatal() => {
                handle_connection_loss(&shared, &format!("receive failed: {}", e));
                break;
            },
            Err(e) => {
                warn!("RX thread: transient receive error: {}", e);
                if shared.ctx.failures.record_failure() {
                    handle_connection_loss(&shared, "receive retry budget exhausted");
                    break;
                }
            },
        }

        spin_sleep::sleep(poll_interval);
    }
    trace!("RX thread: loop exited");
}

/// 分发一条已验证的入站消息
///
/// 状态缓存按载荷类型独立更新；随后整条消息发布给上层。
/// 未知消息类型既不进缓存也不发布（前向兼容跳过）。
fn dispatch_envelope(envelope: Envelope, shared: &WorkerShared) {
    match &envelope.payload {
        Payload::Heartbeat { is_connected } => {
            shared.ctx.remote.update_heartbeat(*is_connected);
            shared.ctx.monitor.register_heartbeat();
        },
        Payload::BatteryInfo {
            level,
            voltage,
            current,
            temperature,
        } => {
            shared
                .ctx
                .remote
                .update_battery(*level, *voltage, *current, *temperature);
        },
        Payload::CurrentMode { mode } => shared.ctx.remote.update_mode(*mode),
        Payload::CurrentControlMode { mode } => shared.ctx.remote.update_control_mode(*mode),
        Payload::Unknown { tag } => {
            trace!("Ignoring message with unknown type tag {}", tag);
            return;
        },
        // 其余消息（里程计等）不进缓存，只向上分发
        _ => {},
    }
    let _ = shared.events.send(ClientEvent::Message(envelope));
}

// ==================== 发送线程 ====================

/// 发送线程主循环
///
/// 无固定休眠：节奏由队列 pop 的阻塞等待决定。发送失败的帧
/// 尽力重排队（队列满时可能挤掉最旧帧 —— 与队列本身同一策略）。
pub fn tx_loop(mut tx: impl TxLink, shared: WorkerShared, pop_timeout: Duration) {
    loop {
        if !shared.running.load(Ordering::Acquire) {
            trace!("TX thread: running flag cleared, exiting");
            break;
        }

        let Some(frame) = shared.queue.pop(pop_timeout) else {
            continue;
        };

        match tx.send(&frame) {
            Ok(()) => shared.ctx.failures.reset(),
            Err(e) if e.is_fatal() => {
                shared.queue.push(frame);
                handle_connection_loss(&shared, &format!("send failed: {}", e));
                break;
            },
            Err(e) => {
                warn!("TX thread: send failed, requeueing frame: {}", e);
                shared.queue.push(frame);
                if shared.ctx.failures.record_failure() {
                    handle_connection_loss(&shared, "send retry budget exhausted");
                    break;
                }
            },
        }
    }
    trace!("TX thread: loop exited");
}

// ==================== 心跳线程 ====================

/// 心跳线程主循环
///
/// 每个周期经发送路径发出一条签名心跳帧；处于 Connected 时
/// 同时检查入站心跳看门狗，超出响应窗口即触发连接丢失处理。
pub fn heartbeat_loop(shared: WorkerShared, identity: DeviceIdentity, interval: Duration) {
    loop {
        if !shared.running.load(Ordering::Acquire) {
            trace!("Heartbeat thread: running flag cleared, exiting");
            break;
        }

        let connected = shared.state.load() == ConnectionState::Connected;
        let envelope = codec::sign(Envelope::new(
            now_millis(),
            &identity,
            Payload::Heartbeat {
                is_connected: connected,
            },
        ));
        shared.queue.push(codec::encode(&envelope));
        trace!("Heartbeat enqueued (connected={})", connected);

        if connected && !shared.ctx.monitor.check_connection() {
            error!(
                "Heartbeat watchdog expired: {:?} since last inbound heartbeat",
                shared.ctx.monitor.time_since_last_heartbeat()
            );
            handle_connection_loss(&shared, "liveness timeout");
            break;
        }

        spin_sleep::sleep(interval);
    }
    trace!("Heartbeat thread: loop exited");
}
